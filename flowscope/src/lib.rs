//! # Flowscope
//!
//! Execution context tracking for workflow engines.
//!
//! Flowscope wraps the jobs and flows handed to a workflow engine so that
//! every run knows where it sits in the nested call tree and which base
//! directory its outputs belong under:
//!
//! - **Context stack**: the `flow/subflow/job` path of the current call,
//!   scoped per thread or per async task
//! - **Directory context**: one base results directory per top-level call
//! - **Tracked functions**: wrappers that push and pop both around each call
//! - **Envelopes**: captured context carried through engines that serialize
//!   tasks to other processes or workers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use flowscope::prelude::*;
//!
//! let tracker = Tracker::new(Settings::from_env()?);
//!
//! let relax_job = tracker.job("relax_job", |slab: Slab| {
//!     let dir = make_job_dir()?;
//!     relax(slab, &dir)
//! });
//! let bulk_to_slabs_flow = tracker.flow("bulk_to_slabs_flow", |bulk: Bulk| {
//!     make_slabs(bulk).into_iter().map(|s| relax_job.call(s)).collect()
//! });
//!
//! bulk_to_slabs_flow.call(bulk)?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod context;
pub mod dirs;
pub mod envelope;
pub mod errors;
pub mod observability;
pub mod tracked;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Settings, WorkflowEngine};
    pub use crate::context::{
        current_output_dir, directory_context, flow_context, get_context, get_context_path,
        get_directory_context, in_current_context, is_top_level, push_context,
        push_directory_context, restore_context, scoped, set_context, set_directory_context,
        spawn_in_current_context, ContextGuard, ContextNode, ContextScoped, ContextStack,
        DirectoryGuard, NodeKind, RestoreGuard,
    };
    pub use crate::dirs::{make_job_dir, DirectoryAllocator, TimestampAllocator};
    pub use crate::envelope::{ContextEnvelope, Enveloped};
    pub use crate::errors::FlowscopeError;
    pub use crate::observability::init_tracing;
    pub use crate::track;
    pub use crate::tracked::{TrackedFn, Tracker};
}
