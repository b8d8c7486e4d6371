//! Execution context tracking.
//!
//! This module provides:
//! - The context stack of nested job/flow/subflow nodes
//! - The directory context naming the active base output path
//! - Guards that scope every change and undo it on any exit path
//! - Per-task isolation for async code

mod node;
mod scoped;
mod state;

pub use node::{ContextNode, ContextStack, NodeKind};
pub use scoped::{in_current_context, scoped, spawn_in_current_context, ContextScoped};
pub use state::{
    current_output_dir, directory_context, flow_context, get_context, get_context_path,
    get_directory_context, is_top_level, push_context, push_directory_context, restore_context,
    set_context, set_directory_context, ContextGuard, DirectoryGuard, RestoreGuard,
};

pub(crate) use state::{current_state, ExecutionState};
