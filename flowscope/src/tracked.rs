//! The tracking wrapper.
//!
//! A [`Tracker`] turns plain functions into [`TrackedFn`]s. Every call of a
//! tracked function pushes a node named after it onto the context stack and,
//! when it is the outermost tracked call, first establishes the base results
//! directory that every nested call builds its own paths from.
//!
//! ```rust,ignore
//! use flowscope::prelude::*;
//!
//! let tracker = Tracker::new(Settings::from_env()?);
//! let relax = track!(tracker, NodeKind::Job, recipes::relax_job);
//! let flow = tracker.flow("bulk_to_slabs_flow", |atoms| {
//!     relax.call(atoms)
//! });
//! flow.call(atoms)?;
//! ```

use crate::config::Settings;
use crate::context::{
    current_state, is_top_level, push_context, push_directory_context, ContextNode,
    ContextScoped, ExecutionState, NodeKind,
};
use crate::dirs::{DirectoryAllocator, TimestampAllocator};
use crate::envelope::{ContextEnvelope, Enveloped};
use crate::errors::FlowscopeError;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Decides where a top-level call's results go.
#[derive(Clone)]
struct DirectoryPolicy {
    settings: Arc<Settings>,
    allocator: Arc<dyn DirectoryAllocator>,
}

impl DirectoryPolicy {
    fn resolve_base_dir(&self) -> Result<String, FlowscopeError> {
        let results_dir = self.settings.resolved_results_dir()?;
        let base = if self.settings.requires_unique_dir() {
            self.allocator
                .make_unique_dir(&results_dir, &self.settings.unique_dir_prefix)?
        } else {
            results_dir
        };
        into_directory_context(base)
    }
}

/// The directory context is a string; a path that is not valid UTF-8 is
/// rejected rather than renamed.
fn into_directory_context(path: PathBuf) -> Result<String, FlowscopeError> {
    path.into_os_string().into_string().map_err(|raw| {
        FlowscopeError::config(format!(
            "results directory {} is not valid UTF-8",
            PathBuf::from(raw).display()
        ))
    })
}

/// Builds tracked functions from one set of [`Settings`].
#[derive(Clone)]
pub struct Tracker {
    settings: Arc<Settings>,
    allocator: Arc<dyn DirectoryAllocator>,
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl Tracker {
    /// Creates a tracker using the default [`TimestampAllocator`].
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Arc::new(settings),
            allocator: Arc::new(TimestampAllocator::new()),
        }
    }

    /// Replaces the unique directory allocator.
    #[must_use]
    pub fn with_allocator(mut self, allocator: Arc<dyn DirectoryAllocator>) -> Self {
        self.allocator = allocator;
        self
    }

    /// Returns the settings wrappers are built from.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Wraps `func` as a tracked node.
    ///
    /// With `autodiscover_dir` disabled the result is a passthrough that
    /// calls `func` directly.
    pub fn track<F>(&self, name: impl Into<String>, kind: NodeKind, func: F) -> TrackedFn<F> {
        let policy = self.settings.autodiscover_dir.then(|| DirectoryPolicy {
            settings: self.settings.clone(),
            allocator: self.allocator.clone(),
        });
        TrackedFn {
            name: name.into(),
            kind,
            func,
            policy,
        }
    }

    /// Wraps `func` as a job.
    pub fn job<F>(&self, name: impl Into<String>, func: F) -> TrackedFn<F> {
        self.track(name, NodeKind::Job, func)
    }

    /// Wraps `func` as a flow.
    pub fn flow<F>(&self, name: impl Into<String>, func: F) -> TrackedFn<F> {
        self.track(name, NodeKind::Flow, func)
    }

    /// Wraps `func` as a subflow.
    pub fn subflow<F>(&self, name: impl Into<String>, func: F) -> TrackedFn<F> {
        self.track(name, NodeKind::Subflow, func)
    }
}

/// A function that maintains the execution context around each call.
///
/// The wrapped function returns `Result<T, E>`; its errors come back
/// unchanged. `E` must absorb [`FlowscopeError`] because allocating a
/// top-level results directory can fail before the function runs.
#[derive(Clone)]
pub struct TrackedFn<F> {
    name: String,
    kind: NodeKind,
    func: F,
    policy: Option<DirectoryPolicy>,
}

impl<F> fmt::Debug for TrackedFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedFn")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("tracking", &self.is_tracking())
            .finish_non_exhaustive()
    }
}

impl<F> TrackedFn<F> {
    /// Returns the node name pushed on each call.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the node kind pushed on each call.
    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Returns false for a passthrough built with tracking disabled.
    #[must_use]
    pub const fn is_tracking(&self) -> bool {
        self.policy.is_some()
    }

    /// Returns the wrapped function.
    #[must_use]
    pub const fn inner(&self) -> &F {
        &self.func
    }

    /// Unwraps the original function.
    pub fn into_inner(self) -> F {
        self.func
    }

    /// Computes the state a call runs in, restoring `envelope` first.
    fn enter_state(
        &self,
        policy: &DirectoryPolicy,
        envelope: Option<ContextEnvelope>,
    ) -> Result<ExecutionState, FlowscopeError> {
        let mut state = current_state();
        if let Some(envelope) = envelope {
            if let Some(stack) = envelope.ctx {
                state.stack = stack;
            }
            if let Some(directory) = envelope.dir {
                state.directory = directory;
            }
        }
        if state.stack.is_empty() {
            let base = policy.resolve_base_dir()?;
            debug!(name = %self.name, directory = %base, "Top-level call");
            state.directory = base;
        }
        state.stack = state
            .stack
            .pushed(ContextNode::new(self.name.clone(), self.kind));
        Ok(state)
    }
}

impl<F> TrackedFn<F> {
    /// Calls the function in the current context.
    pub fn call<A, T, E>(&self, args: A) -> Result<T, E>
    where
        F: Fn(A) -> Result<T, E>,
        E: From<FlowscopeError>,
    {
        self.call_with_envelope(args, None)
    }

    /// Calls the function after restoring the envelope that came with the
    /// arguments.
    pub fn call_enveloped<A, T, E>(&self, task: Enveloped<A>) -> Result<T, E>
    where
        F: Fn(A) -> Result<T, E>,
        E: From<FlowscopeError>,
    {
        let (args, envelope) = task.into_parts();
        self.call_with_envelope(args, Some(envelope))
    }

    /// Calls the function, restoring `envelope` (if any) for the duration of
    /// the call. A passthrough ignores the envelope.
    pub fn call_with_envelope<A, T, E>(
        &self,
        args: A,
        envelope: Option<ContextEnvelope>,
    ) -> Result<T, E>
    where
        F: Fn(A) -> Result<T, E>,
        E: From<FlowscopeError>,
    {
        let Some(policy) = &self.policy else {
            return (self.func)(args);
        };

        let _restored = envelope.map(ContextEnvelope::restore);

        let _directory = if is_top_level() {
            let base = policy.resolve_base_dir()?;
            debug!(name = %self.name, directory = %base, "Top-level call");
            Some(push_directory_context(base))
        } else {
            None
        };

        let _node = push_context(self.name.as_str(), self.kind);
        (self.func)(args)
    }
}

impl<F> TrackedFn<F> {
    /// Calls an async function. The context is decided when the returned
    /// future is first polled, and the function's future runs in its own
    /// [`ContextScoped`] so it may move between runtime threads.
    pub async fn call_async<A, Fut, T, E>(&self, args: A) -> Result<T, E>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<FlowscopeError>,
    {
        self.call_async_with_envelope(args, None).await
    }

    /// Async counterpart of [`TrackedFn::call_enveloped`].
    pub async fn call_async_enveloped<A, Fut, T, E>(&self, task: Enveloped<A>) -> Result<T, E>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<FlowscopeError>,
    {
        let (args, envelope) = task.into_parts();
        self.call_async_with_envelope(args, Some(envelope)).await
    }

    /// Async counterpart of [`TrackedFn::call_with_envelope`]. The function
    /// itself is invoked inside the call's scope, so code that runs before
    /// its future is first awaited already sees the pushed node.
    pub async fn call_async_with_envelope<A, Fut, T, E>(
        &self,
        args: A,
        envelope: Option<ContextEnvelope>,
    ) -> Result<T, E>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<FlowscopeError>,
    {
        let Some(policy) = &self.policy else {
            return (self.func)(args).await;
        };

        let state = self.enter_state(policy, envelope)?;
        ContextScoped::with_state(state, async move { (self.func)(args).await }).await
    }
}

#[doc(hidden)]
pub fn last_path_segment(path: &'static str) -> &'static str {
    path.rsplit("::").next().map_or(path, str::trim)
}

/// Wraps a named function, using its identifier as the node name.
///
/// ```rust,ignore
/// let relax = track!(tracker, NodeKind::Job, recipes::relax_job);
/// assert_eq!(relax.name(), "relax_job");
/// ```
#[macro_export]
macro_rules! track {
    ($tracker:expr, $kind:expr, $($segment:ident)::+) => {
        $tracker.track(
            $crate::tracked::last_path_segment(stringify!($($segment)::+)),
            $kind,
            $($segment)::+,
        )
    };
}
