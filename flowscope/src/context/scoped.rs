//! Per-task context isolation for async code.

use super::state::{current_state, ExecutionState, TASK_STATE};
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::task::futures::TaskLocalFuture;

/// A future that carries its own execution context.
///
/// The future runs inside a task-local scope, so tracked calls made by it
/// see the same stack no matter which runtime worker polls it, and nothing
/// leaks into other tasks sharing that worker.
#[must_use = "futures do nothing unless polled"]
pub struct ContextScoped<F> {
    inner: Pin<Box<TaskLocalFuture<RefCell<ExecutionState>, F>>>,
}

impl<F: Future> ContextScoped<F> {
    pub(crate) fn with_state(state: ExecutionState, future: F) -> Self {
        Self {
            inner: Box::pin(TASK_STATE.scope(RefCell::new(state), future)),
        }
    }
}

impl<F> std::fmt::Debug for ContextScoped<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextScoped").finish_non_exhaustive()
    }
}

impl<F: Future> Future for ContextScoped<F> {
    type Output = F::Output;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

/// Runs `future` in a fresh, empty context.
pub fn scoped<F: Future>(future: F) -> ContextScoped<F> {
    ContextScoped::with_state(ExecutionState::default(), future)
}

/// Runs `future` in a copy of the caller's current context.
pub fn in_current_context<F: Future>(future: F) -> ContextScoped<F> {
    ContextScoped::with_state(current_state(), future)
}

/// Spawns `future` on the tokio runtime with a copy of the caller's context.
pub fn spawn_in_current_context<F>(future: F) -> tokio::task::JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(in_current_context(future))
}
