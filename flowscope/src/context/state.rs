//! Process-local execution state and the guards that scope changes to it.
//!
//! Each thread owns one `(stack, directory)` slot. Futures wrapped in
//! [`ContextScoped`](super::ContextScoped) run inside a tokio task-local
//! slot instead, which shadows the thread's slot for as long as the task
//! scope is active, on whichever worker thread polls it.

use super::{ContextNode, ContextStack, NodeKind};
use std::cell::RefCell;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{debug, warn};

/// The full context of one isolation unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ExecutionState {
    pub(crate) stack: ContextStack,
    pub(crate) directory: String,
}

thread_local! {
    static STATE: RefCell<ExecutionState> = RefCell::new(ExecutionState::default());
}

tokio::task_local! {
    pub(crate) static TASK_STATE: RefCell<ExecutionState>;
}

/// Guards must be dropped on the thread that created them.
type NotSend = PhantomData<Rc<()>>;

/// Runs `f` against the active slot: the task scope if one is entered,
/// otherwise the thread's own.
///
/// `None` once the thread's storage has been torn down.
fn with_slot<R>(f: impl FnOnce(&RefCell<ExecutionState>) -> R) -> Option<R> {
    let mut f = Some(f);
    if let Ok(result) = TASK_STATE.try_with(|slot| f.take().map(|f| f(slot))) {
        return result;
    }
    let f = f.take()?;
    STATE.try_with(f).ok()
}

pub(crate) fn current_state() -> ExecutionState {
    with_slot(|slot| slot.borrow().clone()).unwrap_or_default()
}

fn replace_stack(next: ContextStack) -> Option<ContextStack> {
    with_slot(|slot| std::mem::replace(&mut slot.borrow_mut().stack, next))
}

fn replace_directory(next: String) -> Option<String> {
    with_slot(|slot| std::mem::replace(&mut slot.borrow_mut().directory, next))
}

/// Returns a snapshot of the current context stack.
#[must_use]
pub fn get_context() -> ContextStack {
    with_slot(|slot| slot.borrow().stack.clone()).unwrap_or_default()
}

/// Overwrites the current context stack.
///
/// Only meant for restoring a stack captured elsewhere; ordinary nesting goes
/// through [`push_context`].
pub fn set_context(stack: ContextStack) {
    replace_stack(stack);
}

/// Returns the current base output directory, or an empty string if unset.
#[must_use]
pub fn get_directory_context() -> String {
    with_slot(|slot| slot.borrow().directory.clone()).unwrap_or_default()
}

/// Overwrites the current base output directory.
///
/// Only meant for restoring a directory captured elsewhere.
pub fn set_directory_context(path: impl Into<String>) {
    replace_directory(path.into());
}

/// Returns true if no tracked call is currently executing.
#[must_use]
pub fn is_top_level() -> bool {
    with_slot(|slot| slot.borrow().stack.is_empty()).unwrap_or(true)
}

/// Returns the slash-joined names of the current stack, outermost first.
#[must_use]
pub fn get_context_path() -> String {
    with_slot(|slot| slot.borrow().stack.path()).unwrap_or_default()
}

/// Returns the directory context joined with the context path.
///
/// `None` when no directory context is established.
#[must_use]
pub fn current_output_dir() -> Option<PathBuf> {
    with_slot(|slot| {
        let state = slot.borrow();
        if state.directory.is_empty() {
            return None;
        }
        let mut dir = PathBuf::from(&state.directory);
        for node in &state.stack {
            dir.push(&node.name);
        }
        Some(dir)
    })
    .flatten()
}

/// Scope of one pushed [`ContextNode`]. Dropping it restores the stack that
/// was current before the push.
#[must_use = "the node is popped as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ContextGuard {
    previous: ContextStack,
    node: ContextNode,
    _not_send: NotSend,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let previous = std::mem::take(&mut self.previous);
        let depth = previous.len() + 1;
        if let Some(current) = replace_stack(previous) {
            if current.len() != depth || current.last() != Some(&self.node) {
                warn!(
                    node = %self.node.name,
                    current = %current.path(),
                    "Context guard dropped out of order"
                );
            }
        }
    }
}

/// Pushes a node onto the current stack for the lifetime of the guard.
pub fn push_context(name: impl Into<String>, kind: NodeKind) -> ContextGuard {
    let node = ContextNode::new(name, kind);
    let previous = get_context();
    let next = previous.pushed(node.clone());
    debug!(path = %next.path(), kind = %kind, "Entering context");
    replace_stack(next);
    ContextGuard {
        previous,
        node,
        _not_send: PhantomData,
    }
}

/// Pushes a flow node for the lifetime of the guard.
pub fn flow_context(name: impl Into<String>) -> ContextGuard {
    push_context(name, NodeKind::Flow)
}

/// Scope of one directory context value.
#[must_use = "the directory is reset as soon as the guard is dropped"]
#[derive(Debug)]
pub struct DirectoryGuard {
    previous: String,
    _not_send: NotSend,
}

impl Drop for DirectoryGuard {
    fn drop(&mut self) {
        replace_directory(std::mem::take(&mut self.previous));
    }
}

/// Sets the directory context for the lifetime of the guard.
pub fn push_directory_context(path: impl Into<String>) -> DirectoryGuard {
    let path = path.into();
    debug!(directory = %path, "Entering directory context");
    let previous = replace_directory(path).unwrap_or_default();
    DirectoryGuard {
        previous,
        _not_send: PhantomData,
    }
}

/// Alias of [`push_directory_context`].
pub fn directory_context(path: impl Into<String>) -> DirectoryGuard {
    push_directory_context(path)
}

/// Scope of a restored context. Only the parts that were actually restored
/// are put back on drop.
#[must_use = "the restored context is undone as soon as the guard is dropped"]
#[derive(Debug)]
pub struct RestoreGuard {
    previous_stack: Option<ContextStack>,
    previous_directory: Option<String>,
    _not_send: NotSend,
}

impl RestoreGuard {
    /// Returns true if anything was restored.
    #[must_use]
    pub const fn restored(&self) -> bool {
        self.previous_stack.is_some() || self.previous_directory.is_some()
    }
}

impl Drop for RestoreGuard {
    fn drop(&mut self) {
        if let Some(directory) = self.previous_directory.take() {
            replace_directory(directory);
        }
        if let Some(stack) = self.previous_stack.take() {
            replace_stack(stack);
        }
    }
}

/// Overwrites the stack and/or directory with captured values for the
/// lifetime of the guard. `None` leaves that part untouched.
pub fn restore_context(stack: Option<ContextStack>, directory: Option<String>) -> RestoreGuard {
    let previous_stack = stack.map(|stack| {
        debug!(path = %stack.path(), "Restoring context stack");
        replace_stack(stack).unwrap_or_default()
    });
    let previous_directory = directory.map(|directory| {
        debug!(directory = %directory, "Restoring directory context");
        replace_directory(directory).unwrap_or_default()
    });
    RestoreGuard {
        previous_stack,
        previous_directory,
        _not_send: PhantomData,
    }
}
