//! Results directory allocation.
//!
//! Two kinds of directories exist: the base directory of one top-level call,
//! handed out by a [`DirectoryAllocator`], and the per-job directories that
//! recipes create beneath it with [`make_job_dir`].

use crate::context::{get_context, get_directory_context};
use crate::errors::{FlowscopeError, Result};
use chrono::Utc;
use rand::Rng;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Attempts before giving up on finding an unused unique name.
const MAX_UNIQUE_ATTEMPTS: usize = 16;

/// Hands out base directories for top-level tracked calls.
///
/// Implementations must never return the same path twice, including to
/// concurrent callers.
#[cfg_attr(test, mockall::automock)]
pub trait DirectoryAllocator: Send + Sync {
    /// Creates a new directory under `base` whose name starts with `prefix`.
    fn make_unique_dir(&self, base: &Path, prefix: &str) -> Result<PathBuf>;
}

/// Names directories `<prefix><UTC timestamp>-<5 random digits>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampAllocator;

impl TimestampAllocator {
    /// Creates a new allocator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn candidate_name(prefix: &str) -> String {
        let stamp = Utc::now().format("%Y-%m-%d-%H-%M-%S-%6f");
        let salt: u32 = rand::thread_rng().gen_range(10_000..=99_999);
        format!("{prefix}{stamp}-{salt}")
    }
}

impl DirectoryAllocator for TimestampAllocator {
    fn make_unique_dir(&self, base: &Path, prefix: &str) -> Result<PathBuf> {
        fs::create_dir_all(base)
            .map_err(|e| FlowscopeError::allocation(base, e.to_string()))?;

        for _ in 0..MAX_UNIQUE_ATTEMPTS {
            let candidate = base.join(Self::candidate_name(prefix));
            match fs::create_dir(&candidate) {
                Ok(()) => {
                    debug!(directory = %candidate.display(), "Allocated unique directory");
                    return Ok(candidate);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(FlowscopeError::allocation(base, e.to_string())),
            }
        }

        Err(FlowscopeError::allocation(
            base,
            format!("no unused name found after {MAX_UNIQUE_ATTEMPTS} attempts"),
        ))
    }
}

/// Creates the output directory of the innermost tracked call.
///
/// The directory is `<directory context>/<enclosing node names>/<name>-<n>`
/// with `n` the smallest index not already taken, so repeated calls of the
/// same job inside one flow land in `relax_job-0`, `relax_job-1`, and so on.
/// Creation is atomic, so concurrent jobs never share an index.
pub fn make_job_dir() -> Result<PathBuf> {
    let stack = get_context();
    let Some((leaf, parents)) = stack.nodes().split_last() else {
        return Err(FlowscopeError::NoActiveContext);
    };

    let mut parent = PathBuf::from(get_directory_context());
    for node in parents {
        parent.push(&node.name);
    }
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(&parent)?;
    }

    let mut index = 0usize;
    loop {
        let candidate = parent.join(format!("{}-{index}", leaf.name));
        match fs::create_dir(&candidate) {
            Ok(()) => {
                debug!(directory = %candidate.display(), "Created job directory");
                return Ok(candidate);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => index += 1,
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{flow_context, push_context, push_directory_context, NodeKind};
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_timestamp_allocator_creates_distinct_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let allocator = TimestampAllocator::new();

        let first = allocator.make_unique_dir(tmp.path(), "run-").unwrap();
        let second = allocator.make_unique_dir(tmp.path(), "run-").unwrap();

        assert_ne!(first, second);
        assert!(first.is_dir());
        assert!(second.is_dir());
        assert!(first
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("run-"));
    }

    #[test]
    fn test_timestamp_allocator_creates_missing_base() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().join("not/yet/there");

        let dir = TimestampAllocator::new().make_unique_dir(&base, "x-").unwrap();
        assert_eq!(dir.parent(), Some(base.as_path()));
    }

    #[test]
    fn test_timestamp_allocator_is_unique_across_threads() {
        let tmp = tempfile::tempdir().unwrap();
        let base = Arc::new(tmp.path().to_path_buf());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let base = base.clone();
                std::thread::spawn(move || {
                    (0..4)
                        .map(|_| TimestampAllocator.make_unique_dir(&base, "p-").unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let all: HashSet<PathBuf> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(all.len(), 32);
    }

    #[test]
    fn test_make_job_dir_outside_context() {
        let err = make_job_dir().unwrap_err();
        assert!(matches!(err, FlowscopeError::NoActiveContext));
    }

    #[test]
    fn test_make_job_dir_indexes() {
        let tmp = tempfile::tempdir().unwrap();
        let _dir = push_directory_context(tmp.path().to_string_lossy());
        let _flow = flow_context("bulk_to_slabs_flow");

        let made: Vec<PathBuf> = (0..3)
            .map(|_| {
                let _job = push_context("relax_job", NodeKind::Job);
                make_job_dir().unwrap()
            })
            .collect();

        let expected: Vec<PathBuf> = (0..3)
            .map(|i| tmp.path().join(format!("bulk_to_slabs_flow/relax_job-{i}")))
            .collect();
        assert_eq!(made, expected);
    }

    #[test]
    fn test_make_job_dir_under_absolute_flow_name() {
        let tmp = tempfile::tempdir().unwrap();
        let _flow = flow_context(tmp.path().to_string_lossy());
        let _job = push_context("relax_job", NodeKind::Job);

        let dir = make_job_dir().unwrap();
        assert_eq!(dir, tmp.path().join("relax_job-0"));
    }
}
