//! Error types for flowscope.
//!
//! Tracking never fails on its own: the only errors it produces come from
//! allocating a results directory. Everything else here belongs to the
//! surrounding helpers (configuration, envelopes, job directories).

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for flowscope operations.
#[derive(Debug, Error)]
pub enum FlowscopeError {
    /// A unique results directory could not be created.
    #[error("Failed to allocate a directory under {base}: {message}")]
    DirectoryAllocation {
        /// The base path the allocation was attempted under.
        base: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// A job directory was requested outside of any tracked call.
    #[error("No tracked call is executing in the current context")]
    NoActiveContext,

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for FlowscopeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl FlowscopeError {
    /// Creates a directory allocation error.
    #[must_use]
    pub fn allocation(base: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::DirectoryAllocation {
            base: base.into(),
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Result alias used across the crate.
pub type Result<T, E = FlowscopeError> = std::result::Result<T, E>;
