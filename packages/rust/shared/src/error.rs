//! Error types for reviewtopics.
//!
//! Library crates use [`ReviewTopicsError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all reviewtopics operations.
#[derive(Debug, thiserror::Error)]
pub enum ReviewTopicsError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level failure: connection, timeout, non-2xx status, unreadable body.
    #[error("network error: {0}")]
    Network(String),

    /// A response that arrived intact but does not have the expected shape.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// CSV persistence error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Topic-model bridge error (spawn, protocol, or model failure).
    #[error("topic model error: {0}")]
    TopicModel(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad URL, mismatched lengths, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ReviewTopicsError>;

impl ReviewTopicsError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether retrying the same request could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}
