//! Error types for qexp.
//!
//! Library crates use [`QexpError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all qexp operations.
#[derive(Debug, thiserror::Error)]
pub enum QexpError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while talking to a remote source.
    #[error("network error: {0}")]
    Network(String),

    /// Malformed remote response or markup.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Cache or id-store error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid input data (seed files, identities).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Graph construction or traversal error.
    #[error("graph error: {0}")]
    Graph(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, QexpError>;

impl QexpError {
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
}
