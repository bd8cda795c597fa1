//! Error types for Doc2MD.
//!
//! Library crates use [`Doc2MdError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Doc2MD operations.
#[derive(Debug, thiserror::Error)]
pub enum Doc2MdError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level failure (connect, timeout, body read).
    #[error("network error: {0}")]
    Network(String),

    /// The remote server answered with a non-success status.
    #[error("{url}: HTTP {status}")]
    Http { url: String, status: u16 },

    /// Malformed input document (PDF, DOCX, HTML).
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Caller-supplied input rejected before any conversion was attempted.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The URL targets a loopback, private, or otherwise internal host.
    #[error("blocked URL: {0}")]
    Blocked(String),

    /// A conversion step produced no usable Markdown.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, Doc2MdError>;

impl Doc2MdError {
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

    /// Create a conversion error from any displayable message.
    pub fn conversion(msg: impl Into<String>) -> Self {
        Self::Conversion(msg.into())
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error was caused by the caller's input rather than by a
    /// failed conversion.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::Blocked(_))
    }
}
