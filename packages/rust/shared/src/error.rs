//! Error types for buildline.
//!
//! Library crates use [`BuildlineError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

use crate::types::HistoryKind;

/// Top-level error type for all buildline operations.
///
/// Most per-item failures never reach this type: a missing build in the
/// metadata provider is `Ok(None)`, a malformed tag is silently skipped.
/// Only listing failures and the empty-history guard travel upward.
#[derive(Debug, thiserror::Error)]
pub enum BuildlineError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport failure, timeout, or unexpected HTTP status.
    #[error("network error: {0}")]
    Network(String),

    /// The listing provider refused the request (HTTP 403/429).
    #[error("rate limited: {url}")]
    RateLimited { url: String },

    /// Response body could not be decoded.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad artifact contents, invalid record, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A run produced zero records for a history; the existing artifact was kept.
    #[error("refusing to overwrite {history} history with an empty result")]
    EmptyHistory { history: HistoryKind },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BuildlineError>;

impl BuildlineError {
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

    /// Whether this error is the provider's rate-limit response.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}
