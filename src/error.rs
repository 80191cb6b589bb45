//! Error types for weft.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while building an index.
///
/// Nothing is recovered inside the build pipeline: every error aborts the
/// build and propagates to the caller. A partially written index directory
/// is detected by [`crate::manifest::check_complete`] on the next attempt.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Nonsensical configuration (zero dimension, `nbits` out of range, empty collection).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The passage encoder failed or returned inconsistent shapes.
    #[error("encoder error: {0}")]
    Encoder(String),

    /// Input too small for the requested statistics (e.g. fewer residual
    /// components than quantization buckets).
    #[error("degenerate input: {0}")]
    Degenerate(String),

    /// File I/O failure, tagged with the operation and path.
    #[error("{op} failed for {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed on-disk data (bad magic, version, dtype, or shape).
    #[error("format error in {}: {reason}", path.display())]
    Format { path: PathBuf, reason: String },

    /// The existence check found an incomplete index directory.
    #[error("incomplete index at {}: missing {}", path.display(), missing.join(", "))]
    Incomplete { path: PathBuf, missing: Vec<String> },
}

impl IndexError {
    /// Build a `map_err` closure that tags an I/O error with operation and path.
    pub(crate) fn io(
        op: &'static str,
        path: impl Into<PathBuf>,
    ) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { op, path, source }
    }

    /// Build a `map_err` closure for malformed file contents.
    pub(crate) fn format(path: impl Into<PathBuf>) -> impl FnOnce(String) -> Self {
        let path = path.into();
        move |reason| Self::Format { path, reason }
    }
}

/// Result type alias for weft operations.
pub type Result<T> = std::result::Result<T, IndexError>;
