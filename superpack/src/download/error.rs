//! Error types for download tasks.

use thiserror::Error;

use super::types::TaskId;

/// Result type for download operations.
pub type DownloadResult<T> = Result<T, DownloadError>;

/// Errors reported by a [`super::DownloadManager`] task.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DownloadError {
    /// Transport-level failure (DNS, connection reset, TLS, read error).
    #[error("failed to download {url}: {reason}")]
    Http { url: String, reason: String },

    /// Server answered with a non-success status.
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// Request exceeded the configured timeout.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    /// Remote object does not exist.
    #[error("remote object not found: {0}")]
    NotFound(String),

    /// Requested range cannot be served from the object.
    #[error("range {range} not satisfiable for {url} ({size} bytes)")]
    RangeNotSatisfiable {
        url: String,
        range: String,
        size: u64,
    },

    /// Transfer ended before the expected number of bytes arrived.
    #[error("incomplete transfer of {url}: expected {expected} bytes, received {received}")]
    Incomplete {
        url: String,
        expected: u64,
        received: u64,
    },

    /// Task was cancelled before it completed.
    #[error("task {0} was cancelled")]
    Cancelled(TaskId),

    /// Result requested before the task finished.
    #[error("task {0} has not finished")]
    NotFinished(TaskId),

    /// Task id is unknown or its result was already taken.
    #[error("unknown task {0}")]
    UnknownTask(TaskId),

    /// The download manager itself could not be set up.
    #[error("download manager setup failed: {0}")]
    Setup(String),
}

impl DownloadError {
    /// Whether this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// HTTP status code, when the server answered.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
