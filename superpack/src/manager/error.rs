//! Error types for the pack manager.

use thiserror::Error;

use crate::config::ConfigError;
use crate::download::DownloadError;
use crate::index::IndexError;
use crate::store::StoreError;

/// Result type for manager operations.
pub type ManagerResult<T> = Result<T, PackManagerError>;

/// Errors that can occur in pack manager operations.
///
/// Failures of individual requests are not reported here; they are recorded
/// on the request and surfaced as [`crate::events::PackEvent::RequestFailed`].
#[derive(Debug, Error)]
pub enum PackManagerError {
    /// The pack is not in the index.
    #[error("unknown pack: {0}")]
    UnknownPack(String),

    /// No live request exists for the pack.
    #[error("no active request for pack {0}")]
    NoActiveRequest(String),

    /// Local pack storage failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The download manager could not be created.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// The pack index could not be loaded.
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            PackManagerError::UnknownPack("ghost".to_string()).to_string(),
            "unknown pack: ghost"
        );
        assert_eq!(
            PackManagerError::NoActiveRequest("core".to_string()).to_string(),
            "no active request for pack core"
        );
    }

    #[test]
    fn test_from_store_error() {
        let err: PackManagerError = StoreError::InvalidName("..".to_string()).into();
        assert!(matches!(err, PackManagerError::Store(_)));
    }
}
