//! Error types for the pack container format.

use thiserror::Error;

/// Result type for format operations.
pub type FormatResult<T> = Result<T, FormatError>;

/// Errors raised while encoding or decoding a superpack archive.
#[derive(Debug, Error)]
pub enum FormatError {
    /// Footer bytes are not exactly `FOOTER_SIZE` long.
    #[error("footer size mismatch: expected {expected} bytes, got {actual}")]
    FooterSize { expected: usize, actual: usize },

    /// Footer does not end with the pack marker.
    #[error("invalid footer marker {found:?}")]
    BadFooterMarker { found: [u8; 4] },

    /// Header does not start with the pack magic.
    #[error("invalid header magic {found:?}")]
    BadHeaderMagic { found: [u8; 4] },

    /// Archive declares a format version this reader does not understand.
    #[error("unsupported pack format version {0}")]
    UnsupportedVersion(u32),

    /// Archive is shorter than its structures require.
    #[error("archive truncated: need {needed} bytes, have {available}")]
    Truncated { needed: u64, available: u64 },

    /// Offsets or sizes in the footer/table disagree with each other.
    #[error("inconsistent archive layout: {0}")]
    Layout(String),

    /// File table entry could not be decoded.
    #[error("corrupt file table: {0}")]
    FileTable(String),

    /// Body hash does not match the footer's declared hash.
    #[error("content hash mismatch: footer declares {expected}, body hashes to {actual}")]
    HashMismatch { expected: String, actual: String },

    /// Path is empty, absolute, escapes the archive root or is otherwise unusable.
    #[error("invalid path in archive: {0:?}")]
    InvalidPath(String),

    /// Two entries share the same normalized path.
    #[error("duplicate path in archive: {0}")]
    DuplicatePath(String),

    /// Requested file is not present in the archive.
    #[error("file not found in archive: {0}")]
    FileNotFound(String),

    /// Deflate stream failed to compress or inflate.
    #[error("compression error for {path}: {source}")]
    Compression {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_footer_size_display() {
        let err = FormatError::FooterSize {
            expected: 80,
            actual: 12,
        };
        assert_eq!(
            err.to_string(),
            "footer size mismatch: expected 80 bytes, got 12"
        );
    }

    #[test]
    fn test_hash_mismatch_display() {
        let err = FormatError::HashMismatch {
            expected: "abc".to_string(),
            actual: "def".to_string(),
        };
        assert!(err.to_string().contains("abc"));
        assert!(err.to_string().contains("def"));
    }
}
