//! Fixed-size footer block trailing every superpack.
//!
//! The footer is the only part of a remote archive the pack request reads
//! before committing to the full download: a suffix range request for the last
//! [`FOOTER_SIZE`] bytes yields the body size, the declared content hash and
//! the file table location.

use bytes::{Buf, BufMut};

use super::error::{FormatError, FormatResult};
use super::{FOOTER_MARKER, FORMAT_VERSION, HEADER_SIZE};
use crate::hash::{ContentHash, HASH_LEN};

/// Size in bytes of an encoded [`FooterBlock`].
pub const FOOTER_SIZE: usize = 80;

/// Decoded footer block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FooterBlock {
    /// Offset of the file table from the start of the archive.
    pub files_table_offset: u64,
    /// Encoded size of the file table.
    pub files_table_size: u32,
    /// Number of entries in the file table.
    pub file_count: u32,
    /// Sum of stored (possibly compressed) file sizes.
    pub compressed_size: u64,
    /// Sum of original file sizes.
    pub uncompressed_size: u64,
    /// Number of bytes preceding the footer; the hashed region.
    pub body_size: u64,
    /// Hash over the body.
    pub content_hash: ContentHash,
    /// Format version the archive was written with.
    pub version: u32,
}

impl FooterBlock {
    /// Total archive size including the footer itself.
    pub fn archive_size(&self) -> u64 {
        self.body_size + FOOTER_SIZE as u64
    }

    /// Decode a footer from exactly [`FOOTER_SIZE`] bytes.
    ///
    /// Performs structural checks only; the content hash is verified
    /// separately once the body is available.
    pub fn decode(bytes: &[u8]) -> FormatResult<Self> {
        if bytes.len() != FOOTER_SIZE {
            return Err(FormatError::FooterSize {
                expected: FOOTER_SIZE,
                actual: bytes.len(),
            });
        }

        let mut marker = [0u8; 4];
        marker.copy_from_slice(&bytes[FOOTER_SIZE - 4..]);
        if marker != FOOTER_MARKER {
            return Err(FormatError::BadFooterMarker { found: marker });
        }

        let mut buf = bytes;
        let files_table_offset = buf.get_u64_le();
        let files_table_size = buf.get_u32_le();
        let file_count = buf.get_u32_le();
        let compressed_size = buf.get_u64_le();
        let uncompressed_size = buf.get_u64_le();
        let body_size = buf.get_u64_le();
        let mut hash = [0u8; HASH_LEN];
        buf.copy_to_slice(&mut hash);
        let version = buf.get_u32_le();

        if version != FORMAT_VERSION {
            return Err(FormatError::UnsupportedVersion(version));
        }

        let footer = Self {
            files_table_offset,
            files_table_size,
            file_count,
            compressed_size,
            uncompressed_size,
            body_size,
            content_hash: ContentHash::from_bytes(hash),
            version,
        };
        footer.check_layout()?;
        Ok(footer)
    }

    /// Encode the footer into its on-disk representation.
    pub fn encode(&self) -> [u8; FOOTER_SIZE] {
        let mut out = [0u8; FOOTER_SIZE];
        let mut buf = &mut out[..];
        buf.put_u64_le(self.files_table_offset);
        buf.put_u32_le(self.files_table_size);
        buf.put_u32_le(self.file_count);
        buf.put_u64_le(self.compressed_size);
        buf.put_u64_le(self.uncompressed_size);
        buf.put_u64_le(self.body_size);
        buf.put_slice(self.content_hash.as_bytes());
        buf.put_u32_le(self.version);
        buf.put_slice(&FOOTER_MARKER);
        out
    }

    fn check_layout(&self) -> FormatResult<()> {
        if self.body_size > u64::MAX - FOOTER_SIZE as u64 {
            return Err(FormatError::Layout(format!(
                "body size {} leaves no room for the footer",
                self.body_size
            )));
        }
        let table_end = self
            .files_table_offset
            .checked_add(u64::from(self.files_table_size))
            .ok_or_else(|| FormatError::Layout("file table offset overflows".to_string()))?;

        if self.files_table_offset < HEADER_SIZE as u64 {
            return Err(FormatError::Layout(format!(
                "file table at {} overlaps header",
                self.files_table_offset
            )));
        }
        if table_end != self.body_size {
            return Err(FormatError::Layout(format!(
                "file table ends at {} but body is {} bytes",
                table_end, self.body_size
            )));
        }
        if self.compressed_size > self.files_table_offset - HEADER_SIZE as u64 {
            return Err(FormatError::Layout(format!(
                "declared data size {} exceeds data region",
                self.compressed_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FooterBlock {
        FooterBlock {
            files_table_offset: 116,
            files_table_size: 40,
            file_count: 2,
            compressed_size: 100,
            uncompressed_size: 150,
            body_size: 156,
            content_hash: ContentHash::from_bytes([7; HASH_LEN]),
            version: FORMAT_VERSION,
        }
    }

    #[test]
    fn test_encode_decode() {
        let footer = sample();
        let encoded = footer.encode();

        assert_eq!(&encoded[FOOTER_SIZE - 4..], &FOOTER_MARKER);
        assert_eq!(FooterBlock::decode(&encoded).unwrap(), footer);
        assert_eq!(footer.archive_size(), 156 + FOOTER_SIZE as u64);
    }

    #[test]
    fn test_decode_rejects_short_input() {
        let encoded = sample().encode();
        let result = FooterBlock::decode(&encoded[1..]);

        assert!(matches!(
            result,
            Err(FormatError::FooterSize {
                expected: FOOTER_SIZE,
                actual: 79
            })
        ));
    }

    #[test]
    fn test_decode_rejects_bad_marker() {
        let mut encoded = sample().encode();
        encoded[FOOTER_SIZE - 1] = b'X';

        assert!(matches!(
            FooterBlock::decode(&encoded),
            Err(FormatError::BadFooterMarker { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_unknown_version() {
        let mut footer = sample();
        footer.version = 9;

        assert!(matches!(
            FooterBlock::decode(&footer.encode()),
            Err(FormatError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn test_decode_rejects_table_outside_body() {
        let mut footer = sample();
        footer.body_size = 500;

        assert!(matches!(
            FooterBlock::decode(&footer.encode()),
            Err(FormatError::Layout(_))
        ));
    }

    #[test]
    fn test_decode_rejects_table_in_header() {
        let mut footer = sample();
        footer.files_table_offset = 4;
        footer.body_size = 44;
        footer.compressed_size = 0;

        assert!(matches!(
            FooterBlock::decode(&footer.encode()),
            Err(FormatError::Layout(_))
        ));
    }

    #[test]
    fn test_decode_rejects_body_size_overflow() {
        let mut footer = sample();
        footer.files_table_offset = u64::MAX;
        footer.files_table_size = 0;
        footer.compressed_size = 0;
        footer.body_size = u64::MAX;

        assert!(matches!(
            FooterBlock::decode(&footer.encode()),
            Err(FormatError::Layout(_))
        ));
    }
}
