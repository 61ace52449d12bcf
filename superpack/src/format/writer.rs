//! Superpack archive writer.

use std::collections::HashSet;
use std::io::Write;

use bytes::Bytes;
use flate2::write::DeflateEncoder;

use super::error::{FormatError, FormatResult};
use super::footer::FooterBlock;
use super::table::{encode_table, normalize_path, Compression, FileEntry, Header};
use super::{FORMAT_VERSION, HEADER_SIZE};
use crate::hash::ContentHasher;

struct PendingFile {
    path: String,
    data: Vec<u8>,
    compression: Compression,
}

/// Builds a superpack archive in memory.
///
/// # Example
///
/// ```
/// use superpack::format::{Compression, PackArchive, PackWriter};
/// use superpack::hash::Sha256Hasher;
///
/// let mut writer = PackWriter::new();
/// writer.add_file("config/game.ini", b"[game]\n".to_vec(), Compression::None).unwrap();
/// let bytes = writer.finish(&Sha256Hasher).unwrap();
///
/// let archive = PackArchive::parse(bytes).unwrap();
/// assert_eq!(archive.read("config/game.ini").unwrap(), b"[game]\n");
/// ```
#[derive(Default)]
pub struct PackWriter {
    files: Vec<PendingFile>,
    seen: HashSet<String>,
}

impl PackWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files added so far.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Add a file. The path is normalized; duplicates are rejected.
    pub fn add_file(
        &mut self,
        path: &str,
        data: Vec<u8>,
        compression: Compression,
    ) -> FormatResult<&mut Self> {
        let path = normalize_path(path)?;
        if !self.seen.insert(path.clone()) {
            return Err(FormatError::DuplicatePath(path));
        }
        self.files.push(PendingFile {
            path,
            data,
            compression,
        });
        Ok(self)
    }

    /// Lay out header, payloads, file table and footer.
    ///
    /// The footer's content hash is computed with `hasher` over every byte
    /// preceding the footer.
    pub fn finish(self, hasher: &dyn ContentHasher) -> FormatResult<Bytes> {
        let header = Header::new(self.files.len() as u32);
        let mut out = Vec::new();
        out.extend_from_slice(&header.encode());

        let mut entries = Vec::with_capacity(self.files.len());
        let mut compressed_size = 0u64;
        let mut uncompressed_size = 0u64;

        for file in self.files {
            let stored = match file.compression {
                Compression::None => file.data.clone(),
                Compression::Deflate => deflate(&file.path, &file.data)?,
            };
            entries.push(FileEntry {
                path: file.path,
                data_offset: out.len() as u64,
                stored_size: stored.len() as u64,
                original_size: file.data.len() as u64,
                compression: file.compression,
            });
            compressed_size += stored.len() as u64;
            uncompressed_size += file.data.len() as u64;
            out.extend_from_slice(&stored);
        }

        let files_table_offset = out.len() as u64;
        let table = encode_table(&entries);
        out.extend_from_slice(&table);

        let footer = FooterBlock {
            files_table_offset,
            files_table_size: table.len() as u32,
            file_count: entries.len() as u32,
            compressed_size,
            uncompressed_size,
            body_size: out.len() as u64,
            content_hash: hasher.hash(&out),
            version: FORMAT_VERSION,
        };
        debug_assert!(footer.files_table_offset >= HEADER_SIZE as u64);
        out.extend_from_slice(&footer.encode());

        Ok(Bytes::from(out))
    }
}

fn deflate(path: &str, data: &[u8]) -> FormatResult<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), flate2::Compression::default());
    let to_error = |source| FormatError::Compression {
        path: path.to_string(),
        source,
    };
    encoder.write_all(data).map_err(to_error)?;
    encoder.finish().map_err(to_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FOOTER_SIZE;
    use crate::hash::Sha256Hasher;

    #[test]
    fn test_empty_archive_layout() {
        let bytes = PackWriter::new().finish(&Sha256Hasher).unwrap();

        assert_eq!(bytes.len(), HEADER_SIZE + FOOTER_SIZE);
        let footer = FooterBlock::decode(&bytes[HEADER_SIZE..]).unwrap();
        assert_eq!(footer.file_count, 0);
        assert_eq!(footer.body_size, HEADER_SIZE as u64);
        assert_eq!(footer.content_hash, Sha256Hasher.hash(&bytes[..HEADER_SIZE]));
    }

    #[test]
    fn test_duplicate_path_rejected() {
        let mut writer = PackWriter::new();
        writer
            .add_file("a/b.txt", vec![1], Compression::None)
            .unwrap();

        let result = writer.add_file("/a//b.txt", vec![2], Compression::None);
        assert!(matches!(result, Err(FormatError::DuplicatePath(p)) if p == "a/b.txt"));
        assert_eq!(writer.len(), 1);
    }

    #[test]
    fn test_sizes_recorded_in_footer() {
        let mut writer = PackWriter::new();
        writer
            .add_file("raw.bin", vec![1u8; 64], Compression::None)
            .unwrap()
            .add_file("zeros.bin", vec![0u8; 4096], Compression::Deflate)
            .unwrap();
        let bytes = writer.finish(&Sha256Hasher).unwrap();

        let footer = FooterBlock::decode(&bytes[bytes.len() - FOOTER_SIZE..]).unwrap();
        assert_eq!(footer.file_count, 2);
        assert_eq!(footer.uncompressed_size, 64 + 4096);
        assert!(footer.compressed_size < footer.uncompressed_size);
        assert_eq!(footer.archive_size(), bytes.len() as u64);
    }
}
