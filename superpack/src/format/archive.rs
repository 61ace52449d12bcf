//! Read access to a complete superpack archive.

use std::io::Read;

use bytes::Bytes;
use flate2::read::DeflateDecoder;

use super::error::{FormatError, FormatResult};
use super::footer::{FooterBlock, FOOTER_SIZE};
use super::table::{decode_table, normalize_path, Compression, FileEntry, Header};
use super::HEADER_SIZE;
use crate::hash::ContentHasher;

/// Upper bound on the buffer reserved up front for an inflated file.
const MAX_PREALLOCATION: u64 = 16 * 1024 * 1024;

/// A parsed, structurally valid archive held in memory.
#[derive(Debug, Clone)]
pub struct PackArchive {
    data: Bytes,
    footer: FooterBlock,
    entries: Vec<FileEntry>,
}

impl PackArchive {
    /// Parse an archive, validating header, footer and file table.
    ///
    /// The content hash is not checked; use [`PackArchive::verify`].
    pub fn parse(data: Bytes) -> FormatResult<Self> {
        let len = data.len() as u64;
        let minimum = (HEADER_SIZE + FOOTER_SIZE) as u64;
        if len < minimum {
            return Err(FormatError::Truncated {
                needed: minimum,
                available: len,
            });
        }

        let footer = FooterBlock::decode(&data[data.len() - FOOTER_SIZE..])?;
        if footer.archive_size() != len {
            return Err(FormatError::Layout(format!(
                "footer declares {} bytes but archive has {}",
                footer.archive_size(),
                len
            )));
        }

        let header = Header::decode(&data[..HEADER_SIZE])?;
        if header.file_count != footer.file_count {
            return Err(FormatError::Layout(format!(
                "header lists {} files, footer lists {}",
                header.file_count, footer.file_count
            )));
        }

        let table_start = footer.files_table_offset as usize;
        let table_end = footer.body_size as usize;
        let entries = decode_table(&data[table_start..table_end], footer.file_count)?;

        let mut stored_total = 0u64;
        for entry in &entries {
            let end = entry
                .data_offset
                .checked_add(entry.stored_size)
                .ok_or_else(|| FormatError::Layout(format!("{} overflows", entry.path)))?;
            if entry.data_offset < HEADER_SIZE as u64 || end > footer.files_table_offset {
                return Err(FormatError::Layout(format!(
                    "{} lies outside the data region",
                    entry.path
                )));
            }
            stored_total += entry.stored_size;
        }
        if stored_total != footer.compressed_size {
            return Err(FormatError::Layout(format!(
                "entries store {} bytes, footer declares {}",
                stored_total, footer.compressed_size
            )));
        }

        Ok(Self {
            data,
            footer,
            entries,
        })
    }

    /// Parse and verify the body hash in one step.
    pub fn parse_verified(data: Bytes, hasher: &dyn ContentHasher) -> FormatResult<Self> {
        let archive = Self::parse(data)?;
        archive.verify(hasher)?;
        Ok(archive)
    }

    /// Check the body against the footer's declared hash.
    pub fn verify(&self, hasher: &dyn ContentHasher) -> FormatResult<()> {
        let actual = hasher.hash(self.body());
        if actual != self.footer.content_hash {
            return Err(FormatError::HashMismatch {
                expected: self.footer.content_hash.to_hex(),
                actual: actual.to_hex(),
            });
        }
        Ok(())
    }

    pub fn footer(&self) -> &FooterBlock {
        &self.footer
    }

    /// Bytes covered by the content hash.
    pub fn body(&self) -> &[u8] {
        &self.data[..self.footer.body_size as usize]
    }

    /// File table entries in archive order.
    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    /// Look up an entry by path (normalized before lookup).
    pub fn find(&self, path: &str) -> Option<&FileEntry> {
        let path = normalize_path(path).ok()?;
        self.entries.iter().find(|e| e.path == path)
    }

    /// Read and decompress a file.
    pub fn read(&self, path: &str) -> FormatResult<Vec<u8>> {
        let entry = self
            .find(path)
            .ok_or_else(|| FormatError::FileNotFound(path.to_string()))?;
        self.read_entry(entry)
    }

    /// Read and decompress the file described by `entry`.
    pub fn read_entry(&self, entry: &FileEntry) -> FormatResult<Vec<u8>> {
        let start = entry.data_offset as usize;
        let stored = &self.data[start..start + entry.stored_size as usize];

        match entry.compression {
            Compression::None => Ok(stored.to_vec()),
            Compression::Deflate => {
                let capacity = entry.original_size.min(MAX_PREALLOCATION) as usize;
                let mut out = Vec::with_capacity(capacity);
                DeflateDecoder::new(stored)
                    .take(entry.original_size.saturating_add(1))
                    .read_to_end(&mut out)
                    .map_err(|source| FormatError::Compression {
                        path: entry.path.clone(),
                        source,
                    })?;
                if out.len() as u64 != entry.original_size {
                    return Err(FormatError::Layout(format!(
                        "{} inflated to {} bytes, expected {}",
                        entry.path,
                        out.len(),
                        entry.original_size
                    )));
                }
                Ok(out)
            }
        }
    }

    /// The raw archive bytes.
    pub fn as_bytes(&self) -> &Bytes {
        &self.data
    }
}
