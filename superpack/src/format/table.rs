//! Archive header and file table encoding.

use bytes::{Buf, BufMut};

use super::error::{FormatError, FormatResult};
use super::{FORMAT_VERSION, HEADER_MAGIC, HEADER_SIZE};

/// How a file's payload is stored inside the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Compression {
    /// Stored verbatim.
    None = 0,
    /// Raw deflate stream.
    Deflate = 1,
}

impl Compression {
    fn from_u8(value: u8) -> FormatResult<Self> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Deflate),
            other => Err(FormatError::FileTable(format!(
                "unknown compression kind {}",
                other
            ))),
        }
    }

    /// Short lowercase name, for listings.
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "raw",
            Self::Deflate => "deflate",
        }
    }
}

/// Fixed archive header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u32,
    pub file_count: u32,
}

impl Header {
    pub fn new(file_count: u32) -> Self {
        Self {
            version: FORMAT_VERSION,
            file_count,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        let mut buf = &mut out[..];
        buf.put_slice(&HEADER_MAGIC);
        buf.put_u32_le(self.version);
        buf.put_u32_le(self.file_count);
        buf.put_u32_le(0);
        out
    }

    pub fn decode(bytes: &[u8]) -> FormatResult<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(FormatError::Truncated {
                needed: HEADER_SIZE as u64,
                available: bytes.len() as u64,
            });
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[..4]);
        if magic != HEADER_MAGIC {
            return Err(FormatError::BadHeaderMagic { found: magic });
        }

        let mut buf = &bytes[4..HEADER_SIZE];
        let version = buf.get_u32_le();
        let file_count = buf.get_u32_le();
        if version != FORMAT_VERSION {
            return Err(FormatError::UnsupportedVersion(version));
        }
        Ok(Self {
            version,
            file_count,
        })
    }
}

/// One file table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Normalized relative path.
    pub path: String,
    /// Offset of the payload from the start of the archive.
    pub data_offset: u64,
    /// Payload size as stored.
    pub stored_size: u64,
    /// Size after decompression.
    pub original_size: u64,
    pub compression: Compression,
}

/// Fixed part of an encoded entry, excluding the path bytes.
const ENTRY_FIXED_SIZE: usize = 2 + 8 + 8 + 8 + 1;

/// Encode entries into the on-disk file table.
pub fn encode_table(entries: &[FileEntry]) -> Vec<u8> {
    let size: usize = entries
        .iter()
        .map(|e| ENTRY_FIXED_SIZE + e.path.len())
        .sum();
    let mut out = Vec::with_capacity(size);
    for entry in entries {
        out.put_u16_le(entry.path.len() as u16);
        out.put_slice(entry.path.as_bytes());
        out.put_u64_le(entry.data_offset);
        out.put_u64_le(entry.stored_size);
        out.put_u64_le(entry.original_size);
        out.put_u8(entry.compression as u8);
    }
    out
}

/// Decode `count` entries from an encoded file table.
///
/// The table must be consumed exactly; trailing bytes are an error.
pub fn decode_table(mut table: &[u8], count: u32) -> FormatResult<Vec<FileEntry>> {
    // Every entry takes at least ENTRY_FIXED_SIZE bytes.
    if count as usize > table.len() / ENTRY_FIXED_SIZE {
        return Err(FormatError::FileTable(format!(
            "{} entries cannot fit in {} bytes",
            count,
            table.len()
        )));
    }
    let mut entries = Vec::with_capacity(count as usize);
    for index in 0..count {
        if table.remaining() < 2 {
            return Err(FormatError::FileTable(format!(
                "entry {} truncated before path length",
                index
            )));
        }
        let path_len = table.get_u16_le() as usize;
        if table.remaining() < path_len + ENTRY_FIXED_SIZE - 2 {
            return Err(FormatError::FileTable(format!("entry {} truncated", index)));
        }
        let path = std::str::from_utf8(&table[..path_len])
            .map_err(|_| FormatError::FileTable(format!("entry {} path is not UTF-8", index)))?
            .to_string();
        table.advance(path_len);

        let data_offset = table.get_u64_le();
        let stored_size = table.get_u64_le();
        let original_size = table.get_u64_le();
        let compression = Compression::from_u8(table.get_u8())?;

        entries.push(FileEntry {
            path: normalize_path(&path)?,
            data_offset,
            stored_size,
            original_size,
            compression,
        });
    }

    if table.has_remaining() {
        return Err(FormatError::FileTable(format!(
            "{} trailing bytes after {} entries",
            table.remaining(),
            count
        )));
    }
    Ok(entries)
}

/// Normalize an archive path: `/` separators, no leading slash, no `.` or
/// `..` segments, no empty segments.
pub fn normalize_path(path: &str) -> FormatResult<String> {
    let replaced = path.replace('\\', "/");
    let mut segments = Vec::new();
    for segment in replaced.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(FormatError::InvalidPath(path.to_string())),
            s => segments.push(s),
        }
    }
    if segments.is_empty() {
        return Err(FormatError::InvalidPath(path.to_string()));
    }
    let normalized = segments.join("/");
    if normalized.len() > u16::MAX as usize {
        return Err(FormatError::InvalidPath(path.to_string()));
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, offset: u64) -> FileEntry {
        FileEntry {
            path: path.to_string(),
            data_offset: offset,
            stored_size: 10,
            original_size: 20,
            compression: Compression::Deflate,
        }
    }

    #[test]
    fn test_header_encode_decode() {
        let header = Header::new(3);
        let decoded = Header::decode(&header.encode()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_header_bad_magic() {
        let mut bytes = Header::new(1).encode();
        bytes[0] = b'Z';
        assert!(matches!(
            Header::decode(&bytes),
            Err(FormatError::BadHeaderMagic { .. })
        ));
    }

    #[test]
    fn test_header_truncated() {
        assert!(matches!(
            Header::decode(&HEADER_MAGIC),
            Err(FormatError::Truncated { .. })
        ));
    }

    #[test]
    fn test_table_encode_decode() {
        let entries = vec![entry("textures/grass.dds", 16), entry("maps/a.map", 26)];
        let table = encode_table(&entries);

        let decoded = decode_table(&table, 2).unwrap();
        assert_eq!(decoded, entries);
    }

    #[test]
    fn test_table_trailing_bytes() {
        let mut table = encode_table(&[entry("a", 16)]);
        table.push(0);

        assert!(matches!(
            decode_table(&table, 1),
            Err(FormatError::FileTable(_))
        ));
    }

    #[test]
    fn test_table_truncated() {
        let table = encode_table(&[entry("a", 16)]);

        assert!(decode_table(&table[..table.len() - 3], 1).is_err());
        assert!(decode_table(&table, 2).is_err());
    }

    #[test]
    fn test_table_count_larger_than_table() {
        assert!(matches!(
            decode_table(&[], u32::MAX),
            Err(FormatError::FileTable(_))
        ));
        let table = encode_table(&[entry("a", 16)]);
        assert!(matches!(
            decode_table(&table, u32::MAX),
            Err(FormatError::FileTable(_))
        ));
    }

    #[test]
    fn test_table_unknown_compression() {
        let mut table = encode_table(&[entry("a", 16)]);
        let last = table.len() - 1;
        table[last] = 9;

        assert!(matches!(
            decode_table(&table, 1),
            Err(FormatError::FileTable(_))
        ));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/a//b/./c.txt").unwrap(), "a/b/c.txt");
        assert_eq!(normalize_path("a\\b").unwrap(), "a/b");
        assert!(normalize_path("a/../b").is_err());
        assert!(normalize_path("/").is_err());
        assert!(normalize_path("").is_err());
    }
}
