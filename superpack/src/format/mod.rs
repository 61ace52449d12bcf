//! Superpack container format.
//!
//! A superpack bundles many asset files into a single archive followed by a
//! fixed-size footer block:
//!
//! ```text
//! +--------------------+  offset 0
//! | Header (16 bytes)  |  magic "SPAK", version, file count, reserved
//! +--------------------+
//! | File data          |  payloads, raw or deflate
//! +--------------------+  files_table_offset
//! | File table         |  path, offset, stored size, original size, compression
//! +--------------------+  body_size
//! | Footer (80 bytes)  |  sizes, table location, content hash, version, "SPKF"
//! +--------------------+
//! ```
//!
//! All integers are little-endian. The footer's content hash covers every
//! byte before the footer, so a client can fetch just the footer with a
//! suffix range request, learn the archive size and hash, and verify the body
//! once it has been downloaded.

mod archive;
mod error;
mod footer;
mod table;
mod writer;

pub use archive::PackArchive;
pub use error::{FormatError, FormatResult};
pub use footer::{FooterBlock, FOOTER_SIZE};
pub use table::{normalize_path, Compression, FileEntry};
pub use writer::PackWriter;

/// Magic bytes at the start of every archive.
pub const HEADER_MAGIC: [u8; 4] = *b"SPAK";

/// Marker closing the footer block.
pub const FOOTER_MARKER: [u8; 4] = *b"SPKF";

/// Size in bytes of the archive header.
pub const HEADER_SIZE: usize = 16;

/// Current format version.
pub const FORMAT_VERSION: u32 = 1;

/// File extension used for superpack archives.
pub const PACK_EXTENSION: &str = "spak";
