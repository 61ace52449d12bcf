//! Mounting verified archives into a virtual filesystem namespace.

mod vfs;

use bytes::Bytes;
use thiserror::Error;

use crate::format::FormatError;

pub use vfs::VirtualFileSystem;

/// Result type for mount operations.
pub type MountResult<T> = Result<T, MountError>;

/// Errors raised by a [`MountPoint`].
#[derive(Debug, Error)]
pub enum MountError {
    /// Archive could not be parsed.
    #[error("archive rejected: {0}")]
    Format(#[from] FormatError),

    /// A file of the archive is already provided by another mounted pack.
    #[error("path {path} is already provided by pack {existing_pack}")]
    Conflict { path: String, existing_pack: String },

    /// A pack with this name is already mounted.
    #[error("pack {0} is already mounted")]
    AlreadyMounted(String),

    /// No pack with this name is mounted.
    #[error("pack {0} is not mounted")]
    NotMounted(String),

    /// Mount path is not a valid relative path.
    #[error("invalid mount path: {0:?}")]
    InvalidMountPath(String),

    /// No mounted pack provides the file.
    #[error("file not found: {0}")]
    FileNotFound(String),
}

/// Destination for verified pack archives.
pub trait MountPoint: Send + Sync {
    /// Register the files of `archive` under `mount_path`.
    ///
    /// Fails without side effects if any file would shadow a file of an
    /// already mounted pack.
    fn mount(&self, pack_name: &str, archive: Bytes, mount_path: &str) -> MountResult<()>;

    /// Remove every file registered by `pack_name`.
    fn unmount(&self, pack_name: &str) -> MountResult<()>;

    fn is_mounted(&self, pack_name: &str) -> bool;
}
