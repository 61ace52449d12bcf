//! Terminal failures of a pack request.

use thiserror::Error;

use crate::download::DownloadError;
use crate::format::FormatError;
use crate::hash::ContentHash;
use crate::mount::MountError;
use crate::resolve::ResolveError;
use crate::store::StoreError;

/// Why a request entered the `Error` state.
///
/// None of these are retried automatically; the client has to request the
/// pack again.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The footer could not be fetched from the server.
    #[error("footer of pack {pack} is unreachable: {source}")]
    FooterUnreachable { pack: String, source: DownloadError },

    /// The footer bytes are malformed or undersized.
    #[error("footer of pack {pack} is invalid: {source}")]
    Footer { pack: String, source: FormatError },

    /// The body transfer failed or was partial.
    #[error("download of pack {pack} failed: {source}")]
    Download { pack: String, source: DownloadError },

    /// The downloaded body does not match the footer's hash.
    #[error("pack {pack} is corrupted: expected hash {expected}, computed {actual}")]
    Integrity {
        pack: String,
        expected: ContentHash,
        actual: ContentHash,
    },

    /// The verified archive could not be written to local storage.
    #[error("failed to store pack {pack}: {source}")]
    Store { pack: String, source: StoreError },

    /// The mount point rejected the archive.
    #[error("failed to mount pack {pack}: {source}")]
    Mount { pack: String, source: MountError },

    /// Dependencies of the root pack could not be expanded.
    #[error("failed to resolve dependencies: {0}")]
    Resolve(#[from] ResolveError),
}

impl RequestError {
    /// Pack the failure belongs to, when it is tied to one.
    pub fn pack(&self) -> Option<&str> {
        match self {
            Self::FooterUnreachable { pack, .. }
            | Self::Footer { pack, .. }
            | Self::Download { pack, .. }
            | Self::Integrity { pack, .. }
            | Self::Store { pack, .. }
            | Self::Mount { pack, .. } => Some(pack),
            Self::Resolve(_) => None,
        }
    }

    /// Whether the failure is a corrupted download.
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity { .. })
    }
}
