//! CLI error type.

use std::fmt;
use std::io;
use std::path::PathBuf;

use superpack::format::FormatError;
use superpack::index::IndexError;
use superpack::resolve::ResolveError;
use superpack::{ConfigError, PackManagerError};

/// Errors reported by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Missing or contradictory command-line settings.
    Config(String),

    /// Config file could not be loaded.
    ConfigFile(ConfigError),

    /// Filesystem access failed.
    Io { path: PathBuf, source: io::Error },

    /// Archive could not be built or read.
    Format(FormatError),

    /// Manifest could not be loaded.
    Index(IndexError),

    /// Dependencies could not be resolved.
    Resolve(ResolveError),

    /// Pack manager setup failed.
    Manager(PackManagerError),

    /// Some requested packs failed.
    FetchFailed(usize),

    /// Stopped by the user.
    Interrupted,
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "{}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            CliError::Format(e) => write!(f, "{}", e),
            CliError::Index(e) => write!(f, "{}", e),
            CliError::Resolve(e) => write!(f, "{}", e),
            CliError::Manager(e) => write!(f, "{}", e),
            CliError::FetchFailed(count) => write!(f, "{} pack request(s) failed", count),
            CliError::Interrupted => write!(f, "interrupted"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::Io { source, .. } => Some(source),
            CliError::Format(e) => Some(e),
            CliError::Index(e) => Some(e),
            CliError::Resolve(e) => Some(e),
            CliError::Manager(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<FormatError> for CliError {
    fn from(e: FormatError) -> Self {
        CliError::Format(e)
    }
}

impl From<IndexError> for CliError {
    fn from(e: IndexError) -> Self {
        CliError::Index(e)
    }
}

impl From<ResolveError> for CliError {
    fn from(e: ResolveError) -> Self {
        CliError::Resolve(e)
    }
}

impl From<PackManagerError> for CliError {
    fn from(e: PackManagerError) -> Self {
        CliError::Manager(e)
    }
}

/// Attach the path to an I/O error.
pub fn io_error(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> CliError {
    let path = path.into();
    move |source| CliError::Io { path, source }
}
