//! The pack data model.

use std::fmt;

use crate::hash::ContentHash;

/// Lifecycle state of a pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PackState {
    /// Not downloaded and not claimed by any request.
    #[default]
    NotRequested,
    /// A request is currently downloading or verifying the pack.
    Downloading,
    /// The archive is mounted.
    Mounted,
    /// The last attempt failed.
    Error,
}

impl PackState {
    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotRequested => "not requested",
            Self::Downloading => "downloading",
            Self::Mounted => "mounted",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for PackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named, addressable unit of content.
#[derive(Debug, Clone, PartialEq)]
pub struct Pack {
    /// Unique pack name.
    pub name: String,

    /// Scheduling priority; higher downloads sooner.
    pub priority: f32,

    /// Archive size in bytes.
    ///
    /// Starts as the manifest's declared size and is replaced by the
    /// footer-declared size once the footer has been fetched.
    pub size: u64,

    /// Bytes of this pack confirmed downloaded.
    pub downloaded_size: u64,

    pub state: PackState,

    /// Names of packs that must be mounted before this one.
    pub dependencies: Vec<String>,

    /// Content hash from the footer, once known.
    pub content_hash: Option<ContentHash>,
}

impl Pack {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            priority: 0.0,
            size,
            downloaded_size: 0,
            state: PackState::NotRequested,
            dependencies: Vec::new(),
            content_hash: None,
        }
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_priority(mut self, priority: f32) -> Self {
        self.priority = priority;
        self
    }

    pub fn is_mounted(&self) -> bool {
        self.state == PackState::Mounted
    }

    /// Forget download progress. Declared size, priority and dependencies stay.
    pub fn reset(&mut self) {
        self.state = PackState::NotRequested;
        self.downloaded_size = 0;
        self.content_hash = None;
    }
}

impl fmt::Display for Pack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes, {})", self.name, self.size, self.state)
    }
}
