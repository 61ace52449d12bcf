//! Collaborators shared by the pack manager and its requests.

use std::fmt;
use std::sync::Arc;

use crate::config::PackManagerConfig;
use crate::download::DownloadManager;
use crate::events::EventDispatcher;
use crate::hash::{ContentHasher, Sha256Hasher};
use crate::mount::MountPoint;
use crate::store::LocalPackStore;

/// Injected dependencies of pack requests.
///
/// Everything a request talks to lives here, so tests can swap in a
/// [`crate::download::MemoryDownloadManager`] or a custom mount point.
pub struct PackServices {
    pub config: PackManagerConfig,
    pub downloader: Arc<dyn DownloadManager>,
    pub mount_point: Arc<dyn MountPoint>,
    pub hasher: Arc<dyn ContentHasher>,
    /// Where verified archives are kept. `None` disables persistence.
    pub store: Option<LocalPackStore>,
    pub events: EventDispatcher,
}

impl PackServices {
    /// Services with SHA-256 hashing and a store at the configured directory.
    pub fn new(
        config: PackManagerConfig,
        downloader: Arc<dyn DownloadManager>,
        mount_point: Arc<dyn MountPoint>,
    ) -> Self {
        let store = config.local_packs_dir.clone().map(LocalPackStore::new);
        Self {
            config,
            downloader,
            mount_point,
            hasher: Arc::new(Sha256Hasher),
            store,
            events: EventDispatcher::new(),
        }
    }

    pub fn with_hasher(mut self, hasher: Arc<dyn ContentHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn with_events(mut self, events: EventDispatcher) -> Self {
        self.events = events;
        self
    }

    /// URL of the archive for `pack_name`.
    pub fn pack_url(&self, pack_name: &str) -> String {
        self.config.pack_url(pack_name)
    }
}

impl fmt::Debug for PackServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackServices")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::MemoryDownloadManager;
    use crate::mount::VirtualFileSystem;

    #[test]
    fn test_store_follows_config() {
        let services = PackServices::new(
            PackManagerConfig::new("http://packs").with_local_packs_dir("/tmp/superpack"),
            Arc::new(MemoryDownloadManager::new()),
            Arc::new(VirtualFileSystem::new()),
        );
        assert_eq!(
            services.store.as_ref().map(|s| s.dir().to_path_buf()),
            Some("/tmp/superpack".into())
        );
        assert_eq!(services.pack_url("core"), "http://packs/core.spak");

        let services = PackServices::new(
            PackManagerConfig::new("http://packs").without_local_storage(),
            Arc::new(MemoryDownloadManager::new()),
            Arc::new(VirtualFileSystem::new()),
        );
        assert!(services.store.is_none());
    }
}
