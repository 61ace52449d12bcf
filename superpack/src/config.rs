//! Configuration for the pack manager.
//!
//! Settings can be built in code with the builder methods or loaded from an
//! INI file:
//!
//! ```ini
//! [server]
//! url = https://cdn.example.com/packs
//!
//! [storage]
//! packs_dir = /var/cache/game/packs
//! mount_path = assets
//!
//! [download]
//! timeout_secs = 30
//! max_concurrent_downloads = 4
//! max_concurrent_requests = 2
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::format::PACK_EXTENSION;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read or parse the INI file.
    #[error("failed to load config {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    /// INI text is malformed.
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// A value could not be interpreted.
    #[error("invalid value {value:?} for [{section}] {key}: {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// Configuration for the [`crate::manager::PackManager`].
#[derive(Debug, Clone, PartialEq)]
pub struct PackManagerConfig {
    /// Base URL under which `<pack>.spak` archives are served.
    pub server_url: String,

    /// Directory for verified archives. `None` disables local storage.
    pub local_packs_dir: Option<PathBuf>,

    /// Virtual path under which pack contents are mounted.
    pub mount_path: String,

    /// HTTP request timeout.
    pub timeout: Duration,

    /// Maximum concurrent transfers on the download worker pool.
    pub max_concurrent_downloads: usize,

    /// Maximum requests with download work in flight at once.
    ///
    /// Requests beyond this limit wait in priority order; requests already in
    /// flight are never preempted.
    pub max_concurrent_requests: usize,
}

impl Default for PackManagerConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            local_packs_dir: dirs::cache_dir().map(|d| d.join("superpack").join("packs")),
            mount_path: String::new(),
            timeout: Duration::from_secs(30),
            max_concurrent_downloads: 4,
            max_concurrent_requests: 1,
        }
    }
}

impl PackManagerConfig {
    /// Create a new configuration for the given pack server.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Default::default()
        }
    }

    /// Set the local packs directory.
    pub fn with_local_packs_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_packs_dir = Some(path.into());
        self
    }

    /// Disable local storage of downloaded packs.
    pub fn without_local_storage(mut self) -> Self {
        self.local_packs_dir = None;
        self
    }

    /// Set the virtual mount path.
    pub fn with_mount_path(mut self, path: impl Into<String>) -> Self {
        self.mount_path = path.into();
        self
    }

    /// Set the HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum concurrent downloads.
    pub fn with_max_concurrent_downloads(mut self, max: usize) -> Self {
        self.max_concurrent_downloads = max.max(1);
        self
    }

    /// Set the maximum requests in flight.
    pub fn with_max_concurrent_requests(mut self, max: usize) -> Self {
        self.max_concurrent_requests = max.max(1);
        self
    }

    /// URL of the archive for `pack_name`.
    ///
    /// The name is used as is; names accepted by the pack index need no
    /// escaping.
    pub fn pack_url(&self, pack_name: &str) -> String {
        format!(
            "{}/{}.{}",
            self.server_url.trim_end_matches('/'),
            pack_name,
            PACK_EXTENSION
        )
    }

    /// Load configuration from an INI file. Missing keys keep their defaults.
    pub fn from_ini_file(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    /// Parse configuration from INI text.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = get(ini, "server", "url") {
            config.server_url = url.to_string();
        }
        if let Some(dir) = get(ini, "storage", "packs_dir") {
            config.local_packs_dir = if dir.is_empty() {
                None
            } else {
                Some(PathBuf::from(dir))
            };
        }
        if let Some(mount_path) = get(ini, "storage", "mount_path") {
            config.mount_path = mount_path.to_string();
        }
        if let Some(secs) = parse::<u64>(ini, "download", "timeout_secs")? {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(max) = parse::<usize>(ini, "download", "max_concurrent_downloads")? {
            config = config.with_max_concurrent_downloads(max);
        }
        if let Some(max) = parse::<usize>(ini, "download", "max_concurrent_requests")? {
            config = config.with_max_concurrent_requests(max);
        }
        Ok(config)
    }
}

fn get<'a>(ini: &'a Ini, section: &str, key: &str) -> Option<&'a str> {
    ini.section(Some(section))
        .and_then(|props| props.get(key))
        .map(str::trim)
}

fn parse<T>(ini: &Ini, section: &str, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(ini, section, key) {
        None => Ok(None),
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                section: section.to_string(),
                key: key.to_string(),
                value: value.to_string(),
                reason: e.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PackManagerConfig::default();
        assert!(config.server_url.is_empty());
        assert_eq!(config.max_concurrent_downloads, 4);
        assert_eq!(config.max_concurrent_requests, 1);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_builder_pattern() {
        let config = PackManagerConfig::new("https://cdn.example.com/packs/")
            .with_local_packs_dir("/cache/packs")
            .with_mount_path("assets")
            .with_timeout(Duration::from_secs(60))
            .with_max_concurrent_downloads(8)
            .with_max_concurrent_requests(0);

        assert_eq!(config.local_packs_dir, Some(PathBuf::from("/cache/packs")));
        assert_eq!(config.mount_path, "assets");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.max_concurrent_downloads, 8);
        assert_eq!(config.max_concurrent_requests, 1);
        assert!(config.without_local_storage().local_packs_dir.is_none());
    }

    #[test]
    fn test_pack_url() {
        let config = PackManagerConfig::new("https://cdn.example.com/packs/");
        assert_eq!(
            config.pack_url("level1"),
            "https://cdn.example.com/packs/level1.spak"
        );
    }

    #[test]
    fn test_from_ini_str() {
        let config = PackManagerConfig::from_ini_str(
            "[server]\nurl = http://localhost:8080\n\n[storage]\npacks_dir = /tmp/packs\nmount_path = data\n\n[download]\ntimeout_secs = 5\nmax_concurrent_downloads = 2\nmax_concurrent_requests = 3\n",
        )
        .unwrap();

        assert_eq!(config.server_url, "http://localhost:8080");
        assert_eq!(config.local_packs_dir, Some(PathBuf::from("/tmp/packs")));
        assert_eq!(config.mount_path, "data");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_concurrent_downloads, 2);
        assert_eq!(config.max_concurrent_requests, 3);
    }

    #[test]
    fn test_from_ini_empty_packs_dir_disables_storage() {
        let config = PackManagerConfig::from_ini_str("[storage]\npacks_dir =\n").unwrap();
        assert!(config.local_packs_dir.is_none());
    }

    #[test]
    fn test_from_ini_invalid_number() {
        let result = PackManagerConfig::from_ini_str("[download]\ntimeout_secs = soon\n");

        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "timeout_secs"
        ));
    }

    #[test]
    fn test_from_ini_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("superpack.ini");
        std::fs::write(&path, "[server]\nurl = http://packs\n").unwrap();

        let config = PackManagerConfig::from_ini_file(&path).unwrap();
        assert_eq!(config.server_url, "http://packs");

        assert!(matches!(
            PackManagerConfig::from_ini_file(&temp.path().join("missing.ini")),
            Err(ConfigError::Load { .. })
        ));
    }
}
