//! Local storage of verified pack archives.
//!
//! Archives that passed the hash check are written here so the next
//! initialization can mount them without touching the network.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use thiserror::Error;

use crate::format::PACK_EXTENSION;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from the local pack store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to read a stored archive.
    #[error("failed to read {}: {source}", path.display())]
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write an archive.
    #[error("failed to write {}: {source}", path.display())]
    WriteFailed { path: PathBuf, source: io::Error },

    /// Failed to create the store directory.
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDirFailed { path: PathBuf, source: io::Error },

    /// Pack name cannot be used as a file name.
    #[error("invalid pack name for local storage: {0:?}")]
    InvalidName(String),
}

/// Directory of downloaded archives, one file per pack.
#[derive(Debug, Clone)]
pub struct LocalPackStore {
    dir: PathBuf,
}

impl LocalPackStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the archive for `pack_name`.
    pub fn path_for(&self, pack_name: &str) -> StoreResult<PathBuf> {
        if pack_name.is_empty()
            || pack_name.contains(['/', '\\'])
            || pack_name == "."
            || pack_name == ".."
        {
            return Err(StoreError::InvalidName(pack_name.to_string()));
        }
        Ok(self
            .dir
            .join(format!("{}.{}", pack_name, PACK_EXTENSION)))
    }

    pub fn contains(&self, pack_name: &str) -> bool {
        self.path_for(pack_name)
            .map(|p| p.is_file())
            .unwrap_or(false)
    }

    /// Write an archive, replacing any previous copy.
    ///
    /// The data goes to a temporary file first and is renamed into place, so
    /// a crash never leaves a truncated archive under the final name.
    pub fn save(&self, pack_name: &str, data: &[u8]) -> StoreResult<PathBuf> {
        let path = self.path_for(pack_name)?;
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::CreateDirFailed {
            path: self.dir.clone(),
            source: e,
        })?;

        let staging = path.with_extension(format!("{}.part", PACK_EXTENSION));
        fs::write(&staging, data).map_err(|e| StoreError::WriteFailed {
            path: staging.clone(),
            source: e,
        })?;
        fs::rename(&staging, &path).map_err(|e| StoreError::WriteFailed {
            path: path.clone(),
            source: e,
        })?;

        tracing::debug!(pack = pack_name, path = %path.display(), bytes = data.len(), "Stored pack archive");
        Ok(path)
    }

    /// Read a stored archive, or `None` if the pack was never stored.
    pub fn load(&self, pack_name: &str) -> StoreResult<Option<Bytes>> {
        let path = self.path_for(pack_name)?;
        match fs::read(&path) {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::ReadFailed { path, source: e }),
        }
    }

    /// Delete a stored archive. Missing files are not an error.
    pub fn remove(&self, pack_name: &str) -> StoreResult<()> {
        let path = self.path_for(pack_name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::WriteFailed { path, source: e }),
        }
    }

    /// Names of all stored packs, sorted.
    pub fn list(&self) -> StoreResult<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::ReadFailed {
                    path: self.dir.clone(),
                    source: e,
                })
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(PACK_EXTENSION))
            .filter_map(|path| {
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .map(str::to_string)
            })
            .collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let store = LocalPackStore::new(temp.path().join("packs"));

        let path = store.save("base", b"archive bytes").unwrap();

        assert!(path.ends_with("base.spak"));
        assert!(store.contains("base"));
        assert_eq!(
            store.load("base").unwrap(),
            Some(Bytes::from_static(b"archive bytes"))
        );
    }

    #[test]
    fn test_load_missing() {
        let temp = TempDir::new().unwrap();
        let store = LocalPackStore::new(temp.path());

        assert_eq!(store.load("nothing").unwrap(), None);
        assert!(!store.contains("nothing"));
    }

    #[test]
    fn test_overwrite_and_remove() {
        let temp = TempDir::new().unwrap();
        let store = LocalPackStore::new(temp.path());

        store.save("a", b"one").unwrap();
        store.save("a", b"two").unwrap();
        assert_eq!(store.load("a").unwrap(), Some(Bytes::from_static(b"two")));

        store.remove("a").unwrap();
        store.remove("a").unwrap();
        assert!(!store.contains("a"));
    }

    #[test]
    fn test_list_ignores_other_files() {
        let temp = TempDir::new().unwrap();
        let store = LocalPackStore::new(temp.path());

        store.save("b", b"1").unwrap();
        store.save("a", b"1").unwrap();
        fs::write(temp.path().join("notes.txt"), b"x").unwrap();

        assert_eq!(store.list().unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_list_missing_dir() {
        let temp = TempDir::new().unwrap();
        let store = LocalPackStore::new(temp.path().join("absent"));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_names() {
        let store = LocalPackStore::new("/tmp");
        assert!(matches!(
            store.path_for("../etc"),
            Err(StoreError::InvalidName(_))
        ));
        assert!(store.path_for("").is_err());
        assert!(store.path_for("..").is_err());
    }
}
