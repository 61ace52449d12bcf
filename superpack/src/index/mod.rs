//! The pack index: every known pack keyed by name.
//!
//! The index is loaded once from a [`Manifest`] and shared by the pack
//! manager and all live requests. Packs are never removed while the index is
//! loaded; re-initialization resets them to [`PackState::NotRequested`].

mod manifest;
mod pack;

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use manifest::{Manifest, ManifestEntry};
pub use pack::{Pack, PackState};

/// Result type for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Errors raised while building or loading the pack index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Failed to read the manifest file.
    #[error("failed to read manifest {}: {source}", path.display())]
    ReadFailed { path: PathBuf, source: io::Error },

    /// Manifest is not valid JSON or misses required fields.
    #[error("failed to parse manifest: {0}")]
    ParseFailed(String),

    /// Two packs share a name.
    #[error("duplicate pack name: {0}")]
    DuplicatePack(String),

    /// A pack lists a dependency that is not in the index.
    #[error("pack {pack} depends on unknown pack {dependency}")]
    UnknownDependency { pack: String, dependency: String },

    /// Pack name is empty, a dot segment, or uses characters outside
    /// `[A-Za-z0-9._-]`.
    #[error("invalid pack name: {0:?}")]
    InvalidName(String),
}

/// Pack names end up in URLs and file names unescaped, so only a
/// conservative character set is accepted.
fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Name → [`Pack`] map.
#[derive(Debug, Clone, Default)]
pub struct PackIndex {
    packs: BTreeMap<String, Pack>,
}

impl PackIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from packs, validating names and dependencies.
    pub fn from_packs(packs: impl IntoIterator<Item = Pack>) -> IndexResult<Self> {
        let mut index = Self::new();
        for pack in packs {
            index.insert(pack)?;
        }
        index.validate()?;
        Ok(index)
    }

    pub fn from_manifest(manifest: &Manifest) -> IndexResult<Self> {
        Self::from_packs(manifest.packs.iter().map(Pack::from))
    }

    pub fn from_json(text: &str) -> IndexResult<Self> {
        let manifest =
            Manifest::from_json(text).map_err(|e| IndexError::ParseFailed(e.to_string()))?;
        Self::from_manifest(&manifest)
    }

    /// Load and validate a JSON manifest from disk.
    pub fn load(path: &Path) -> IndexResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| IndexError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        let index = Self::from_json(&text)?;
        tracing::info!(path = %path.display(), packs = index.len(), "Loaded pack index");
        Ok(index)
    }

    /// Add a pack. Dependencies are not checked until [`validate`](Self::validate).
    pub fn insert(&mut self, pack: Pack) -> IndexResult<()> {
        if !is_valid_name(&pack.name) {
            return Err(IndexError::InvalidName(pack.name));
        }
        if self.packs.contains_key(&pack.name) {
            return Err(IndexError::DuplicatePack(pack.name));
        }
        self.packs.insert(pack.name.clone(), pack);
        Ok(())
    }

    /// Check that every dependency names a known pack.
    pub fn validate(&self) -> IndexResult<()> {
        for pack in self.packs.values() {
            for dependency in &pack.dependencies {
                if !self.packs.contains_key(dependency) {
                    return Err(IndexError::UnknownDependency {
                        pack: pack.name.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Pack> {
        self.packs.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Pack> {
        self.packs.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packs.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.packs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packs.is_empty()
    }

    /// Packs in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Pack> {
        self.packs.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.packs.keys().map(String::as_str)
    }

    /// Reset every pack to `NotRequested`.
    pub fn reset_all(&mut self) {
        for pack in self.packs.values_mut() {
            pack.reset();
        }
    }

    /// Current manifest view of the index.
    pub fn to_manifest(&self) -> Manifest {
        Manifest {
            packs: self.packs.values().map(ManifestEntry::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json() {
        let index = PackIndex::from_json(
            r#"{ "packs": [
                { "name": "core", "size": 100 },
                { "name": "level1", "size": 10, "dependencies": ["core"] }
            ] }"#,
        )
        .unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.get("level1").unwrap().dependencies, vec!["core"]);
        assert_eq!(index.names().collect::<Vec<_>>(), vec!["core", "level1"]);
    }

    #[test]
    fn test_unknown_dependency() {
        let result = PackIndex::from_packs([Pack::new("a", 1).with_dependencies(["ghost"])]);

        assert!(matches!(
            result,
            Err(IndexError::UnknownDependency { ref pack, ref dependency })
                if pack == "a" && dependency == "ghost"
        ));
    }

    #[test]
    fn test_duplicate_pack() {
        let result = PackIndex::from_packs([Pack::new("a", 1), Pack::new("a", 2)]);
        assert!(matches!(result, Err(IndexError::DuplicatePack(_))));
    }

    #[test]
    fn test_invalid_name() {
        let mut index = PackIndex::new();
        assert!(matches!(
            index.insert(Pack::new("a/b", 1)),
            Err(IndexError::InvalidName(_))
        ));
        assert!(index.insert(Pack::new("", 1)).is_err());
        for name in ["a?b", "a#b", "a b", "a%20b", "..", "a\\b", "é"] {
            assert!(
                matches!(index.insert(Pack::new(name, 1)), Err(IndexError::InvalidName(_))),
                "{:?} accepted",
                name
            );
        }
        index.insert(Pack::new("level-1_v2.hd", 1)).unwrap();
        assert!(index.contains("level-1_v2.hd"));
    }

    #[test]
    fn test_parse_failure() {
        assert!(matches!(
            PackIndex::from_json("not json"),
            Err(IndexError::ParseFailed(_))
        ));
    }

    #[test]
    fn test_reset_all() {
        let mut index = PackIndex::from_packs([Pack::new("a", 1), Pack::new("b", 1)]).unwrap();
        index.get_mut("a").unwrap().state = PackState::Mounted;
        index.get_mut("b").unwrap().state = PackState::Error;

        index.reset_all();

        assert!(index.iter().all(|p| p.state == PackState::NotRequested));
    }

    #[test]
    fn test_load_from_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("packs.json");
        fs::write(&path, r#"{ "packs": [ { "name": "core" } ] }"#).unwrap();

        let index = PackIndex::load(&path).unwrap();
        assert!(index.contains("core"));

        assert!(matches!(
            PackIndex::load(&temp.path().join("missing.json")),
            Err(IndexError::ReadFailed { .. })
        ));
    }

    #[test]
    fn test_to_manifest() {
        let index = PackIndex::from_packs([Pack::new("a", 7)]).unwrap();
        let manifest = index.to_manifest();

        assert_eq!(manifest.packs.len(), 1);
        assert_eq!(manifest.packs[0].size, 7);
    }
}
