//! JSON pack manifest.
//!
//! ```json
//! {
//!   "packs": [
//!     { "name": "core", "size": 1048576 },
//!     { "name": "level1", "size": 4096, "priority": 0.5, "dependencies": ["core"] }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};

use super::pack::Pack;

/// On-disk manifest listing every known pack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub packs: Vec<ManifestEntry>,
}

/// One pack as declared in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,

    /// Declared archive size, used for progress before the footer is known.
    #[serde(default)]
    pub size: u64,

    #[serde(default)]
    pub priority: f32,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

impl Manifest {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl From<&ManifestEntry> for Pack {
    fn from(entry: &ManifestEntry) -> Self {
        Pack::new(entry.name.clone(), entry.size)
            .with_priority(entry.priority)
            .with_dependencies(entry.dependencies.iter().cloned())
    }
}

impl From<&Pack> for ManifestEntry {
    fn from(pack: &Pack) -> Self {
        Self {
            name: pack.name.clone(),
            size: pack.size,
            priority: pack.priority,
            dependencies: pack.dependencies.clone(),
        }
    }
}
