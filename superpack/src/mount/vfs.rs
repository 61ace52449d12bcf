//! In-memory mount table.
//!
//! Maps virtual paths to entries of mounted archives and reads file contents
//! straight from the archive bytes.

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::RwLock;

use super::{MountError, MountPoint, MountResult};
use crate::format::{normalize_path, PackArchive};

struct MountedPack {
    archive: PackArchive,
    mount_path: String,
}

#[derive(Default)]
struct MountTable {
    packs: HashMap<String, MountedPack>,
    /// Virtual path → (pack name, entry index).
    files: HashMap<String, (String, usize)>,
}

/// Virtual filesystem backed by mounted superpacks.
#[derive(Default)]
pub struct VirtualFileSystem {
    table: RwLock<MountTable>,
}

impl std::fmt::Debug for VirtualFileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = self.table.read();
        f.debug_struct("VirtualFileSystem")
            .field("packs", &table.packs.len())
            .field("files", &table.files.len())
            .finish()
    }
}

impl VirtualFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a file from whichever pack provides it.
    pub fn read(&self, path: &str) -> MountResult<Vec<u8>> {
        let path = normalize_path(path).map_err(|_| MountError::FileNotFound(path.to_string()))?;
        let table = self.table.read();
        let (pack_name, index) = table
            .files
            .get(&path)
            .ok_or_else(|| MountError::FileNotFound(path.clone()))?;
        let pack = table
            .packs
            .get(pack_name)
            .ok_or_else(|| MountError::NotMounted(pack_name.clone()))?;
        Ok(pack.archive.read_entry(&pack.archive.entries()[*index])?)
    }

    pub fn exists(&self, path: &str) -> bool {
        normalize_path(path)
            .map(|p| self.table.read().files.contains_key(&p))
            .unwrap_or(false)
    }

    /// Name of the pack providing `path`.
    pub fn owner_of(&self, path: &str) -> Option<String> {
        let path = normalize_path(path).ok()?;
        self.table.read().files.get(&path).map(|(pack, _)| pack.clone())
    }

    /// All virtual paths, sorted.
    pub fn files(&self) -> Vec<String> {
        let mut files: Vec<String> = self.table.read().files.keys().cloned().collect();
        files.sort();
        files
    }

    /// Names of mounted packs, sorted.
    pub fn mounted_packs(&self) -> Vec<String> {
        let mut packs: Vec<String> = self.table.read().packs.keys().cloned().collect();
        packs.sort();
        packs
    }

    /// Mount path a pack was registered under.
    pub fn mount_path_of(&self, pack_name: &str) -> Option<String> {
        self.table
            .read()
            .packs
            .get(pack_name)
            .map(|p| p.mount_path.clone())
    }
}

fn join(mount_path: &str, file: &str) -> String {
    if mount_path.is_empty() {
        file.to_string()
    } else {
        format!("{}/{}", mount_path, file)
    }
}

fn normalize_mount_path(mount_path: &str) -> MountResult<String> {
    if mount_path.trim_matches('/').is_empty() {
        return Ok(String::new());
    }
    normalize_path(mount_path).map_err(|_| MountError::InvalidMountPath(mount_path.to_string()))
}

impl MountPoint for VirtualFileSystem {
    fn mount(&self, pack_name: &str, archive: Bytes, mount_path: &str) -> MountResult<()> {
        let mount_path = normalize_mount_path(mount_path)?;
        let archive = PackArchive::parse(archive)?;

        let mut table = self.table.write();
        if table.packs.contains_key(pack_name) {
            return Err(MountError::AlreadyMounted(pack_name.to_string()));
        }

        let paths: Vec<String> = archive
            .entries()
            .iter()
            .map(|entry| join(&mount_path, &entry.path))
            .collect();
        for path in &paths {
            if let Some((existing, _)) = table.files.get(path) {
                return Err(MountError::Conflict {
                    path: path.clone(),
                    existing_pack: existing.clone(),
                });
            }
        }

        for (index, path) in paths.into_iter().enumerate() {
            table.files.insert(path, (pack_name.to_string(), index));
        }
        tracing::debug!(
            pack = pack_name,
            mount_path = %mount_path,
            files = archive.entries().len(),
            "Mounted pack"
        );
        table.packs.insert(
            pack_name.to_string(),
            MountedPack {
                archive,
                mount_path,
            },
        );
        Ok(())
    }

    fn unmount(&self, pack_name: &str) -> MountResult<()> {
        let mut table = self.table.write();
        if table.packs.remove(pack_name).is_none() {
            return Err(MountError::NotMounted(pack_name.to_string()));
        }
        table.files.retain(|_, (owner, _)| owner != pack_name);
        tracing::debug!(pack = pack_name, "Unmounted pack");
        Ok(())
    }

    fn is_mounted(&self, pack_name: &str) -> bool {
        self.table.read().packs.contains_key(pack_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{Compression, PackWriter};
    use crate::hash::Sha256Hasher;

    fn archive(files: &[(&str, &[u8])]) -> Bytes {
        let mut writer = PackWriter::new();
        for (path, data) in files {
            writer
                .add_file(path, data.to_vec(), Compression::Deflate)
                .unwrap();
        }
        writer.finish(&Sha256Hasher).unwrap()
    }

    #[test]
    fn test_mount_and_read() {
        let vfs = VirtualFileSystem::new();
        vfs.mount("base", archive(&[("a.txt", b"alpha")]), "/data/")
            .unwrap();

        assert!(vfs.is_mounted("base"));
        assert_eq!(vfs.read("data/a.txt").unwrap(), b"alpha");
        assert!(vfs.exists("/data/a.txt"));
        assert_eq!(vfs.owner_of("data/a.txt").as_deref(), Some("base"));
        assert_eq!(vfs.mount_path_of("base").as_deref(), Some("data"));
    }

    #[test]
    fn test_mount_at_root() {
        let vfs = VirtualFileSystem::new();
        vfs.mount("base", archive(&[("a.txt", b"alpha")]), "/")
            .unwrap();

        assert_eq!(vfs.files(), vec!["a.txt".to_string()]);
    }

    #[test]
    fn test_conflicting_paths_rejected() {
        let vfs = VirtualFileSystem::new();
        vfs.mount("one", archive(&[("shared.txt", b"1")]), "")
            .unwrap();

        let result = vfs.mount(
            "two",
            archive(&[("own.txt", b"2"), ("shared.txt", b"2")]),
            "",
        );
        assert!(matches!(
            result,
            Err(MountError::Conflict { ref path, ref existing_pack })
                if path == "shared.txt" && existing_pack == "one"
        ));
        // nothing from the rejected pack leaked in
        assert!(!vfs.exists("own.txt"));
        assert!(!vfs.is_mounted("two"));
    }

    #[test]
    fn test_double_mount_rejected() {
        let vfs = VirtualFileSystem::new();
        vfs.mount("one", archive(&[("a", b"1")]), "x").unwrap();

        assert!(matches!(
            vfs.mount("one", archive(&[("b", b"1")]), "y"),
            Err(MountError::AlreadyMounted(_))
        ));
    }

    #[test]
    fn test_unmount() {
        let vfs = VirtualFileSystem::new();
        vfs.mount("one", archive(&[("a", b"1")]), "").unwrap();
        vfs.unmount("one").unwrap();

        assert!(!vfs.exists("a"));
        assert!(vfs.mounted_packs().is_empty());
        assert!(matches!(vfs.unmount("one"), Err(MountError::NotMounted(_))));
    }

    #[test]
    fn test_garbage_archive_rejected() {
        let vfs = VirtualFileSystem::new();
        let result = vfs.mount("bad", Bytes::from_static(&[0u8; 200]), "");

        assert!(matches!(result, Err(MountError::Format(_))));
    }

    #[test]
    fn test_invalid_mount_path() {
        let vfs = VirtualFileSystem::new();
        let result = vfs.mount("one", archive(&[("a", b"1")]), "../outside");

        assert!(matches!(result, Err(MountError::InvalidMountPath(_))));
    }
}
