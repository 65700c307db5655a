//! Save directory fixtures.
//!
//! Provides temporary save directories and a comparable snapshot of their
//! contents.

use shadowsave_core::{is_in_progress, BACKUP_DIR_NAME, COMMIT_MARKER_FILE};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Files of a small but representative save.
pub const SAMPLE_SAVE: &[(&str, &[u8])] = &[
    ("world.sav", b"world v1"),
    ("player.sav", b"player v1"),
    ("maps/0.0/1.map", b"map 1 v1"),
    ("maps/0.0/2.map", b"map 2 v1"),
    ("archive.zzip", b"archive v1"),
];

/// A save directory with automatic cleanup.
pub struct TestSaveDir {
    temp: TempDir,
}

impl TestSaveDir {
    /// Creates an empty save directory.
    pub fn new() -> Self {
        Self {
            temp: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Creates a save directory holding [`SAMPLE_SAVE`].
    pub fn populated() -> Self {
        let dir = Self::new();
        for (rel, data) in SAMPLE_SAVE {
            dir.write(rel, data);
        }
        dir
    }

    /// Returns the save directory path.
    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Writes a file, creating parent directories.
    ///
    /// An existing file is unlinked first, the way save writers replace
    /// files, so a hardlinked backup keeps the old content.
    pub fn write(&self, rel: &str, data: &[u8]) {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        let _ = fs::remove_file(&path);
        fs::write(&path, data).expect("Failed to write save file");
    }

    /// Reads a file.
    pub fn read(&self, rel: &str) -> Vec<u8> {
        fs::read(self.path().join(rel)).expect("Failed to read save file")
    }

    /// Returns true if the entry exists.
    pub fn exists(&self, rel: &str) -> bool {
        self.path().join(rel).exists()
    }

    /// Removes a file.
    pub fn remove(&self, rel: &str) {
        fs::remove_file(self.path().join(rel)).expect("Failed to remove save file");
    }

    /// Creates a directory and its parents.
    pub fn create_dir(&self, rel: &str) {
        fs::create_dir_all(self.path().join(rel)).expect("Failed to create directory");
    }

    /// Returns true if the backup directory exists.
    pub fn has_backup(&self) -> bool {
        self.exists(BACKUP_DIR_NAME)
    }

    /// Returns true if the commit marker exists.
    pub fn has_commit_marker(&self) -> bool {
        self.exists(COMMIT_MARKER_FILE)
    }

    /// Captures the save's contents.
    pub fn snapshot(&self) -> TreeSnapshot {
        TreeSnapshot::capture(self.path())
    }
}

impl Default for TestSaveDir {
    fn default() -> Self {
        Self::new()
    }
}

/// Contents of a save directory, ignoring transaction bookkeeping and
/// in-progress files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeSnapshot {
    /// File contents by forward-slash relative path.
    pub files: BTreeMap<String, Vec<u8>>,
    /// Directories by forward-slash relative path.
    pub dirs: BTreeSet<String>,
}

impl TreeSnapshot {
    /// Walks `root`.
    pub fn capture(root: &Path) -> Self {
        let mut snapshot = Self::default();
        snapshot.walk(root, "");
        snapshot
    }

    /// Records a file write, adding its parent directories.
    pub fn apply_write(&mut self, rel: &str, data: &[u8]) {
        let mut parts: Vec<&str> = rel.split('/').collect();
        parts.pop();
        for depth in 1..=parts.len() {
            self.dirs.insert(parts[..depth].join("/"));
        }
        self.files.insert(rel.to_string(), data.to_vec());
    }

    /// Records a file removal.
    pub fn apply_remove(&mut self, rel: &str) {
        self.files.remove(rel);
    }

    fn walk(&mut self, dir: &Path, prefix: &str) {
        let entries = fs::read_dir(dir).expect("Failed to read directory");
        for entry in entries {
            let entry = entry.expect("Failed to read directory entry");
            let name = entry.file_name().to_string_lossy().into_owned();
            if prefix.is_empty() && (name == BACKUP_DIR_NAME || name == COMMIT_MARKER_FILE) {
                continue;
            }
            if is_in_progress(&name) {
                continue;
            }

            let rel = if prefix.is_empty() {
                name
            } else {
                format!("{prefix}/{name}")
            };
            if entry.file_type().expect("Failed to stat entry").is_dir() {
                self.dirs.insert(rel.clone());
                self.walk(&entry.path(), &rel);
            } else {
                let data = fs::read(entry.path()).expect("Failed to read file");
                self.files.insert(rel, data);
            }
        }
    }
}

/// Runs a test with a temporary populated save directory.
///
/// # Example
///
/// ```rust
/// use shadowsave_testkit::with_save_dir;
///
/// with_save_dir(|dir| {
///     assert_eq!(dir.read("world.sav"), b"world v1");
/// });
/// ```
pub fn with_save_dir<F, R>(f: F) -> R
where
    F: FnOnce(&TestSaveDir) -> R,
{
    let dir = TestSaveDir::populated();
    f(&dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_populated_snapshot() {
        let dir = TestSaveDir::populated();
        let snapshot = dir.snapshot();

        assert_eq!(snapshot.files.len(), SAMPLE_SAVE.len());
        assert!(snapshot.dirs.contains("maps"));
        assert!(snapshot.dirs.contains("maps/0.0"));
    }

    #[test]
    fn test_snapshot_ignores_bookkeeping() {
        let dir = TestSaveDir::new();
        dir.write("world.sav", b"w");
        dir.write("world.sav.temp", b"partial");
        dir.write(".save_commit", b"{}");
        dir.write(".save_backup/world.sav", b"old");

        let snapshot = dir.snapshot();
        assert_eq!(snapshot.files.keys().collect::<Vec<_>>(), vec!["world.sav"]);
        assert!(snapshot.dirs.is_empty());
    }

    #[test]
    fn test_apply_write_adds_parents() {
        let mut snapshot = TreeSnapshot::default();
        snapshot.apply_write("a/b/c.sav", b"x");

        assert!(snapshot.dirs.contains("a"));
        assert!(snapshot.dirs.contains("a/b"));
        assert_eq!(snapshot.files["a/b/c.sav"], b"x");
    }

    #[test]
    fn test_write_replaces_linked_file() {
        let dir = TestSaveDir::new();
        dir.write("world.sav", b"old");
        fs::hard_link(dir.path().join("world.sav"), dir.path().join("link.sav")).unwrap();

        dir.write("world.sav", b"new");
        assert_eq!(dir.read("link.sav"), b"old");
    }
}
