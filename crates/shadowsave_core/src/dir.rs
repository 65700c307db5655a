//! Save directory layout.
//!
//! A save directory owned by the caller, with the entries this crate adds:
//!
//! ```text
//! <save_dir>/
//! ├─ .save_commit          # Commit marker (transaction reached point of no return)
//! ├─ .save_backup/         # Present only while a transaction is in flight
//! │  ├─ .backup_marker     # Backup manifest (captured relative paths)
//! │  └─ ...                # Duplicates of the captured files
//! └─ ...                   # Live save files
//! ```
//!
//! Names ending in `.temp` or `.tmp` belong to writers that are still in
//! progress and are never part of a consistent state.

use crate::error::{SaveError, SaveResult};
use serde::Serialize;
use shadowsave_codec::{read_marker, BACKUP_MARKER_FILE, COMMIT_MARKER_FILE};
use shadowsave_storage::sync_directory;
use std::path::{Path, PathBuf};

/// Name of the backup directory inside the save directory.
pub const BACKUP_DIR_NAME: &str = ".save_backup";

/// Suffixes reserved for files that are still being written.
pub const IN_PROGRESS_SUFFIXES: [&str; 2] = [".temp", ".tmp"];

/// Returns true if `name` marks a write-in-progress file.
#[must_use]
pub fn is_in_progress(name: &str) -> bool {
    IN_PROGRESS_SUFFIXES
        .iter()
        .any(|suffix| name.ends_with(suffix))
}

/// Returns true if a top-level entry with this name is owned by the
/// transaction machinery rather than the save itself.
#[must_use]
pub fn is_reserved(name: &str) -> bool {
    name == BACKUP_DIR_NAME || name == COMMIT_MARKER_FILE
}

/// Paths of one save directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveDir {
    /// Root of the live save.
    path: PathBuf,
}

impl SaveDir {
    /// Wraps an existing save directory.
    ///
    /// # Errors
    ///
    /// Returns `NotADirectory` if `path` does not exist or is not a directory.
    pub fn open(path: &Path) -> SaveResult<Self> {
        if !path.is_dir() {
            return Err(SaveError::not_a_directory(path));
        }
        Ok(Self::at(path))
    }

    /// Wraps a path without checking it.
    #[must_use]
    pub fn at(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Returns the live save directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the backup directory path.
    #[must_use]
    pub fn backup_dir(&self) -> PathBuf {
        self.path.join(BACKUP_DIR_NAME)
    }

    /// Returns the backup manifest path.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.backup_dir().join(BACKUP_MARKER_FILE)
    }

    /// Returns the commit marker path.
    #[must_use]
    pub fn commit_marker_path(&self) -> PathBuf {
        self.path.join(COMMIT_MARKER_FILE)
    }

    /// Checks whether a backup directory is present.
    #[must_use]
    pub fn has_backup(&self) -> bool {
        self.backup_dir().exists()
    }

    /// Checks whether the backup manifest is present.
    #[must_use]
    pub fn has_manifest(&self) -> bool {
        self.manifest_path().exists()
    }

    /// Checks whether a commit marker is present.
    #[must_use]
    pub fn has_commit_marker(&self) -> bool {
        self.commit_marker_path().exists()
    }

    /// Syncs the save directory's entries to durable storage.
    pub fn sync(&self) -> SaveResult<()> {
        sync_directory(&self.path)?;
        Ok(())
    }

    /// Inspects the transactional state of the directory without changing it.
    #[must_use]
    pub fn status(&self) -> SaveDirStatus {
        let manifest = if self.has_manifest() {
            match read_marker(&self.manifest_path()) {
                Ok(Some(record)) => match record.files {
                    Some(files) => ManifestState::Readable {
                        pid: record.pid,
                        files,
                    },
                    None => ManifestState::NoFileList { pid: record.pid },
                },
                Ok(None) => ManifestState::Missing,
                Err(e) => ManifestState::Unreadable {
                    reason: e.to_string(),
                },
            }
        } else {
            ManifestState::Missing
        };

        let commit_marker = if self.has_commit_marker() {
            match read_marker(&self.commit_marker_path()) {
                Ok(Some(record)) => CommitState::Present { pid: record.pid },
                Ok(None) => CommitState::Absent,
                Err(e) => CommitState::Unreadable {
                    reason: e.to_string(),
                },
            }
        } else {
            CommitState::Absent
        };

        SaveDirStatus {
            path: self.path.clone(),
            backup_present: self.has_backup(),
            manifest,
            commit_marker,
        }
    }
}

/// State of the backup manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ManifestState {
    /// No manifest file.
    Missing,
    /// A manifest listing the captured files.
    Readable {
        /// Process that wrote the manifest.
        pid: u32,
        /// Captured relative paths.
        files: Vec<String>,
    },
    /// A well-formed record without a file list.
    NoFileList {
        /// Process that wrote the record.
        pid: u32,
    },
    /// The manifest exists but cannot be parsed or read.
    Unreadable {
        /// Why reading failed.
        reason: String,
    },
}

/// State of the commit marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CommitState {
    /// No commit marker.
    Absent,
    /// A readable commit marker.
    Present {
        /// Process that committed.
        pid: u32,
    },
    /// A commit marker that cannot be parsed. Its presence still counts.
    Unreadable {
        /// Why reading failed.
        reason: String,
    },
}

/// Snapshot of a save directory's transactional state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveDirStatus {
    /// The inspected directory.
    pub path: PathBuf,
    /// Whether `.save_backup` exists.
    pub backup_present: bool,
    /// Manifest state inside the backup directory.
    pub manifest: ManifestState,
    /// Commit marker state.
    pub commit_marker: CommitState,
}

impl SaveDirStatus {
    /// Returns true if recovery has work to do.
    #[must_use]
    pub fn needs_recovery(&self) -> bool {
        self.backup_present || self.commit_marker != CommitState::Absent
    }

    /// Returns true if the last transaction was interrupted before commit.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.backup_present && self.commit_marker == CommitState::Absent
    }
}
