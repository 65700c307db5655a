//! Error types for ShadowSave core.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for core operations.
pub type SaveResult<T> = Result<T, SaveError>;

/// Errors that can occur in save transaction operations.
///
/// Only the operations that must refuse to proceed return these. A failed
/// commit is reported as `false`, and recovery never fails: both are
/// expected outcomes rather than errors.
#[derive(Debug, Error)]
pub enum SaveError {
    /// Filesystem primitive error.
    #[error("storage error: {0}")]
    Storage(#[from] shadowsave_storage::StorageError),

    /// Marker file error.
    #[error("marker error: {0}")]
    Marker(#[from] shadowsave_codec::MarkerError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The save directory does not exist or is not a directory.
    #[error("not a save directory: {}", path.display())]
    NotADirectory {
        /// The offending path.
        path: PathBuf,
    },

    /// A transaction is already registered on this thread.
    #[error("a save transaction is already active on this thread")]
    TransactionActive,

    /// A leftover backup could not be restored, so a new save cannot start.
    #[error("stale backup at {} could not be fully recovered", path.display())]
    StaleBackup {
        /// The backup directory that is still present.
        path: PathBuf,
    },

    /// A save path is not a plain relative path inside the save directory,
    /// names a reserved entry, or cannot be recorded in a manifest.
    #[error("invalid save path: {}", path.display())]
    InvalidPath {
        /// The offending entry.
        path: PathBuf,
    },
}

impl SaveError {
    /// Creates a not-a-directory error.
    pub fn not_a_directory(path: &Path) -> Self {
        Self::NotADirectory {
            path: path.to_path_buf(),
        }
    }

    /// Creates a stale backup error.
    pub fn stale_backup(path: &Path) -> Self {
        Self::StaleBackup {
            path: path.to_path_buf(),
        }
    }

    /// Creates an invalid path error.
    pub fn invalid_path(path: &Path) -> Self {
        Self::InvalidPath {
            path: path.to_path_buf(),
        }
    }
}
