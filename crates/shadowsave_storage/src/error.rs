//! Error types for storage operations.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A filesystem operation on a specific path failed.
    #[error("failed to {op} {}: {source}", path.display())]
    Path {
        /// Short description of the operation (e.g. "sync", "copy").
        op: &'static str,
        /// The path the operation was applied to.
        path: PathBuf,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    /// Creates a path-scoped error.
    pub fn at(op: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Path {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Returns the OS error kind behind this error.
    #[must_use]
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            Self::Io(e) => e.kind(),
            Self::Path { source, .. } => source.kind(),
        }
    }
}
