//! Error types for the codec crate.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for marker operations.
pub type MarkerResult<T> = Result<T, MarkerError>;

/// Errors that can occur while reading or writing marker files.
#[derive(Error, Debug)]
pub enum MarkerError {
    /// The marker file could not be written, read, or renamed into place.
    #[error("marker I/O failed for {}: {source}", path.display())]
    Io {
        /// The marker (or its temporary sibling) being accessed.
        path: PathBuf,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The marker file exists but is not a well-formed record.
    #[error("malformed marker {}: {message}", path.display())]
    Parse {
        /// The marker that failed to parse.
        path: PathBuf,
        /// Description of the problem.
        message: String,
    },

    /// The record could not be serialized.
    #[error("marker encoding failed: {message}")]
    Encoding {
        /// Description of the encoding error.
        message: String,
    },
}

impl MarkerError {
    /// Creates an I/O error for a marker path.
    pub fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Creates a parse error for a marker path.
    pub fn parse(path: &Path, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    /// Creates an encoding error.
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    /// Returns true if the marker existed but was malformed.
    #[must_use]
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}
