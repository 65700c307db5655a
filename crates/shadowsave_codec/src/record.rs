//! Marker record type.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Current marker schema version.
pub const MARKER_VERSION: u32 = 1;

/// File name of the backup manifest inside the backup directory.
pub const BACKUP_MARKER_FILE: &str = ".backup_marker";

/// File name of the commit marker inside the save directory.
pub const COMMIT_MARKER_FILE: &str = ".save_commit";

/// A versioned marker record.
///
/// The backup manifest carries `files`; the commit marker omits it. A
/// manifest without `files` is treated by readers as "captured set unknown".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerRecord {
    /// Schema version.
    pub version: u32,
    /// Id of the process that wrote the record.
    pub pid: u32,
    /// Relative, forward-slash separated paths captured by a backup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
}

impl MarkerRecord {
    /// Creates a commit marker record for the current process.
    #[must_use]
    pub fn commit() -> Self {
        Self {
            version: MARKER_VERSION,
            pid: std::process::id(),
            files: None,
        }
    }

    /// Creates a backup manifest record for the current process.
    #[must_use]
    pub fn backup(files: Vec<String>) -> Self {
        Self {
            version: MARKER_VERSION,
            pid: std::process::id(),
            files: Some(files),
        }
    }

    /// Returns the captured file list, if this is a manifest.
    #[must_use]
    pub fn files(&self) -> Option<&[String]> {
        self.files.as_deref()
    }

    /// Returns the captured file list as a lookup set.
    #[must_use]
    pub fn file_set(&self) -> Option<BTreeSet<String>> {
        self.files.as_ref().map(|f| f.iter().cloned().collect())
    }
}
