//! # ShadowSave Codec
//!
//! Marker file encoding for ShadowSave.
//!
//! Two small records make a save transaction recoverable:
//!
//! - the **backup manifest**, written inside the backup directory, lists the
//!   relative paths the backup captured
//! - the **commit marker**, written inside the save directory, declares that
//!   the transaction reached its point of no return
//!
//! Both are versioned JSON objects:
//!
//! ```text
//! {"version":1,"pid":4242,"files":["world.sav","maps/0.0.map"]}
//! {"version":1,"pid":4242}
//! ```
//!
//! ## Usage
//!
//! ```
//! use shadowsave_codec::{read_marker, write_commit_marker};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let path = write_commit_marker(dir.path()).unwrap();
//!
//! let record = read_marker(&path).unwrap().unwrap();
//! assert!(record.files().is_none());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod record;

pub use decoder::{decode, read_marker};
pub use encoder::{encode, write_backup_marker, write_commit_marker, write_marker};
pub use error::{MarkerError, MarkerResult};
pub use record::{MarkerRecord, BACKUP_MARKER_FILE, COMMIT_MARKER_FILE, MARKER_VERSION};

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn backup_marker_lists_files() {
        let dir = tempdir().unwrap();
        let files = vec!["world.sav".to_string(), "maps/0.0.map".to_string()];

        let path = write_backup_marker(dir.path(), &files).unwrap();
        assert_eq!(path, dir.path().join(BACKUP_MARKER_FILE));

        let record = read_marker(&path).unwrap().unwrap();
        assert_eq!(record.version, MARKER_VERSION);
        assert_eq!(record.pid, std::process::id());
        assert_eq!(record.files(), Some(files.as_slice()));
    }

    #[test]
    fn commit_marker_has_no_file_list() {
        let dir = tempdir().unwrap();
        let path = write_commit_marker(dir.path()).unwrap();

        assert_eq!(path, dir.path().join(COMMIT_MARKER_FILE));
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("files"));
    }

    #[test]
    fn write_into_missing_directory_is_io_error() {
        let dir = tempdir().unwrap();
        let result = write_commit_marker(&dir.path().join("missing"));
        assert!(matches!(result, Err(MarkerError::Io { .. })));
    }
}
