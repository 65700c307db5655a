//! Durable flush helpers.
//!
//! `File::flush()` only pushes data to the OS. These helpers call
//! `sync_all()` so that data and metadata survive power loss.

use crate::error::{StorageError, StorageResult};
use std::fs::{File, OpenOptions};
use std::path::Path;

/// Syncs a file's data and metadata to durable storage.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or the sync fails.
pub fn sync_file(path: &Path) -> StorageResult<()> {
    // Windows requires write access for FlushFileBuffers.
    let file = OpenOptions::new()
        .read(true)
        .write(cfg!(windows))
        .open(path)
        .map_err(|e| StorageError::at("open for sync", path, e))?;
    file.sync_all()
        .map_err(|e| StorageError::at("sync", path, e))
}

/// Syncs a directory so that entry creations, renames and deletions are durable.
///
/// After creating, renaming, or deleting files, the containing directory
/// must be fsynced for the metadata change to be on disk.
///
/// On Windows, directory fsync is not supported in the same way as Unix.
/// NTFS journaling provides the equivalent guarantee for metadata, so the
/// explicit fsync is skipped there.
#[cfg(unix)]
pub fn sync_directory(path: &Path) -> StorageResult<()> {
    let dir = File::open(path).map_err(|e| StorageError::at("open directory", path, e))?;
    dir.sync_all()
        .map_err(|e| StorageError::at("sync directory", path, e))
}

/// Syncs a directory so that entry creations, renames and deletions are durable.
///
/// No-op outside Unix; see the Unix variant for details.
#[cfg(not(unix))]
pub fn sync_directory(path: &Path) -> StorageResult<()> {
    if !path.is_dir() {
        return Err(StorageError::at(
            "sync directory",
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn sync_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.sav");
        std::fs::write(&path, b"payload").unwrap();

        assert!(sync_file(&path).is_ok());
    }

    #[test]
    fn sync_missing_file_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.sav");

        let err = sync_file(&path).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
        assert!(err.to_string().contains("missing.sav"));
    }

    #[test]
    fn sync_directory_ok() {
        let dir = tempdir().unwrap();
        assert!(sync_directory(dir.path()).is_ok());
    }

    #[test]
    fn sync_missing_directory_fails() {
        let dir = tempdir().unwrap();
        assert!(sync_directory(&dir.path().join("nope")).is_err());
    }
}
