//! Idempotent filesystem mutations.

use crate::error::{StorageError, StorageResult};
use std::fs;
use std::io;
use std::path::Path;

/// Removes a file, treating "not found" as success.
///
/// Returns `true` if a file was removed.
///
/// # Errors
///
/// Returns an error for any failure other than the file being absent.
pub fn remove_file_if_exists(path: &Path) -> StorageResult<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StorageError::at("remove", path, e)),
    }
}

/// Removes a directory tree, treating "not found" as success.
///
/// Returns `true` if a directory was removed.
///
/// # Errors
///
/// Returns an error for any failure other than the directory being absent.
pub fn remove_dir_all_if_exists(path: &Path) -> StorageResult<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StorageError::at("remove directory", path, e)),
    }
}

/// Moves `src` over `dst`, replacing whatever `dst` held.
///
/// The move is a rename when both paths share a filesystem (atomic per
/// file). If the rename fails the file is copied and the source removed.
/// Missing parent directories of `dst` are created.
///
/// `dst` is removed before the rename: when `src` and `dst` are hardlinks
/// of the same inode, POSIX rename is a no-op and would leave `src` behind.
///
/// # Errors
///
/// Returns an error if both the rename and the copy fallback fail.
pub fn move_file(src: &Path, dst: &Path) -> StorageResult<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| StorageError::at("create directory", parent, e))?;
    }
    remove_file_if_exists(dst)?;

    if let Err(rename_err) = fs::rename(src, dst) {
        tracing::debug!(
            src = %src.display(),
            error = %rename_err,
            "rename failed, falling back to copy"
        );
        fs::copy(src, dst).map_err(|e| StorageError::at("copy", src, e))?;
        remove_file_if_exists(src)?;
    }
    Ok(())
}
