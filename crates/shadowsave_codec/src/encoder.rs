//! Marker writer.

use crate::error::{MarkerError, MarkerResult};
use crate::record::{MarkerRecord, BACKUP_MARKER_FILE, COMMIT_MARKER_FILE};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Encodes a record to bytes.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode(record: &MarkerRecord) -> MarkerResult<Vec<u8>> {
    serde_json::to_vec(record).map_err(|e| MarkerError::encoding(e.to_string()))
}

/// Writes a marker atomically and durably.
///
/// Uses write-then-rename so a marker is either absent or complete:
/// 1. Write to `<name>.tmp`
/// 2. Sync the temporary file
/// 3. Rename over `<name>`
///
/// The containing directory is not synced here; callers that need the
/// marker's directory entry to be durable sync the directory afterwards.
///
/// # Errors
///
/// Returns an error if the directory is not writable or the sync fails.
pub fn write_marker(path: &Path, record: &MarkerRecord) -> MarkerResult<()> {
    let data = encode(record)?;
    let temp_path = temp_path_for(path);

    let result = write_synced(&temp_path, &data)
        .and_then(|()| fs::rename(&temp_path, path).map_err(|e| MarkerError::io(path, e)));
    if result.is_err() {
        if let Err(e) = fs::remove_file(&temp_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove marker temp file {:?}: {}", temp_path, e);
            }
        }
    }
    result
}

/// Writes the backup manifest listing `files` into `dir`.
///
/// Returns the path of the written manifest.
///
/// # Errors
///
/// Returns an error if the directory is not writable.
pub fn write_backup_marker(dir: &Path, files: &[String]) -> MarkerResult<PathBuf> {
    let path = dir.join(BACKUP_MARKER_FILE);
    write_marker(&path, &MarkerRecord::backup(files.to_vec()))?;
    Ok(path)
}

/// Writes the commit marker into `save_dir`.
///
/// Returns the path of the written marker.
///
/// # Errors
///
/// Returns an error if the directory is not writable.
pub fn write_commit_marker(save_dir: &Path) -> MarkerResult<PathBuf> {
    let path = save_dir.join(COMMIT_MARKER_FILE);
    write_marker(&path, &MarkerRecord::commit())?;
    Ok(path)
}

fn write_synced(path: &Path, data: &[u8]) -> MarkerResult<()> {
    let mut file = File::create(path).map_err(|e| MarkerError::io(path, e))?;
    file.write_all(data).map_err(|e| MarkerError::io(path, e))?;
    file.sync_all().map_err(|e| MarkerError::io(path, e))
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
