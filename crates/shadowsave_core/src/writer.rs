//! Save file writer that honours the durability policy.
//!
//! Every save file is written to a sibling `<name>.temp` and renamed over
//! the target once complete. Replacing instead of truncating is what makes
//! hardlinked backups safe: the backup keeps the old inode.

use crate::durability::{self, DurabilityContext};
use crate::error::SaveResult;
use shadowsave_storage::{remove_file_if_exists, sync_directory, StorageError};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writes a save file, consulting the transaction registered on this thread.
///
/// 1. Write through `write` into `<path>.temp`
/// 2. Flush; under `Full` also sync the file (a failed sync is reported via
///    [`durability::notify_sync_failure`] and does not abort the write)
/// 3. Rename over `path`; under `Full` also sync the parent directory
///
/// Without a registered transaction the file is written with no durable sync.
///
/// # Errors
///
/// Returns an error if the temporary file cannot be written or renamed. The
/// temporary file is removed on failure.
///
/// # Example
///
/// ```rust
/// use shadowsave_core::write_to_file;
/// use std::io::Write;
///
/// let dir = tempfile::tempdir().unwrap();
/// let path = dir.path().join("player.sav");
/// write_to_file(&path, |w| w.write_all(b"hp=10")).unwrap();
/// assert_eq!(std::fs::read(&path).unwrap(), b"hp=10");
/// ```
pub fn write_to_file<F>(path: &Path, write: F) -> SaveResult<()>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let context = durability::current();
    write_with_context(context.as_deref(), path, write)
}

pub(crate) fn write_with_context<F>(
    context: Option<&DurabilityContext>,
    path: &Path,
    write: F,
) -> SaveResult<()>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let full = context.is_some_and(DurabilityContext::wants_full_fsync);
    let temp_path = in_progress_path(path);

    let result = write_temp(&temp_path, write).and_then(|file| {
        if full {
            if let Err(e) = file.sync_all() {
                tracing::warn!(path = %path.display(), error = %e, "save file sync failed");
                report_failure(context, path);
            }
        }
        drop(file);
        fs::rename(&temp_path, path).map_err(|e| StorageError::at("rename", &temp_path, e))?;
        Ok(())
    });

    if let Err(e) = result {
        if let Err(cleanup) = remove_file_if_exists(&temp_path) {
            tracing::warn!(error = %cleanup, "failed to remove temporary save file");
        }
        return Err(e);
    }

    if full {
        let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Err(e) = sync_directory(parent.unwrap_or(Path::new("."))) {
            tracing::warn!(path = %path.display(), error = %e, "save directory sync failed");
            report_failure(context, path);
        }
    }
    Ok(())
}

fn write_temp<F>(temp_path: &Path, write: F) -> SaveResult<File>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let file = File::create(temp_path).map_err(|e| StorageError::at("create", temp_path, e))?;
    let mut writer = BufWriter::new(file);
    write(&mut writer).map_err(|e| StorageError::at("write", temp_path, e))?;
    writer
        .flush()
        .map_err(|e| StorageError::at("flush", temp_path, e))?;
    let file = writer
        .into_inner()
        .map_err(|e| StorageError::at("flush", temp_path, e.into_error()))?;
    Ok(file)
}

fn report_failure(context: Option<&DurabilityContext>, path: &Path) {
    match context {
        Some(ctx) => ctx.record_sync_failure(path),
        None => durability::notify_sync_failure(),
    }
}

fn in_progress_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".temp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FsyncLevel;
    use crate::dir::is_in_progress;
    use tempfile::tempdir;

    #[test]
    fn temp_name_is_reserved() {
        let temp = in_progress_path(Path::new("/saves/world/overmap.sav"));
        assert_eq!(temp, PathBuf::from("/saves/world/overmap.sav.temp"));
        assert!(is_in_progress(temp.file_name().unwrap().to_str().unwrap()));
    }

    #[test]
    fn write_replaces_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("player.sav");
        fs::write(&path, b"old").unwrap();

        write_to_file(&path, |w| w.write_all(b"new")).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new");
        assert!(!dir.path().join("player.sav.temp").exists());
    }

    #[test]
    fn failed_write_leaves_target_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("player.sav");
        fs::write(&path, b"intact").unwrap();

        let result = write_to_file(&path, |w| {
            w.write_all(b"half")?;
            Err(io::Error::new(io::ErrorKind::Other, "serializer failed"))
        });

        assert!(result.is_err());
        assert_eq!(fs::read(&path).unwrap(), b"intact");
        assert!(!dir.path().join("player.sav.temp").exists());
    }

    #[test]
    fn replace_keeps_hardlinked_copy() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("player.sav");
        let link = dir.path().join("player.bak");
        fs::write(&path, b"v1").unwrap();
        if fs::hard_link(&path, &link).is_err() {
            return;
        }

        write_to_file(&path, |w| w.write_all(b"v2")).unwrap();
        assert_eq!(fs::read(&link).unwrap(), b"v1");
    }

    #[test]
    fn context_write_under_full_policy() {
        let dir = tempdir().unwrap();
        let ctx = DurabilityContext::new(FsyncLevel::Full);
        let path = dir.path().join("world.sav");

        ctx.write_file(&path, b"synced").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"synced");
        assert!(!ctx.sync_failed());
    }

    #[test]
    fn write_into_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let ctx = DurabilityContext::new(FsyncLevel::MarkersOnly);
        let result = ctx.write_file(&dir.path().join("nope").join("a.sav"), b"x");
        assert!(result.is_err());
    }
}
