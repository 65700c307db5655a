//! Backup snapshotter.
//!
//! Captures the live save directory into `.save_backup` before any save
//! write begins.
//!
//! # Crash Safety
//!
//! 1. Leftovers from a previous transaction are resolved, and a stale commit
//!    marker is removed and the removal synced *before* the backup directory
//!    is created. Otherwise a power loss after backup creation could leave
//!    both on disk and recovery would misread the interrupted save as
//!    committed.
//! 2. The backup directory is created and every captured file duplicated.
//! 3. The manifest is written and synced, then both directories are synced.
//!
//! A backup directory without a manifest is an incomplete snapshot: the
//! live files were never touched, so recovery simply discards it.

use crate::config::TransactionConfig;
use crate::dir::{is_in_progress, is_reserved, SaveDir};
use crate::error::{SaveError, SaveResult};
use crate::recovery;
use shadowsave_codec::write_backup_marker;
use shadowsave_storage::{
    remove_dir_all_if_exists, remove_file_if_exists, sync_directory, DuplicateKind, StorageError,
};
use std::fs;
use std::path::Path;

/// Counts of how captured files were duplicated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Files sharing an inode with the live file.
    pub linked: usize,
    /// Files copied byte for byte.
    pub copied: usize,
}

/// Result of a successful capture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capture {
    /// Relative, forward-slash separated paths, sorted.
    pub files: Vec<String>,
    /// Duplication counts.
    pub stats: CaptureStats,
}

/// Resolves leftovers and captures `dir` into its backup directory.
///
/// On error no backup directory is left behind and no live file has been
/// modified.
pub(crate) fn create_backup(dir: &SaveDir, config: &TransactionConfig) -> SaveResult<Capture> {
    resolve_leftovers(dir)?;

    let backup_dir = dir.backup_dir();
    fs::create_dir(&backup_dir)
        .map_err(|e| StorageError::at("create backup directory", &backup_dir, e))?;

    match capture(dir, config) {
        Ok(capture) => {
            tracing::debug!(
                save_dir = %dir.path().display(),
                files = capture.files.len(),
                linked = capture.stats.linked,
                copied = capture.stats.copied,
                "backup created"
            );
            Ok(capture)
        }
        Err(e) => {
            if let Err(cleanup) = remove_dir_all_if_exists(&backup_dir) {
                tracing::error!(error = %cleanup, "failed to remove partial backup");
            }
            Err(e)
        }
    }
}

fn resolve_leftovers(dir: &SaveDir) -> SaveResult<()> {
    if dir.has_backup() {
        if dir.has_commit_marker() {
            // The previous save committed but its cleanup was interrupted.
            remove_dir_all_if_exists(&dir.backup_dir())?;
            dir.sync()?;
            if let Err(e) = remove_file_if_exists(&dir.commit_marker_path()) {
                tracing::warn!(error = %e, "failed to remove commit marker during stale backup cleanup");
            }
        } else {
            // Recovery should have run at load; run it now.
            tracing::warn!(save_dir = %dir.path().display(), "stale backup found, recovering");
            recovery::restore_from_backup(dir);
            if dir.has_backup() {
                return Err(SaveError::stale_backup(&dir.backup_dir()));
            }
        }
    }

    // Only reached with no backup directory, so the marker can go.
    remove_file_if_exists(&dir.commit_marker_path())?;
    dir.sync()?;
    Ok(())
}

fn capture(dir: &SaveDir, config: &TransactionConfig) -> SaveResult<Capture> {
    let backup_dir = dir.backup_dir();
    let mut capture = Capture::default();

    copy_tree(dir.path(), &backup_dir, "", config, &mut capture)?;
    capture.files.sort();

    write_backup_marker(&backup_dir, &capture.files)?;
    sync_directory(&backup_dir)?;
    dir.sync()?;
    Ok(capture)
}

fn copy_tree(
    src_dir: &Path,
    dst_dir: &Path,
    prefix: &str,
    config: &TransactionConfig,
    capture: &mut Capture,
) -> SaveResult<()> {
    let entries =
        fs::read_dir(src_dir).map_err(|e| StorageError::at("read directory", src_dir, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| StorageError::at("read directory", src_dir, e))?;
        let src = entry.path();
        let name = entry
            .file_name()
            .into_string()
            .map_err(|_| SaveError::invalid_path(&src))?;

        if (prefix.is_empty() && is_reserved(&name)) || is_in_progress(&name) {
            continue;
        }

        let rel = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}/{name}")
        };
        let dst = dst_dir.join(&name);
        let file_type = entry
            .file_type()
            .map_err(|e| StorageError::at("stat", &src, e))?;

        if file_type.is_dir() {
            fs::create_dir_all(&dst).map_err(|e| StorageError::at("create directory", &dst, e))?;
            copy_tree(&src, &dst, &rel, config, capture)?;
            continue;
        }

        let copy_only = src
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| config.is_copy_only(ext));
        let kind = if copy_only {
            config.duplicator.copy(&src, &dst)?;
            DuplicateKind::Copied
        } else {
            config.duplicator.duplicate(&src, &dst)?
        };
        match kind {
            DuplicateKind::Linked => capture.stats.linked += 1,
            DuplicateKind::Copied => capture.stats.copied += 1,
        }
        capture.files.push(rel);
    }
    Ok(())
}
