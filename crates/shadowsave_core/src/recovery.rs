//! Recovery of interrupted save transactions.
//!
//! Decision table, evaluated once at load time:
//!
//! | backup dir | commit marker | action                                   |
//! |------------|---------------|------------------------------------------|
//! | absent     | absent        | nothing                                  |
//! | absent     | present       | remove the stale marker                  |
//! | present    | present       | live data is authoritative, clean up     |
//! | present    | absent        | interrupted save, restore from backup    |
//!
//! Restoring runs in three phases:
//! 1. Move every backed-up file back over the live directory. Each rename is
//!    atomic per file; if interrupted, files already moved are gone from the
//!    backup, so repeating is safe.
//! 2. Delete live files the manifest does not list (partial artifacts of the
//!    interrupted save) and directories the save created.
//! 3. Remove the backup directory, sync, then remove any commit marker.
//!
//! Recovery never fails the caller: problems are logged and reported through
//! [`RecoveryOutcome`].

use crate::dir::{is_reserved, SaveDir};
use shadowsave_codec::{read_marker, BACKUP_MARKER_FILE};
use shadowsave_storage::{move_file, remove_dir_all_if_exists, remove_file_if_exists};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// What recovery found and did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// No transaction leftovers.
    Clean,
    /// Only a commit marker from a completed save was present; it was removed.
    StaleCommitMarkerRemoved,
    /// The last save committed but its cleanup was interrupted; cleanup finished.
    CompletedCleanup,
    /// As `CompletedCleanup`, but removal failed; retried on the next run.
    CleanupDeferred,
    /// The backup never got a manifest; live files were untouched and the
    /// backup was discarded.
    IncompleteBackupDiscarded,
    /// The interrupted save was rolled back.
    Restored {
        /// Files moved back from the backup.
        restored: usize,
        /// Live files removed because the backup did not list them.
        removed: usize,
    },
    /// The manifest was unreadable; everything the backup held was moved
    /// back, but files written by the interrupted save may remain.
    DegradedRestore {
        /// Files moved back from the backup.
        restored: usize,
    },
    /// Some files could not be moved back; the backup is kept for a later
    /// attempt or manual recovery.
    PartialRestore {
        /// Files that failed to move.
        failed: usize,
    },
}

impl RecoveryOutcome {
    /// Returns true if the live directory was rolled back (fully or not).
    #[must_use]
    pub fn rolled_back(&self) -> bool {
        matches!(
            self,
            Self::Restored { .. } | Self::DegradedRestore { .. } | Self::PartialRestore { .. }
        )
    }

    /// Returns true if leftovers remain on disk after this run.
    #[must_use]
    pub fn needs_retry(&self) -> bool {
        matches!(self, Self::CleanupDeferred | Self::PartialRestore { .. })
    }
}

/// Restores consistency of `save_dir` after an interrupted or incompletely
/// cleaned-up transaction.
///
/// Call once at load time, before any save file is read. Idempotent.
pub fn recover_if_needed(save_dir: impl AsRef<Path>) -> RecoveryOutcome {
    let dir = SaveDir::at(save_dir.as_ref());
    if !dir.path().is_dir() {
        tracing::debug!(save_dir = %dir.path().display(), "no save directory, nothing to recover");
        return RecoveryOutcome::Clean;
    }

    if !dir.has_backup() {
        if dir.has_commit_marker() {
            return match remove_file_if_exists(&dir.commit_marker_path()) {
                Ok(_) => RecoveryOutcome::StaleCommitMarkerRemoved,
                Err(e) => {
                    tracing::warn!(error = %e, "save recovery: failed to remove stale commit marker");
                    RecoveryOutcome::CleanupDeferred
                }
            };
        }
        return RecoveryOutcome::Clean;
    }

    if dir.has_commit_marker() {
        return finish_committed_cleanup(&dir);
    }

    tracing::warn!(save_dir = %dir.path().display(), "save recovery: restoring after interrupted save");
    restore_from_backup(&dir)
}

/// Completes the cleanup of a committed transaction.
///
/// The marker is removed only after the backup removal is durable; if either
/// step fails the marker stays so the next run still sees "committed".
fn finish_committed_cleanup(dir: &SaveDir) -> RecoveryOutcome {
    if let Err(e) = remove_dir_all_if_exists(&dir.backup_dir()) {
        tracing::warn!(error = %e, "save recovery: failed to remove backup, will retry next load");
        return RecoveryOutcome::CleanupDeferred;
    }
    if let Err(e) = dir.sync() {
        tracing::warn!(error = %e, "save recovery: cleanup sync failed, will retry next load");
        return RecoveryOutcome::CleanupDeferred;
    }
    if let Err(e) = remove_file_if_exists(&dir.commit_marker_path()) {
        tracing::warn!(error = %e, "save recovery: failed to remove commit marker");
    }
    RecoveryOutcome::CompletedCleanup
}

/// Rolls the live directory back to the backup's contents.
///
/// Used by recovery and by the transaction guard. Ignores the commit marker
/// when deciding, and removes it once the backup is gone.
pub(crate) fn restore_from_backup(dir: &SaveDir) -> RecoveryOutcome {
    let backup_dir = dir.backup_dir();
    if !backup_dir.exists() {
        return RecoveryOutcome::Clean;
    }

    if !dir.has_manifest() {
        tracing::warn!(backup = %backup_dir.display(), "save recovery: incomplete backup, removing");
        if let Err(e) = remove_dir_all_if_exists(&backup_dir) {
            tracing::warn!(error = %e, "save recovery: failed to remove incomplete backup");
            return RecoveryOutcome::CleanupDeferred;
        }
        return RecoveryOutcome::IncompleteBackupDiscarded;
    }

    let manifest = read_manifest(&dir.manifest_path());
    let moved = move_back(&backup_dir, dir.path());
    let removed = match &manifest {
        Some(files) => remove_unlisted(dir, files),
        None => 0,
    };

    if moved.failed > 0 {
        tracing::error!(
            backup = %backup_dir.display(),
            failed = moved.failed,
            "save recovery: partial restore, backup kept for manual recovery"
        );
        return RecoveryOutcome::PartialRestore {
            failed: moved.failed,
        };
    }

    match remove_dir_all_if_exists(&backup_dir) {
        Ok(_) => match dir.sync() {
            Ok(()) => {
                if let Err(e) = remove_file_if_exists(&dir.commit_marker_path()) {
                    tracing::warn!(error = %e, "save recovery: failed to remove commit marker after restore");
                }
            }
            Err(e) => tracing::warn!(error = %e, "save recovery: cleanup sync failed after restore"),
        },
        Err(e) => tracing::warn!(error = %e, "save recovery: failed to remove restored backup"),
    }

    if manifest.is_some() {
        RecoveryOutcome::Restored {
            restored: moved.restored,
            removed,
        }
    } else {
        RecoveryOutcome::DegradedRestore {
            restored: moved.restored,
        }
    }
}

/// Reads the captured file set. `None` means the set is unknown.
fn read_manifest(path: &Path) -> Option<BTreeSet<String>> {
    match read_marker(path) {
        Ok(Some(record)) => {
            let files = record.file_set();
            if files.is_none() {
                tracing::warn!(manifest = %path.display(), "save recovery: manifest has no file list, degraded recovery");
            }
            files
        }
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(error = %e, "save recovery: manifest unreadable, degraded recovery");
            None
        }
    }
}

#[derive(Debug, Default)]
struct MoveReport {
    restored: usize,
    failed: usize,
}

fn move_back(backup_dir: &Path, save_dir: &Path) -> MoveReport {
    let mut report = MoveReport::default();
    let mut entries = Vec::new();
    collect_entries(backup_dir, Path::new(""), &mut entries, &|rel| {
        rel == Path::new(BACKUP_MARKER_FILE)
    });

    for (rel, is_dir) in entries {
        let dest = save_dir.join(&rel);
        if is_dir {
            if let Err(e) = fs::create_dir_all(&dest) {
                tracing::error!(path = %dest.display(), error = %e, "save recovery: failed to recreate directory");
            }
            continue;
        }
        match move_file(&backup_dir.join(&rel), &dest) {
            Ok(()) => report.restored += 1,
            Err(e) => {
                tracing::error!(path = %rel.display(), error = %e, "save recovery: failed to restore file");
                report.failed += 1;
            }
        }
    }
    report
}

fn remove_unlisted(dir: &SaveDir, manifest: &BTreeSet<String>) -> usize {
    let backup_dir = dir.backup_dir();
    let mut entries = Vec::new();
    collect_entries(dir.path(), Path::new(""), &mut entries, &|rel| {
        rel.to_str().is_some_and(is_reserved)
    });

    let mut removed = 0;
    for (rel, is_dir) in &entries {
        if *is_dir {
            continue;
        }
        if manifest.contains(&manifest_key(rel)) {
            continue;
        }
        match fs::remove_file(dir.path().join(rel)) {
            Ok(()) => removed += 1,
            Err(e) => {
                tracing::warn!(path = %rel.display(), error = %e, "save recovery: failed to remove stale file");
            }
        }
    }

    // Children before parents. Directories that existed when the backup was
    // taken are still mirrored in the backup and are kept.
    for (rel, is_dir) in entries.iter().rev() {
        if !*is_dir || backup_dir.join(rel).is_dir() {
            continue;
        }
        let path = dir.path().join(rel);
        let empty = fs::read_dir(&path).is_ok_and(|mut it| it.next().is_none());
        if empty {
            if let Err(e) = fs::remove_dir(&path) {
                tracing::warn!(path = %rel.display(), error = %e, "save recovery: failed to remove stale directory");
            }
        }
    }
    removed
}

/// Collects `(relative path, is_dir)` pairs, parents before children.
///
/// `skip_top` filters top-level entries (and their subtrees).
fn collect_entries(
    root: &Path,
    rel: &Path,
    out: &mut Vec<(PathBuf, bool)>,
    skip_top: &dyn Fn(&Path) -> bool,
) {
    let dir = root.join(rel);
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(path = %dir.display(), error = %e, "save recovery: cannot list directory");
            return;
        }
    };

    for entry in entries.flatten() {
        let child = rel.join(entry.file_name());
        if rel.as_os_str().is_empty() && skip_top(&child) {
            continue;
        }
        let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
        out.push((child.clone(), is_dir));
        if is_dir {
            collect_entries(root, &child, out, skip_top);
        }
    }
}

/// Relative path in manifest form (forward slashes).
fn manifest_key(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
