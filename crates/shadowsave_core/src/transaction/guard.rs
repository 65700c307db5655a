//! The transaction guard.

use crate::config::{FsyncLevel, TransactionConfig};
use crate::dir::{is_reserved, SaveDir};
use crate::durability::{DurabilityContext, Registration};
use crate::error::{SaveError, SaveResult};
use crate::recovery::{self, RecoveryOutcome};
use crate::snapshot::{self, Capture, CaptureStats};
use crate::transaction::TransactionState;
use shadowsave_codec::write_commit_marker;
use shadowsave_storage::{remove_dir_all_if_exists, remove_file_if_exists, StorageError};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// A save transaction over one save directory.
///
/// Opening captures the live directory into `.save_backup`. The caller then
/// writes save files and calls [`commit`](Self::commit). Dropping the guard
/// without a successful commit rolls the directory back, on every exit path
/// including `?` returns and panics.
///
/// While the guard lives, its durability context is registered on the
/// opening thread, so [`crate::wants_full_fsync`] and
/// [`crate::notify_sync_failure`] reach it without being handed the guard.
/// The guard is therefore not `Send`; hand [`context`](Self::context) to
/// worker threads instead.
///
/// ```compile_fail
/// use shadowsave_core::Transaction;
///
/// fn assert_send<T: Send>() {}
/// assert_send::<Transaction>();
/// ```
///
/// Backups hardlink save files by default. Writers must replace files
/// (write a sibling, then rename) rather than truncate and rewrite them in
/// place, or the backup's copy changes too. [`Transaction::write_file`] and
/// [`crate::write_to_file`] replace; otherwise open with
/// [`TransactionConfig::link_files(false)`](TransactionConfig::link_files).
///
/// # Example
///
/// ```rust
/// use shadowsave_core::{FsyncLevel, Transaction};
///
/// let dir = tempfile::tempdir().unwrap();
/// std::fs::write(dir.path().join("world.sav"), b"original").unwrap();
///
/// {
///     let txn = Transaction::open(dir.path(), FsyncLevel::MarkersOnly).unwrap();
///     txn.write_file("world.sav", b"modified").unwrap();
///     // dropped without commit
/// }
/// assert_eq!(std::fs::read(dir.path().join("world.sav")).unwrap(), b"original");
///
/// let mut txn = Transaction::open(dir.path(), FsyncLevel::Full).unwrap();
/// txn.write_file("world.sav", b"modified").unwrap();
/// assert!(txn.commit());
/// drop(txn);
/// assert_eq!(std::fs::read(dir.path().join("world.sav")).unwrap(), b"modified");
/// ```
#[derive(Debug)]
pub struct Transaction {
    dir: SaveDir,
    context: Arc<DurabilityContext>,
    registration: Option<Registration>,
    state: TransactionState,
    capture: Capture,
}

impl Transaction {
    /// Opens a transaction with the default configuration and `level`.
    ///
    /// # Errors
    ///
    /// See [`Transaction::open_with_config`].
    pub fn open(save_dir: impl AsRef<Path>, level: FsyncLevel) -> SaveResult<Self> {
        Self::open_with_config(save_dir, TransactionConfig::default().fsync_level(level))
    }

    /// Opens a transaction, capturing the current state of `save_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error, with no backup directory left behind and no live
    /// file modified, if:
    /// - `save_dir` is not a directory (`NotADirectory`)
    /// - another transaction is registered on this thread (`TransactionActive`)
    /// - a leftover backup cannot be resolved (`StaleBackup`)
    /// - a stale commit marker cannot be removed, or the backup cannot be
    ///   created, duplicated or synced (`Storage`, `Marker`)
    pub fn open_with_config(
        save_dir: impl AsRef<Path>,
        config: TransactionConfig,
    ) -> SaveResult<Self> {
        let dir = SaveDir::open(save_dir.as_ref())?;
        let context = Arc::new(DurabilityContext::new(config.fsync_level));
        let registration = Registration::register(&context)?;
        let capture = snapshot::create_backup(&dir, &config)?;

        tracing::debug!(
            save_dir = %dir.path().display(),
            level = ?config.fsync_level,
            files = capture.files.len(),
            "save transaction opened"
        );

        Ok(Self {
            dir,
            context,
            registration: Some(registration),
            state: TransactionState::Ready,
            capture,
        })
    }

    /// Returns the live save directory.
    #[must_use]
    pub fn save_dir(&self) -> &Path {
        self.dir.path()
    }

    /// Returns the backup directory path.
    #[must_use]
    pub fn backup_dir(&self) -> PathBuf {
        self.dir.backup_dir()
    }

    /// Returns the durability policy.
    #[must_use]
    pub fn fsync_level(&self) -> FsyncLevel {
        self.context.level()
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns true once `commit()` has succeeded.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.state == TransactionState::Committed
    }

    /// Returns true if a flush failure has been recorded.
    #[must_use]
    pub fn sync_failed(&self) -> bool {
        self.context.sync_failed()
    }

    /// Returns a handle to the durability context for writers on other
    /// threads or writers that take the context explicitly.
    #[must_use]
    pub fn context(&self) -> Arc<DurabilityContext> {
        Arc::clone(&self.context)
    }

    /// Returns the relative paths captured in the backup, sorted.
    #[must_use]
    pub fn captured_files(&self) -> &[String] {
        &self.capture.files
    }

    /// Returns how the captured files were duplicated.
    #[must_use]
    pub fn capture_stats(&self) -> CaptureStats {
        self.capture.stats
    }

    /// Writes a save file at `rel` (relative to the save directory) under
    /// this transaction's policy, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPath` if `rel` escapes the save directory or names a
    /// reserved entry, or an I/O error if the write fails.
    pub fn write_file(&self, rel: impl AsRef<Path>, data: &[u8]) -> SaveResult<()> {
        let rel = rel.as_ref();
        let mut components = rel.components();
        let first_ok = match components.next() {
            Some(Component::Normal(name)) => !name.to_str().is_some_and(is_reserved),
            _ => false,
        };
        if !first_ok || !components.all(|c| matches!(c, Component::Normal(_))) {
            return Err(SaveError::invalid_path(rel));
        }

        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| StorageError::at("create directory", parent, e))?;
        }
        self.context.write_file(&path, data)
    }

    /// Commits the transaction.
    ///
    /// Returns `false`, leaving the guard armed so drop rolls back, if a
    /// flush failure was recorded or the commit marker cannot be written and
    /// synced. On success the commit marker is durable, the backup is
    /// removed, and the guard is disarmed.
    ///
    /// Calling `commit` again after success returns `true`.
    pub fn commit(&mut self) -> bool {
        match self.state {
            TransactionState::Committed => return true,
            TransactionState::Aborted => return false,
            TransactionState::Ready => {}
        }

        if self.context.sync_failed() {
            tracing::warn!(
                failed = ?self.context.failed_paths(),
                "refusing to commit, fsync failed during save"
            );
            return false;
        }

        let marker = match write_commit_marker(self.dir.path()) {
            Ok(marker) => marker,
            Err(e) => {
                tracing::error!(error = %e, "failed to write commit marker");
                return false;
            }
        };
        if let Err(e) = self.dir.sync() {
            tracing::error!(error = %e, "failed to sync commit marker");
            // Not durably committed: withdraw the marker so a crash before
            // the rollback cannot be read as a completed save.
            if let Err(e) = remove_file_if_exists(&marker) {
                tracing::warn!(error = %e, "failed to withdraw commit marker");
            }
            return false;
        }

        // Point of no return. The marker stays until the next open or load
        // so a crash during backup removal is still read as committed.
        if let Err(e) = remove_dir_all_if_exists(&self.dir.backup_dir()) {
            tracing::warn!(error = %e, "failed to remove backup after commit, deferred to recovery");
        }

        self.state = TransactionState::Committed;
        tracing::debug!(save_dir = %self.dir.path().display(), "save transaction committed");
        true
    }

    /// Rolls the save directory back now and consumes the guard.
    ///
    /// Returns `Clean` if the transaction already committed.
    pub fn rollback(mut self) -> RecoveryOutcome {
        self.abort()
    }

    fn abort(&mut self) -> RecoveryOutcome {
        if self.state != TransactionState::Ready {
            return RecoveryOutcome::Clean;
        }
        self.state = TransactionState::Aborted;

        let outcome = recovery::restore_from_backup(&self.dir);
        match &outcome {
            RecoveryOutcome::PartialRestore { failed } => tracing::error!(
                save_dir = %self.dir.path().display(),
                failed,
                "save transaction rollback was partial"
            ),
            other => tracing::debug!(
                save_dir = %self.dir.path().display(),
                outcome = ?other,
                "save transaction rolled back"
            ),
        }
        outcome
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        self.registration.take();
        self.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::durability::{notify_sync_failure, wants_full_fsync};
    use tempfile::tempdir;

    #[test]
    fn open_rejects_missing_directory() {
        let temp = tempdir().unwrap();
        let result = Transaction::open(temp.path().join("missing"), FsyncLevel::MarkersOnly);
        assert!(matches!(result, Err(SaveError::NotADirectory { .. })));
    }

    #[test]
    fn open_creates_backup_and_registers() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("world.sav"), b"w").unwrap();

        let txn = Transaction::open(temp.path(), FsyncLevel::Full).unwrap();
        assert_eq!(txn.state(), TransactionState::Ready);
        assert!(txn.backup_dir().is_dir());
        assert_eq!(txn.captured_files(), &["world.sav".to_string()]);
        assert!(wants_full_fsync());

        drop(txn);
        assert!(!wants_full_fsync());
        assert!(!temp.path().join(".save_backup").exists());
    }

    #[test]
    fn second_transaction_on_thread_is_refused() {
        let temp = tempdir().unwrap();
        let _txn = Transaction::open(temp.path(), FsyncLevel::MarkersOnly).unwrap();

        let other = tempdir().unwrap();
        let result = Transaction::open(other.path(), FsyncLevel::MarkersOnly);
        assert!(matches!(result, Err(SaveError::TransactionActive)));
        assert!(!other.path().join(".save_backup").exists());
    }

    #[test]
    fn commit_leaves_marker_and_no_backup() {
        let temp = tempdir().unwrap();
        let mut txn = Transaction::open(temp.path(), FsyncLevel::MarkersOnly).unwrap();
        txn.write_file("world.sav", b"saved").unwrap();

        assert!(txn.commit());
        assert!(txn.is_committed());
        assert!(txn.commit());
        drop(txn);

        assert!(!temp.path().join(".save_backup").exists());
        assert!(temp.path().join(".save_commit").is_file());
        assert_eq!(fs::read(temp.path().join("world.sav")).unwrap(), b"saved");
    }

    #[test]
    fn sync_failure_blocks_commit_under_full() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("world.sav"), b"original").unwrap();

        let mut txn = Transaction::open(temp.path(), FsyncLevel::Full).unwrap();
        txn.write_file("world.sav", b"modified").unwrap();
        notify_sync_failure();

        assert!(txn.sync_failed());
        assert!(!txn.commit());
        assert!(!temp.path().join(".save_commit").exists());
        drop(txn);

        assert_eq!(fs::read(temp.path().join("world.sav")).unwrap(), b"original");
    }

    #[test]
    fn sync_failure_ignored_under_markers_only() {
        let temp = tempdir().unwrap();
        let mut txn = Transaction::open(temp.path(), FsyncLevel::MarkersOnly).unwrap();
        notify_sync_failure();
        txn.context().notify_sync_failure();

        assert!(!txn.sync_failed());
        assert!(txn.commit());
    }

    #[test]
    fn rollback_consumes_guard() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("world.sav"), b"original").unwrap();

        let txn = Transaction::open(temp.path(), FsyncLevel::MarkersOnly).unwrap();
        txn.write_file("world.sav", b"modified").unwrap();
        txn.write_file("maps/new.map", b"stray").unwrap();

        let outcome = txn.rollback();
        assert_eq!(
            outcome,
            RecoveryOutcome::Restored {
                restored: 1,
                removed: 1
            }
        );
        assert!(!temp.path().join("maps").exists());
        assert!(!wants_full_fsync());
    }

    #[test]
    fn write_file_rejects_escaping_paths() {
        let temp = tempdir().unwrap();
        let txn = Transaction::open(temp.path(), FsyncLevel::MarkersOnly).unwrap();

        for bad in ["../outside.sav", ".save_backup/x", ".save_commit", "/abs.sav", ""] {
            assert!(
                matches!(txn.write_file(bad, b"x"), Err(SaveError::InvalidPath { .. })),
                "{bad} should be rejected"
            );
        }

        let err = txn.write_file("../outside.sav", b"x").unwrap_err();
        assert_eq!(err.to_string(), "invalid save path: ../outside.sav");
    }

    #[test]
    fn panic_inside_scope_rolls_back() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("world.sav"), b"original").unwrap();
        let path = temp.path().to_path_buf();

        let result = std::panic::catch_unwind(|| {
            let txn = Transaction::open(&path, FsyncLevel::MarkersOnly).unwrap();
            txn.write_file("world.sav", b"modified").unwrap();
            panic!("save routine failed");
        });

        assert!(result.is_err());
        assert_eq!(fs::read(temp.path().join("world.sav")).unwrap(), b"original");
        assert!(!temp.path().join(".save_backup").exists());
    }
}
