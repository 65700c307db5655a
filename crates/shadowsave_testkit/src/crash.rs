//! Crash simulation for save transactions.
//!
//! A crash is simulated by leaking the transaction guard on a scratch
//! thread: nothing after the chosen point runs, so the directory is left
//! exactly as a killed process would leave it. The thread-local
//! registration dies with the thread, so the calling thread can open the
//! next transaction normally.
//!
//! ## Test Strategy
//!
//! 1. **Crash during backup** - the snapshot never got its manifest
//! 2. **Crash before commit** - the save must be rolled back
//! 3. **Crash after the commit marker** - the save must be kept
//!
//! ## Usage
//!
//! ```rust
//! use shadowsave_testkit::crash::{CrashPoint, CrashRecoveryHarness};
//!
//! let mut harness = CrashRecoveryHarness::new();
//! harness.run_all(&[("world.sav", b"world v2"), ("maps/1.1/1.map", b"new")]);
//! assert!(harness.all_passed(), "{:?}", harness.results);
//! ```

use crate::fixtures::{TestSaveDir, TreeSnapshot};
use shadowsave_codec::{write_commit_marker, BACKUP_MARKER_FILE};
use shadowsave_core::{
    recover_if_needed, FsyncLevel, RecoveryOutcome, SaveDir, Transaction, BACKUP_DIR_NAME,
};
use shadowsave_storage::{CopyDuplicator, FileDuplicator, StorageError, StorageResult};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Points at which a crash can be simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashPoint {
    /// The backup directory exists but its manifest was never written.
    DuringBackup,
    /// The backup is complete and nothing has been written yet.
    AfterBackup,
    /// Save files have been written, commit was never called.
    DuringSave,
    /// The commit marker is durable but the backup was not removed.
    AfterCommitMarker,
    /// `commit()` returned true; the process died before the next load.
    AfterCommit,
}

impl CrashPoint {
    /// Every crash point, in transaction order.
    pub const ALL: [CrashPoint; 5] = [
        CrashPoint::DuringBackup,
        CrashPoint::AfterBackup,
        CrashPoint::DuringSave,
        CrashPoint::AfterCommitMarker,
        CrashPoint::AfterCommit,
    ];

    /// Returns true if the save must survive a crash at this point.
    pub fn is_committed(self) -> bool {
        matches!(self, Self::AfterCommitMarker | Self::AfterCommit)
    }

    /// Returns the contents recovery must produce.
    pub fn expected_after_recovery(
        self,
        before: &TreeSnapshot,
        writes: &[(&str, &[u8])],
    ) -> TreeSnapshot {
        let mut expected = before.clone();
        if self.is_committed() {
            for (rel, data) in writes {
                expected.apply_write(rel, data);
            }
        }
        expected
    }
}

/// Leaves `save_dir` as a process killed at `point` would.
///
/// `writes` are the save files the interrupted save produces.
pub fn simulate_crash(save_dir: &Path, point: CrashPoint, writes: &[(&str, &[u8])]) {
    if point == CrashPoint::DuringBackup {
        build_incomplete_backup(save_dir);
        return;
    }

    std::thread::scope(|scope| {
        scope
            .spawn(|| {
                let mut txn = Transaction::open(save_dir, FsyncLevel::MarkersOnly)
                    .expect("Failed to open transaction");

                if point != CrashPoint::AfterBackup {
                    for (rel, data) in writes {
                        txn.write_file(rel, data).expect("Failed to write save file");
                    }
                }
                match point {
                    CrashPoint::DuringSave => {
                        // A writer that was cut off mid-file.
                        if let Some((rel, data)) = writes.first() {
                            let partial = save_dir.join(format!("{rel}.next.temp"));
                            fs::write(partial, &data[..data.len() / 2])
                                .expect("Failed to write partial file");
                        }
                    }
                    CrashPoint::AfterCommitMarker => {
                        write_commit_marker(save_dir).expect("Failed to write commit marker");
                    }
                    CrashPoint::AfterCommit => assert!(txn.commit(), "commit failed"),
                    CrashPoint::DuringBackup | CrashPoint::AfterBackup => {}
                }

                std::mem::forget(txn);
            })
            .join()
            .expect("Crash thread panicked");
    });
}

/// Creates a backup directory holding some duplicates but no manifest.
pub fn build_incomplete_backup(save_dir: &Path) {
    let backup_dir = save_dir.join(BACKUP_DIR_NAME);
    fs::create_dir_all(&backup_dir).expect("Failed to create backup directory");

    let first_file = fs::read_dir(save_dir)
        .expect("Failed to read save directory")
        .filter_map(Result::ok)
        .find(|entry| entry.file_type().is_ok_and(|t| t.is_file()));
    if let Some(entry) = first_file {
        fs::copy(entry.path(), backup_dir.join(entry.file_name()))
            .expect("Failed to copy file into backup");
    }
}

/// Overwrites the backup manifest with bytes that do not parse.
pub fn corrupt_manifest(save_dir: &Path) {
    let path = SaveDir::at(save_dir).manifest_path();
    fs::write(path, b"{\"version\":1,\"pid\":").expect("Failed to corrupt manifest");
}

/// Replaces the backup manifest with a record that has no file list.
pub fn strip_manifest_file_list(save_dir: &Path) {
    let path = save_dir.join(BACKUP_DIR_NAME).join(BACKUP_MARKER_FILE);
    fs::write(path, b"{\"version\":1,\"pid\":1}").expect("Failed to rewrite manifest");
}

/// A duplicator that copies a fixed number of files and then fails.
#[derive(Debug)]
pub struct FailingDuplicator {
    remaining: AtomicUsize,
}

impl FailingDuplicator {
    /// Succeeds `count` times, then fails every call.
    pub fn after(count: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(count),
        }
    }
}

impl FileDuplicator for FailingDuplicator {
    fn try_link(&self, _src: &Path, _dst: &Path) -> bool {
        false
    }

    fn copy(&self, src: &Path, dst: &Path) -> StorageResult<()> {
        let allowed = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !allowed {
            return Err(StorageError::at(
                "copy",
                src,
                io::Error::new(io::ErrorKind::Other, "simulated copy failure"),
            ));
        }
        CopyDuplicator.copy(src, dst)
    }
}

/// Result of a crash recovery test.
#[derive(Debug, Clone)]
pub struct CrashRecoveryResult {
    /// The simulated crash point.
    pub point: CrashPoint,
    /// Whether the test passed.
    pub passed: bool,
    /// What recovery reported.
    pub outcome: RecoveryOutcome,
    /// Why the test failed.
    pub error: Option<String>,
}

/// Test harness for crash recovery scenarios.
///
/// Each run starts from a fresh [`TestSaveDir::populated`] directory.
#[derive(Debug, Default)]
pub struct CrashRecoveryHarness {
    /// Results of crash recovery tests.
    pub results: Vec<CrashRecoveryResult>,
}

impl CrashRecoveryHarness {
    /// Creates a new crash recovery harness.
    pub fn new() -> Self {
        Self::default()
    }

    /// Crashes at `point`, recovers, and checks the directory.
    pub fn run(&mut self, point: CrashPoint, writes: &[(&str, &[u8])]) -> CrashRecoveryResult {
        let dir = TestSaveDir::populated();
        let before = dir.snapshot();

        simulate_crash(dir.path(), point, writes);
        let outcome = recover_if_needed(dir.path());

        let expected = point.expected_after_recovery(&before, writes);
        let actual = dir.snapshot();
        let error = if actual != expected {
            Some(format!("contents differ: expected {expected:?}, got {actual:?}"))
        } else if dir.has_backup() {
            Some("backup directory left behind".to_string())
        } else if dir.has_commit_marker() {
            Some("commit marker left behind".to_string())
        } else if recover_if_needed(dir.path()) != RecoveryOutcome::Clean {
            Some("second recovery was not clean".to_string())
        } else {
            None
        };

        let result = CrashRecoveryResult {
            point,
            passed: error.is_none(),
            outcome,
            error,
        };
        self.results.push(result.clone());
        result
    }

    /// Runs every crash point.
    pub fn run_all(&mut self, writes: &[(&str, &[u8])]) {
        for point in CrashPoint::ALL {
            self.run(point, writes);
        }
    }

    /// Returns true if every recorded run passed.
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }
}
