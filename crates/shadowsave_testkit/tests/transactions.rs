//! Integration tests for the save transaction lifecycle.

use shadowsave_core::{
    notify_sync_failure, wants_full_fsync, write_to_file, FsyncLevel, SaveError, Transaction,
    TransactionConfig, TransactionState,
};
use shadowsave_testkit::prelude::*;
use std::io::Write;
use std::sync::Arc;

#[test]
fn dropped_transaction_restores_original() {
    let dir = TestSaveDir::new();
    dir.write("data.sav", b"original");

    {
        let txn = Transaction::open(dir.path(), FsyncLevel::MarkersOnly).unwrap();
        txn.write_file("data.sav", b"modified").unwrap();
        txn.write_file("stray.sav", b"stray").unwrap();
        assert_eq!(dir.read("data.sav"), b"modified");
    }

    assert_eq!(dir.read("data.sav"), b"original");
    assert!(!dir.exists("stray.sav"));
    assert!(!dir.has_backup());
    assert!(!dir.has_commit_marker());
}

#[test]
fn dropped_transaction_is_bit_for_bit() {
    let dir = TestSaveDir::populated();
    dir.create_dir("screenshots");
    let before = dir.snapshot();

    {
        let txn = Transaction::open(dir.path(), FsyncLevel::Full).unwrap();
        txn.write_file("world.sav", b"world v2").unwrap();
        txn.write_file("maps/0.0/1.map", b"map 1 v2").unwrap();
        txn.write_file("maps/5.5/new.map", b"new").unwrap();
        std::fs::remove_file(dir.path().join("player.sav")).unwrap();
        std::fs::remove_dir(dir.path().join("screenshots")).unwrap();
    }

    assert_eq!(dir.snapshot(), before);
    assert!(!dir.has_backup());
}

#[test]
fn commit_keeps_new_save() {
    let dir = TestSaveDir::populated();
    let mut expected = dir.snapshot();

    let mut txn = Transaction::open(dir.path(), FsyncLevel::Full).unwrap();
    txn.write_file("world.sav", b"world v2").unwrap();
    txn.write_file("maps/1.0/1.map", b"fresh").unwrap();
    assert!(txn.commit());
    assert_eq!(txn.state(), TransactionState::Committed);
    drop(txn);

    expected.apply_write("world.sav", b"world v2");
    expected.apply_write("maps/1.0/1.map", b"fresh");
    assert_eq!(dir.snapshot(), expected);
    assert!(!dir.has_backup());
    assert!(dir.has_commit_marker());
}

#[test]
fn next_transaction_clears_commit_marker() {
    let dir = TestSaveDir::populated();

    let mut first = Transaction::open(dir.path(), FsyncLevel::MarkersOnly).unwrap();
    assert!(first.commit());
    drop(first);
    assert!(dir.has_commit_marker());

    let second = Transaction::open(dir.path(), FsyncLevel::MarkersOnly).unwrap();
    assert!(!dir.has_commit_marker());
    assert!(!second
        .captured_files()
        .iter()
        .any(|f| f.starts_with(".save")));
}

#[test]
fn sync_failure_under_full_fails_commit_and_rolls_back() {
    let dir = TestSaveDir::new();
    dir.write("data.sav", b"original");

    let mut txn = Transaction::open(dir.path(), FsyncLevel::Full).unwrap();
    txn.write_file("data.sav", b"modified").unwrap();
    notify_sync_failure();

    assert!(!txn.commit());
    assert!(!dir.has_commit_marker());
    drop(txn);

    assert_eq!(dir.read("data.sav"), b"original");
    assert!(!dir.has_backup());
}

#[test]
fn free_functions_follow_registration() {
    let dir = TestSaveDir::new();
    assert!(!wants_full_fsync());

    let txn = Transaction::open(dir.path(), FsyncLevel::Full).unwrap();
    assert!(wants_full_fsync());
    drop(txn);
    assert!(!wants_full_fsync());

    let txn = Transaction::open(dir.path(), FsyncLevel::MarkersOnly).unwrap();
    assert!(!wants_full_fsync());
    drop(txn);
}

#[test]
fn write_helper_uses_registered_policy() {
    let dir = TestSaveDir::populated();

    let mut txn = Transaction::open(dir.path(), FsyncLevel::Full).unwrap();
    write_to_file(&dir.path().join("world.sav"), |w| w.write_all(b"via helper")).unwrap();
    assert!(!txn.sync_failed());
    assert!(txn.commit());
    drop(txn);

    assert_eq!(dir.read("world.sav"), b"via helper");
    assert!(!dir.exists("world.sav.temp"));
}

#[test]
fn context_can_be_used_from_worker_thread() {
    let dir = TestSaveDir::populated();
    let mut txn = Transaction::open(dir.path(), FsyncLevel::Full).unwrap();
    let ctx = txn.context();
    let target = dir.path().join("player.sav");

    std::thread::spawn(move || {
        // The worker thread has no registration of its own.
        assert!(!wants_full_fsync());
        assert!(ctx.wants_full_fsync());
        ctx.write_file(&target, b"player v2").unwrap();
        ctx.notify_sync_failure();
    })
    .join()
    .unwrap();

    assert!(txn.sync_failed());
    assert!(!txn.commit());
    drop(txn);
    assert_eq!(dir.read("player.sav"), b"player v1");
}

#[test]
fn transactions_on_separate_threads_are_independent() {
    let a = TestSaveDir::populated();
    let b = TestSaveDir::populated();
    let (path_a, path_b) = (a.path().to_path_buf(), b.path().to_path_buf());

    let handle = std::thread::spawn(move || {
        let mut txn = Transaction::open(&path_b, FsyncLevel::MarkersOnly).unwrap();
        txn.write_file("world.sav", b"b").unwrap();
        txn.commit()
    });

    let txn = Transaction::open(&path_a, FsyncLevel::Full).unwrap();
    txn.write_file("world.sav", b"a").unwrap();
    assert!(handle.join().unwrap());
    drop(txn);

    assert_eq!(a.read("world.sav"), b"world v1");
    assert_eq!(b.read("world.sav"), b"b");
}

#[test]
fn nested_transaction_is_rejected() {
    let outer_dir = TestSaveDir::populated();
    let inner_dir = TestSaveDir::populated();

    let outer = Transaction::open(outer_dir.path(), FsyncLevel::MarkersOnly).unwrap();
    let inner = Transaction::open(inner_dir.path(), FsyncLevel::MarkersOnly);
    assert!(matches!(inner, Err(SaveError::TransactionActive)));
    assert!(!inner_dir.has_backup());
    drop(outer);

    assert!(Transaction::open(inner_dir.path(), FsyncLevel::MarkersOnly).is_ok());
}

#[test]
fn backup_failure_fails_open_without_residue() {
    let dir = TestSaveDir::populated();
    let before = dir.snapshot();
    let config = TransactionConfig::new().duplicator(Arc::new(FailingDuplicator::after(2)));

    let result = Transaction::open_with_config(dir.path(), config);
    assert!(result.is_err());
    assert!(!dir.has_backup());
    assert_eq!(dir.snapshot(), before);
    assert!(!wants_full_fsync());

    // The failed open released the thread.
    assert!(Transaction::open(dir.path(), FsyncLevel::MarkersOnly).is_ok());
}

#[test]
fn unremovable_commit_marker_fails_open() {
    let dir = TestSaveDir::populated();
    // A non-empty directory where the commit marker belongs cannot be removed
    // as a file.
    dir.write(".save_commit/blocker", b"x");

    let result = Transaction::open(dir.path(), FsyncLevel::MarkersOnly);
    assert!(result.is_err());
    assert!(!dir.has_backup());
}

#[test]
fn in_progress_files_are_never_captured() {
    let dir = TestSaveDir::populated();
    dir.write("world.sav.temp", b"partial");
    dir.write("maps/0.0/3.map.tmp", b"partial");

    let txn = Transaction::open(dir.path(), FsyncLevel::MarkersOnly).unwrap();
    assert!(!txn.captured_files().iter().any(|f| f.ends_with(".temp") || f.ends_with(".tmp")));
    assert!(!dir.exists(".save_backup/world.sav.temp"));
    assert!(!dir.exists(".save_backup/maps/0.0/3.map.tmp"));
    drop(txn);

    // Leftover in-progress files are not part of the restored state.
    assert!(!dir.exists("world.sav.temp"));
}

#[test]
fn bare_suffix_names_are_never_captured() {
    let dir = TestSaveDir::populated();
    dir.write(".tmp", b"partial");
    dir.write(".temp", b"partial");

    let txn = Transaction::open(dir.path(), FsyncLevel::MarkersOnly).unwrap();
    assert!(!txn.captured_files().iter().any(|f| f == ".tmp" || f == ".temp"));
    assert!(!dir.exists(".save_backup/.tmp"));
    assert!(!dir.exists(".save_backup/.temp"));
}

#[test]
fn copy_mode_survives_in_place_rewrites() {
    let dir = TestSaveDir::populated();
    let config = TransactionConfig::new().link_files(false);

    let txn = Transaction::open_with_config(dir.path(), config).unwrap();
    {
        // Truncates the live inode instead of replacing it.
        let mut file = std::fs::File::create(dir.path().join("world.sav")).unwrap();
        file.write_all(b"modified").unwrap();
        file.sync_all().unwrap();
    }
    drop(txn);

    assert_eq!(dir.read("world.sav"), b"world v1");
}

#[test]
fn copy_mode_and_link_mode_restore_identically() {
    for link in [true, false] {
        let dir = TestSaveDir::populated();
        let before = dir.snapshot();
        let config = TransactionConfig::new().link_files(link);

        let txn = Transaction::open_with_config(dir.path(), config).unwrap();
        if link {
            assert!(txn.capture_stats().copied >= 1, "zzip must be copied");
        } else {
            assert_eq!(txn.capture_stats().linked, 0);
        }
        txn.write_file("world.sav", b"changed").unwrap();
        drop(txn);

        assert_eq!(dir.snapshot(), before, "link_files = {link}");
    }
}

#[test]
fn explicit_rollback_reports_outcome() {
    let dir = TestSaveDir::populated();
    let txn = Transaction::open(dir.path(), FsyncLevel::MarkersOnly).unwrap();
    txn.write_file("extra.sav", b"extra").unwrap();

    let outcome = txn.rollback();
    assert!(outcome.rolled_back());
    assert!(!outcome.needs_retry());
    assert!(!dir.exists("extra.sav"));
}
