//! # ShadowSave Core
//!
//! All-or-nothing saves for a directory of save files.
//!
//! This crate provides:
//! - [`Transaction`]: shadow-copy transaction over one save directory, with
//!   rollback on drop
//! - [`recover_if_needed`]: load-time recovery of interrupted saves
//! - [`DurabilityContext`]: the per-transaction fsync policy consulted by
//!   file writers
//! - [`write_to_file`]: a replace-by-rename writer that honors the policy
//! - [`SaveDir::status`]: read-only inspection of transaction leftovers
//!
//! ## Guarantees
//!
//! Once `commit()` returns `true` the live directory alone is the new save.
//! If the process dies at any earlier point, `recover_if_needed` puts the
//! directory back into the state captured when the transaction opened.
//!
//! ## Example
//!
//! ```rust
//! use shadowsave_core::{recover_if_needed, FsyncLevel, RecoveryOutcome, Transaction};
//!
//! let dir = tempfile::tempdir().unwrap();
//! assert_eq!(recover_if_needed(dir.path()), RecoveryOutcome::Clean);
//!
//! let mut txn = Transaction::open(dir.path(), FsyncLevel::MarkersOnly).unwrap();
//! txn.write_file("world.sav", b"state").unwrap();
//! assert!(txn.commit());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dir;
mod durability;
mod error;
mod recovery;
mod snapshot;
mod transaction;
mod writer;

pub use config::{FsyncLevel, TransactionConfig};
pub use dir::{
    is_in_progress, CommitState, ManifestState, SaveDir, SaveDirStatus, BACKUP_DIR_NAME,
    IN_PROGRESS_SUFFIXES,
};
pub use durability::{current, notify_sync_failure, wants_full_fsync, DurabilityContext};
pub use error::{SaveError, SaveResult};
pub use recovery::{recover_if_needed, RecoveryOutcome};
pub use snapshot::{Capture, CaptureStats};
pub use transaction::{Transaction, TransactionState};
pub use writer::write_to_file;

pub use shadowsave_codec::{BACKUP_MARKER_FILE, COMMIT_MARKER_FILE};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
