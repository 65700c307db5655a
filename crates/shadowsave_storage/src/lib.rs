//! # ShadowSave Storage
//!
//! Filesystem primitives for ShadowSave.
//!
//! This crate provides the lowest-level building blocks the transaction
//! engine needs from the operating system. It knows nothing about markers,
//! manifests or save directories.
//!
//! ## Design Principles
//!
//! - Durable flushes are explicit (`sync_file`, `sync_directory`)
//! - Duplication is a capability ([`FileDuplicator`]) so platforms without
//!   hardlinks degrade to copying
//! - Every failure carries the operation and path that failed
//!
//! ## Example
//!
//! ```rust
//! use shadowsave_storage::{CopyDuplicator, FileDuplicator, DuplicateKind};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let src = dir.path().join("a.sav");
//! let dst = dir.path().join("b.sav");
//! std::fs::write(&src, b"state").unwrap();
//!
//! let kind = CopyDuplicator.duplicate(&src, &dst).unwrap();
//! assert_eq!(kind, DuplicateKind::Copied);
//! assert_eq!(std::fs::read(&dst).unwrap(), b"state");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod duplicator;
mod error;
mod ops;
mod sync;

pub use duplicator::{CopyDuplicator, DuplicateKind, FileDuplicator, HardLinkDuplicator};
pub use error::{StorageError, StorageResult};
pub use ops::{move_file, remove_dir_all_if_exists, remove_file_if_exists};
pub use sync::{sync_directory, sync_file};
