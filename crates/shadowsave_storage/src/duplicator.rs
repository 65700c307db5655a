//! File duplication capability.

use crate::error::{StorageError, StorageResult};
use std::fmt;
use std::fs;
use std::path::Path;

/// How a file ended up duplicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateKind {
    /// The destination shares the source's inode.
    Linked,
    /// The destination is an independent byte copy.
    Copied,
}

/// Duplicates a file from one path to another.
///
/// Implementors decide whether a cheap link is possible. When `try_link`
/// reports `false` the caller falls back to [`FileDuplicator::copy`], so
/// platforms without hardlink support (or cross-device layouts) degrade
/// automatically.
///
/// # Invariants
///
/// - After a successful `duplicate`, `dst` holds the bytes `src` held at the
///   time of the call
/// - `try_link` never leaves a partial destination behind when it returns `false`
///
/// # Implementors
///
/// - [`HardLinkDuplicator`] - hardlink with copy fallback
/// - [`CopyDuplicator`] - always copies
pub trait FileDuplicator: Send + Sync + fmt::Debug {
    /// Attempts to create `dst` as a link to `src`.
    ///
    /// Returns `false` if linking is unsupported or failed.
    fn try_link(&self, src: &Path, dst: &Path) -> bool;

    /// Copies `src` to `dst`, overwriting `dst` if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy fails.
    fn copy(&self, src: &Path, dst: &Path) -> StorageResult<()> {
        fs::copy(src, dst)
            .map(|_| ())
            .map_err(|e| StorageError::at("copy", src, e))
    }

    /// Links `src` to `dst` when possible, copying otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy fallback fails.
    fn duplicate(&self, src: &Path, dst: &Path) -> StorageResult<DuplicateKind> {
        if self.try_link(src, dst) {
            return Ok(DuplicateKind::Linked);
        }
        self.copy(src, dst)?;
        Ok(DuplicateKind::Copied)
    }
}

/// Hardlinks files, falling back to a copy when the filesystem refuses.
///
/// Safe only for files that writers replace (write to temp, then rename).
/// A writer that mutates a file in place would mutate the linked copy too.
#[derive(Debug, Clone, Copy, Default)]
pub struct HardLinkDuplicator;

impl FileDuplicator for HardLinkDuplicator {
    fn try_link(&self, src: &Path, dst: &Path) -> bool {
        match fs::hard_link(src, dst) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(src = %src.display(), error = %e, "hardlink failed, copying");
                false
            }
        }
    }
}

/// Always produces an independent copy.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyDuplicator;

impl FileDuplicator for CopyDuplicator {
    fn try_link(&self, _src: &Path, _dst: &Path) -> bool {
        false
    }
}
