//! Transaction configuration.

use shadowsave_storage::{CopyDuplicator, FileDuplicator, HardLinkDuplicator};
use std::sync::Arc;

/// Which files a transaction forces to durable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FsyncLevel {
    /// Only marker files and directory entries are synced.
    ///
    /// Cheap; suited to frequent autosaves.
    #[default]
    MarkersOnly,
    /// Every file written during the transaction is synced.
    ///
    /// Expensive; suited to an explicit save-and-exit.
    Full,
}

/// Configuration for opening a save transaction.
#[derive(Debug, Clone)]
pub struct TransactionConfig {
    /// Durability policy for files written during the transaction.
    pub fsync_level: FsyncLevel,

    /// Extensions (without the dot) of files that are always copied into the
    /// backup, never hardlinked. Use for files mutated in place, such as
    /// memory-mapped archives.
    pub copy_only_extensions: Vec<String>,

    /// How files are duplicated into the backup.
    pub duplicator: Arc<dyn FileDuplicator>,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            fsync_level: FsyncLevel::MarkersOnly,
            copy_only_extensions: vec!["zzip".to_string()],
            duplicator: Arc::new(HardLinkDuplicator),
        }
    }
}

impl TransactionConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the durability policy.
    #[must_use]
    pub fn fsync_level(mut self, level: FsyncLevel) -> Self {
        self.fsync_level = level;
        self
    }

    /// Sets whether files may be hardlinked into the backup.
    ///
    /// With `false` every file is copied. Keep the default only if every
    /// writer replaces files instead of truncating them in place.
    #[must_use]
    pub fn link_files(mut self, value: bool) -> Self {
        self.duplicator = if value {
            Arc::new(HardLinkDuplicator)
        } else {
            Arc::new(CopyDuplicator)
        };
        self
    }

    /// Replaces the duplication strategy.
    #[must_use]
    pub fn duplicator(mut self, duplicator: Arc<dyn FileDuplicator>) -> Self {
        self.duplicator = duplicator;
        self
    }

    /// Adds an extension whose files are always copied.
    #[must_use]
    pub fn copy_only_extension(mut self, ext: impl Into<String>) -> Self {
        self.copy_only_extensions.push(ext.into());
        self
    }

    /// Returns true if files with this extension must be copied.
    #[must_use]
    pub fn is_copy_only(&self, ext: &str) -> bool {
        self.copy_only_extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(ext))
    }
}
