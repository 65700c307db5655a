//! Durability policy shared with file writers.
//!
//! A transaction owns a [`DurabilityContext`]. Writers that are handed the
//! context (or a clone of the `Arc`) consult it directly. Writers that are
//! not can use the free functions [`wants_full_fsync`] and
//! [`notify_sync_failure`], which resolve the transaction registered on the
//! calling thread.
//!
//! The registration is a weak reference and lives exactly as long as the
//! transaction. It is `!Send`, which pins the transaction to the thread it
//! was opened on. A second transaction on the same thread is refused instead
//! of replacing the first.

use crate::config::FsyncLevel;
use crate::error::{SaveError, SaveResult};
use parking_lot::Mutex;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

thread_local! {
    static CURRENT: RefCell<Option<Weak<DurabilityContext>>> = const { RefCell::new(None) };
}

/// Durability policy and flush-failure record of one transaction.
///
/// `Send + Sync`: the context may be cloned into worker threads that write
/// save files on the transaction's behalf.
#[derive(Debug)]
pub struct DurabilityContext {
    level: FsyncLevel,
    sync_failed: AtomicBool,
    failed_paths: Mutex<Vec<PathBuf>>,
}

impl DurabilityContext {
    /// Creates a context with the given policy.
    #[must_use]
    pub fn new(level: FsyncLevel) -> Self {
        Self {
            level,
            sync_failed: AtomicBool::new(false),
            failed_paths: Mutex::new(Vec::new()),
        }
    }

    /// Returns the policy.
    #[must_use]
    pub fn level(&self) -> FsyncLevel {
        self.level
    }

    /// Returns true if every written file must be synced.
    #[must_use]
    pub fn wants_full_fsync(&self) -> bool {
        self.level == FsyncLevel::Full
    }

    /// Records that a file flush failed.
    ///
    /// Only `Full` transactions promise per-file durability, so the failure
    /// is ignored under `MarkersOnly`.
    pub fn notify_sync_failure(&self) {
        if self.wants_full_fsync() {
            self.sync_failed.store(true, Ordering::SeqCst);
        }
    }

    /// Records that flushing `path` failed.
    pub fn record_sync_failure(&self, path: &Path) {
        if self.wants_full_fsync() {
            self.failed_paths.lock().push(path.to_path_buf());
            self.sync_failed.store(true, Ordering::SeqCst);
        }
    }

    /// Returns true if a flush failure has been recorded.
    #[must_use]
    pub fn sync_failed(&self) -> bool {
        self.sync_failed.load(Ordering::SeqCst)
    }

    /// Returns the paths whose flush failed, in report order.
    #[must_use]
    pub fn failed_paths(&self) -> Vec<PathBuf> {
        self.failed_paths.lock().clone()
    }

    /// Writes `data` to `path` under this context's policy.
    ///
    /// See [`crate::writer::write_to_file`].
    pub fn write_file(&self, path: &Path, data: &[u8]) -> SaveResult<()> {
        crate::writer::write_with_context(Some(self), path, |w| {
            std::io::Write::write_all(w, data)
        })
    }
}

/// Returns true iff a transaction is registered on this thread and its
/// level is `Full`.
///
/// Writers that consult this and write files themselves must replace each
/// file (write a sibling, sync it, rename) rather than truncate it in place:
/// the backup hardlinks save files unless the transaction was opened with
/// `link_files(false)`. [`crate::write_to_file`] does this.
#[must_use]
pub fn wants_full_fsync() -> bool {
    current().is_some_and(|ctx| ctx.wants_full_fsync())
}

/// Records a flush failure against the transaction registered on this
/// thread. No-op without a transaction or under `MarkersOnly`.
pub fn notify_sync_failure() {
    if let Some(ctx) = current() {
        ctx.notify_sync_failure();
    }
}

/// Returns the context registered on this thread, if any.
#[must_use]
pub fn current() -> Option<Arc<DurabilityContext>> {
    CURRENT.with(|slot| slot.borrow().as_ref().and_then(Weak::upgrade))
}

/// Registration of a context on the current thread.
///
/// Dropping it clears the slot if it still points at the same context.
/// The slot belongs to the registering thread, so the registration must
/// never leave it.
#[derive(Debug)]
pub(crate) struct Registration {
    context: Weak<DurabilityContext>,
    _not_send: PhantomData<*const ()>,
}

impl Registration {
    /// Registers `context` on this thread.
    ///
    /// # Errors
    ///
    /// Returns `TransactionActive` if a live context is already registered.
    pub(crate) fn register(context: &Arc<DurabilityContext>) -> SaveResult<Self> {
        CURRENT.with(|slot| {
            let mut slot = slot.borrow_mut();
            if slot.as_ref().and_then(Weak::upgrade).is_some() {
                return Err(SaveError::TransactionActive);
            }
            let weak = Arc::downgrade(context);
            *slot = Some(weak.clone());
            Ok(Self {
                context: weak,
                _not_send: PhantomData,
            })
        })
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        // try_with: the thread-local may already be gone during thread teardown.
        let _ = CURRENT.try_with(|slot| {
            let mut slot = slot.borrow_mut();
            if slot
                .as_ref()
                .is_some_and(|current| Weak::ptr_eq(current, &self.context))
            {
                *slot = None;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_transaction_means_no_full_fsync() {
        assert!(!wants_full_fsync());
        assert!(current().is_none());
        notify_sync_failure();
    }

    #[test]
    fn markers_only_ignores_failures() {
        let ctx = DurabilityContext::new(FsyncLevel::MarkersOnly);
        ctx.notify_sync_failure();
        ctx.record_sync_failure(Path::new("a.sav"));

        assert!(!ctx.sync_failed());
        assert!(ctx.failed_paths().is_empty());
    }

    #[test]
    fn full_records_failures() {
        let ctx = DurabilityContext::new(FsyncLevel::Full);
        ctx.record_sync_failure(Path::new("a.sav"));

        assert!(ctx.sync_failed());
        assert_eq!(ctx.failed_paths(), vec![PathBuf::from("a.sav")]);
    }

    #[test]
    fn registration_is_scoped() {
        let ctx = Arc::new(DurabilityContext::new(FsyncLevel::Full));
        {
            let _reg = Registration::register(&ctx).unwrap();
            assert!(wants_full_fsync());
            notify_sync_failure();
        }
        assert!(ctx.sync_failed());
        assert!(!wants_full_fsync());
    }

    #[test]
    fn second_registration_is_refused() {
        let first = Arc::new(DurabilityContext::new(FsyncLevel::MarkersOnly));
        let second = Arc::new(DurabilityContext::new(FsyncLevel::Full));

        let _reg = Registration::register(&first).unwrap();
        assert!(matches!(
            Registration::register(&second),
            Err(SaveError::TransactionActive)
        ));
        assert!(!wants_full_fsync());
    }

    #[test]
    fn dead_context_does_not_block_registration() {
        let stale = Arc::new(DurabilityContext::new(FsyncLevel::Full));
        let reg = Registration::register(&stale).unwrap();
        drop(stale);
        assert!(current().is_none());

        let fresh = Arc::new(DurabilityContext::new(FsyncLevel::MarkersOnly));
        let _fresh_reg = Registration::register(&fresh).unwrap();
        // Dropping the stale registration must not clear the fresh one.
        drop(reg);
        assert!(current().is_some());
    }

    #[test]
    fn context_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DurabilityContext>();
        assert_send_sync::<Arc<DurabilityContext>>();
    }

    #[test]
    fn registration_is_per_thread() {
        let ctx = Arc::new(DurabilityContext::new(FsyncLevel::Full));
        let _reg = Registration::register(&ctx).unwrap();

        let seen = std::thread::spawn(wants_full_fsync).join().unwrap();
        assert!(!seen);
        assert!(wants_full_fsync());
    }
}
