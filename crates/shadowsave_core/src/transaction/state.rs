//! Transaction state.

/// State of a save transaction.
///
/// ```text
/// open ──► Ready ──commit()──► Committed
///   │        │
///   │        └──drop / rollback()──► Aborted
///   └──► (error: no backup, nothing touched)
/// ```
///
/// `Committed` and `Aborted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// The backup exists; the caller may write save files.
    Ready,
    /// The commit marker is durable and the backup has been discarded.
    Committed,
    /// The live directory was rolled back to the backup.
    Aborted,
}

impl TransactionState {
    /// Returns true if no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Ready)
    }
}
