//! Save transactions with all-or-nothing semantics.
//!
//! A [`Transaction`] wraps one save operation:
//! - **Atomicity**: either every file written during the transaction is kept,
//!   or the directory is rolled back to the state captured at open
//! - **Durability**: after `commit()` returns `true`, the live directory alone
//!   is a complete, valid save
//! - **Crash safety**: a process killed at any point leaves a state that
//!   [`crate::recover_if_needed`] resolves deterministically

mod guard;
mod state;

pub use guard::Transaction;
pub use state::TransactionState;
