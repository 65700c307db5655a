//! # ShadowSave Testkit
//!
//! Test utilities for ShadowSave.
//!
//! This crate provides:
//! - Save directory fixtures and tree snapshots
//! - Crash simulation at every step of a save transaction
//! - Property-based generators for save trees and save operations
//!
//! ## Usage
//!
//! ```rust
//! use shadowsave_testkit::prelude::*;
//!
//! let dir = TestSaveDir::populated();
//! let before = dir.snapshot();
//!
//! simulate_crash(dir.path(), CrashPoint::DuringSave, &[("world.sav", b"half")]);
//! shadowsave_core::recover_if_needed(dir.path());
//!
//! assert_eq!(dir.snapshot(), before);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;
