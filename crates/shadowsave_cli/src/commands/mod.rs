//! CLI command implementations.

pub mod recover;
pub mod status;
