//! CLI command implementations.

pub mod log;
pub mod show;
pub mod verify;
