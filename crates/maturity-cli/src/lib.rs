//! maturity-cli library root.
//!
//! Re-exports the command layer and config so integration tests can drive
//! them without spawning the binary.

pub mod cli;
pub mod commands;
pub mod config;
