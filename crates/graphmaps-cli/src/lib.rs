//! GraphMaps CLI library.
//!
//! Command handlers and the on-disk workspace they share. `main.rs` only
//! parses arguments and dispatches here.

pub mod commands;
pub mod workspace;

pub use workspace::Workspace;
