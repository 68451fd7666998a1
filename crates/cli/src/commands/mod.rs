//! Subcommand implementations.
//!
//! Each command takes already-built clients so that it can be driven by a
//! scripted transport in tests.

pub mod check;
pub mod relay;
pub mod sftp;
