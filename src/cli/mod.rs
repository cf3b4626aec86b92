//! Command-line interface for ndsync.
//!
//! This module provides the sync subcommands: full-sync, albums-sync and
//! artists-sync.

mod commands;

pub use commands::{Cli, Commands, run_command};
