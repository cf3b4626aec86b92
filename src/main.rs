//! ndsync - MusicBee to Navidrome listening-history sync.
//!
//! Reconciles play counts, ratings, loved flags and last-played dates
//! exported from MusicBee (CSV) into a Navidrome SQLite database, and
//! recomputes album and artist aggregates from per-track annotations.

pub mod cli;
pub mod config;
pub mod dates;
pub mod error;
pub mod import;
pub mod matcher;
pub mod model;
pub mod resolver;
pub mod store;
pub mod sync;
#[cfg(test)]
pub mod test_utils;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env().add_directive("ndsync=info".parse().unwrap()))
        .init();

    cli::run_command(args)
}
