//! CLI command definitions and handlers.
//!
//! Each subcommand maps onto a [`SyncAction`] plus a [`SyncOptions`]; the
//! actual work runs on a tokio runtime via `block_on`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::runtime::Runtime;

use crate::config::{DEFAULT_CONCURRENCY, DEFAULT_CSV_FILE, DEFAULT_DB_FILE, SyncOptions};
use crate::dates::DEFAULT_DATE_FORMAT;
use crate::sync::{SyncAction, Synchronizer};

/// ndsync CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Sync play counts, ratings, loved tracks and last-played dates from
    /// the MusicBee CSV export, then recompute album and artist aggregates
    FullSync {
        /// Navidrome username (by default the first user is used)
        #[arg(short, long)]
        user: Option<String>,
        /// First run: add MusicBee play counts to Navidrome play counts
        #[arg(short, long)]
        first: bool,
        /// Per-record logging instead of a progress bar
        #[arg(short, long)]
        verbose: bool,
        /// Log every imported row with no matching stored track
        #[arg(long)]
        show_not_found: bool,
        /// Let a differing imported rating overwrite a higher stored one
        #[arg(long)]
        allow_rating_downgrade: bool,
        /// MusicBee CSV export path
        #[arg(long, default_value = DEFAULT_CSV_FILE)]
        csv: PathBuf,
        /// Navidrome SQLite database path
        #[arg(long, default_value = DEFAULT_DB_FILE)]
        db: PathBuf,
        /// strftime format for the CSV's date columns
        #[arg(long, default_value = DEFAULT_DATE_FORMAT)]
        date_format: String,
        /// Maximum in-flight record updates within a phase
        #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,
    },
    /// Update album play counts and ratings from existing track annotations
    AlbumsSync {
        /// Navidrome username (by default the first user is used)
        #[arg(short, long)]
        user: Option<String>,
        /// Per-record logging instead of a progress bar
        #[arg(short, long)]
        verbose: bool,
        /// Navidrome SQLite database path
        #[arg(long, default_value = DEFAULT_DB_FILE)]
        db: PathBuf,
        /// Maximum in-flight record updates within a phase
        #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,
    },
    /// Update artist play counts and ratings from existing track annotations
    ArtistsSync {
        /// Navidrome username (by default the first user is used)
        #[arg(short, long)]
        user: Option<String>,
        /// Per-record logging instead of a progress bar
        #[arg(short, long)]
        verbose: bool,
        /// Navidrome SQLite database path
        #[arg(long, default_value = DEFAULT_DB_FILE)]
        db: PathBuf,
        /// Maximum in-flight record updates within a phase
        #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,
    },
}

/// Run the parsed CLI command to completion.
pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let rt = Runtime::new()?;

    let (action, options) = match cli.command {
        Commands::FullSync {
            user,
            first,
            verbose,
            show_not_found,
            allow_rating_downgrade,
            csv,
            db,
            date_format,
            concurrency,
        } => (
            SyncAction::Full,
            SyncOptions {
                user,
                first_run: first,
                verbose,
                show_not_found,
                allow_rating_downgrade,
                date_format,
                csv: Some(csv),
                db: Some(db),
                concurrency,
            },
        ),
        Commands::AlbumsSync {
            user,
            verbose,
            db,
            concurrency,
        } => (
            SyncAction::Albums,
            SyncOptions {
                user,
                verbose,
                db: Some(db),
                concurrency,
                ..SyncOptions::default()
            },
        ),
        Commands::ArtistsSync {
            user,
            verbose,
            db,
            concurrency,
        } => (
            SyncAction::Artists,
            SyncOptions {
                user,
                verbose,
                db: Some(db),
                concurrency,
                ..SyncOptions::default()
            },
        ),
    };

    let synchronizer = Synchronizer::new(options);
    rt.block_on(synchronizer.run(action))?;
    Ok(())
}
