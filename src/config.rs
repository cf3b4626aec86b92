//! Runtime options for a sync run.
//!
//! Everything here is supplied by the CLI layer; there is no config file.
//! Validation happens before any backup or database mutation.

use std::path::{Path, PathBuf};

use crate::dates::DEFAULT_DATE_FORMAT;
use crate::resolver::ResolveOptions;

/// Default CSV export filename, looked up in the working directory.
pub const DEFAULT_CSV_FILE: &str = "MusicBee_Export.csv";

/// Default Navidrome database filename, looked up in the working directory.
pub const DEFAULT_DB_FILE: &str = "navidrome.db";

/// Default number of in-flight per-record units. SQLite is single-writer,
/// so higher values mostly add contention.
pub const DEFAULT_CONCURRENCY: usize = 20;

/// Options for one sync run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Target Navidrome username; the first user when unset.
    pub user: Option<String>,
    /// Add imported play counts to existing ones instead of replacing.
    pub first_run: bool,
    /// Per-record logging instead of a progress bar.
    pub verbose: bool,
    /// Log every imported row with no matching stored track.
    pub show_not_found: bool,
    /// Allow a differing import rating to overwrite a higher stored one.
    pub allow_rating_downgrade: bool,
    /// strftime format for the CSV's date columns.
    pub date_format: String,
    /// Path to the CSV export; [`DEFAULT_CSV_FILE`] when unset.
    pub csv: Option<PathBuf>,
    /// Path to the Navidrome database; [`DEFAULT_DB_FILE`] when unset.
    pub db: Option<PathBuf>,
    /// Maximum in-flight per-record units within a phase.
    pub concurrency: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            user: None,
            first_run: false,
            verbose: false,
            show_not_found: false,
            allow_rating_downgrade: false,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            csv: None,
            db: None,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl SyncOptions {
    /// Effective CSV path.
    pub fn csv_path(&self) -> PathBuf {
        self.csv
            .clone()
            .unwrap_or_else(|| Path::new(DEFAULT_CSV_FILE).to_path_buf())
    }

    /// Effective database path.
    pub fn db_path(&self) -> PathBuf {
        self.db
            .clone()
            .unwrap_or_else(|| Path::new(DEFAULT_DB_FILE).to_path_buf())
    }

    /// Policy switches consumed by the resolver.
    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            first_run: self.first_run,
            allow_rating_downgrade: self.allow_rating_downgrade,
        }
    }
}
