//! File-level backup and restore of the database.
//!
//! The recovery unit for a failed run is the whole database file, not
//! row-level rollback: a timestamped copy is taken before any mutation
//! and copied back over the live file on failure or interrupt. SQLite
//! `-shm`/`-wal` sidecars are removed on restore so the restored file is
//! opened clean.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::info;

use crate::error::{Result, ResultExt};

/// Copy the live database aside into a `backups/` directory next to it.
/// Returns the backup path; the file is kept on success.
pub fn backup_db_file(db_path: &Path) -> Result<PathBuf> {
    let dir = db_path.parent().unwrap_or(Path::new(".")).join("backups");
    if !dir.exists() {
        fs::create_dir_all(&dir).with_context("creating backups directory")?;
    }

    let stamp = Utc::now().format("%Y-%m-%d_%H-%M-%S");
    let backup_path = dir.join(format!("navidrome_{stamp}_backup.db"));
    fs::copy(db_path, &backup_path).with_context("backing up database file")?;

    info!(backup = %backup_path.display(), "database backed up");
    println!("DB has been backed up to {}", backup_path.display());
    Ok(backup_path)
}

/// Copy the backup back over the live database file and drop any journal
/// sidecars left behind by the aborted connection.
pub fn restore_db_file(backup_path: &Path, db_path: &Path) -> Result<()> {
    fs::copy(backup_path, db_path).with_context("restoring database file")?;
    for ext in ["-shm", "-wal"] {
        let sidecar = PathBuf::from(format!("{}{ext}", db_path.display()));
        let _ = fs::remove_file(sidecar);
    }
    info!(db = %db_path.display(), "database restored from backup");
    Ok(())
}
