//! Sync orchestration: phases, batching, and the backup safety net.
//!
//! A run moves linearly through tracks, albums and artists; later phases
//! read aggregates that depend on earlier phases' writes, so phases never
//! overlap. Within a phase, per-record units run under a semaphore that
//! bounds how many store round-trips are in flight at once; completion
//! order inside a phase is not guaranteed.
//!
//! Failure handling is file-level, not row-level: the database file is
//! copied aside before the first write and copied back on any error or
//! interrupt, after which the error is re-raised unchanged.

pub mod backup;

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::config::SyncOptions;
use crate::dates::validate_date_format;
use crate::error::{Error, Result};
use crate::import::{CsvImporter, DEFAULT_BATCH_SIZE};
use crate::matcher::find_best_match;
use crate::model::{ItemType, User};
use crate::resolver::{resolve_aggregate, resolve_track};
use crate::store::Store;

/// Which phases a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Tracks, then albums, then artists.
    Full,
    /// Album aggregates only.
    Albums,
    /// Artist aggregates only.
    Artists,
}

impl SyncAction {
    fn label(self) -> &'static str {
        match self {
            SyncAction::Full => "full-sync",
            SyncAction::Albums => "albums-sync",
            SyncAction::Artists => "artists-sync",
        }
    }
}

/// Orchestrates one sync run against one database file.
pub struct Synchronizer {
    options: SyncOptions,
    csv_path: PathBuf,
    db_path: PathBuf,
}

impl Synchronizer {
    pub fn new(options: SyncOptions) -> Self {
        let csv_path = options.csv_path();
        let db_path = options.db_path();
        Self {
            options,
            csv_path,
            db_path,
        }
    }

    /// Run the given action to completion, restoring the database file
    /// from backup on any failure or interrupt.
    pub async fn run(&self, action: SyncAction) -> Result<()> {
        let started = Instant::now();

        self.preflight(action)?;

        let backup_path = backup::backup_db_file(&self.db_path)?;
        let restore_hook = arm_restore_hook(backup_path.clone(), self.db_path.clone());

        let result = self.execute(action).await;
        restore_hook.abort();

        match result {
            Ok(()) => {
                println!(
                    "{} completed successfully in {}",
                    action.label(),
                    format_elapsed(started.elapsed())
                );
                Ok(())
            }
            Err(e) => {
                eprintln!("An error occurred, restoring DB file...");
                match backup::restore_db_file(&backup_path, &self.db_path) {
                    Ok(()) => eprintln!(
                        "DB restored to its pre-run state from {}",
                        backup_path.display()
                    ),
                    Err(restore_err) => error!(
                        error = %restore_err,
                        backup = %backup_path.display(),
                        "restore failed, backup file kept"
                    ),
                }
                Err(e)
            }
        }
    }

    /// Pre-mutation validation. The date format is checked first so a bad
    /// configuration is rejected before any file I/O.
    fn preflight(&self, action: SyncAction) -> Result<()> {
        validate_date_format(&self.options.date_format)?;
        if self.options.concurrency == 0 {
            return Err(Error::config("concurrency must be at least 1"));
        }
        if action == SyncAction::Full && !self.csv_path.is_file() {
            return Err(Error::not_found(&self.csv_path));
        }
        if !self.db_path.is_file() {
            return Err(Error::not_found(&self.db_path));
        }
        Ok(())
    }

    async fn execute(&self, action: SyncAction) -> Result<()> {
        let store = Store::open(&self.db_path).await?;

        let result = match store.find_user(self.options.user.as_deref()).await {
            Ok(user) => {
                info!(user = %user.user_name, "target user resolved");
                self.run_phases(&store, &user, action).await
            }
            Err(e) => Err(e),
        };

        // The pool must be closed before any restore touches the file.
        store.close().await;
        result
    }

    async fn run_phases(&self, store: &Store, user: &User, action: SyncAction) -> Result<()> {
        match action {
            SyncAction::Full => {
                self.tracks_phase(store, user).await?;
                self.aggregate_phase(store, user, ItemType::Album).await?;
                self.aggregate_phase(store, user, ItemType::Artist).await?;
            }
            SyncAction::Albums => {
                self.aggregate_phase(store, user, ItemType::Album).await?;
            }
            SyncAction::Artists => {
                self.aggregate_phase(store, user, ItemType::Artist).await?;
            }
        }
        Ok(())
    }

    /// Stream the CSV in batches, matching and resolving each eligible
    /// row against the store under bounded concurrency.
    async fn tracks_phase(&self, store: &Store, user: &User) -> Result<()> {
        let importer = CsvImporter::new(&self.csv_path, &self.options.date_format);

        let total = importer.count_eligible()?;
        println!(
            "{} parsed successfully, {} potential tracks to be updated",
            self.csv_path.display(),
            total
        );
        println!("Processing tracks...");

        let progress = progress_bar(total, self.options.verbose);
        let semaphore = Semaphore::new(self.options.concurrency);
        let updated = AtomicU64::new(0);
        let not_found = AtomicU64::new(0);

        let resolve_options = self.options.resolve_options();
        let verbose = self.options.verbose;
        let show_not_found = self.options.show_not_found;
        let user_id = user.id.as_str();
        let semaphore = &semaphore;
        let progress = &progress;
        let updated = &updated;
        let not_found = &not_found;

        importer
            .for_each_batch(DEFAULT_BATCH_SIZE, |batch| async move {
                let units = batch.into_iter().map(|record| async move {
                    // Never closed while the phase is in flight.
                    let _permit = semaphore.acquire().await.expect("semaphore closed");
                    progress.inc(1);

                    let candidates = store
                        .find_track_candidates(user_id, &record.title, &record.filename)
                        .await?;
                    let Some(track) = find_best_match(&record, &candidates) else {
                        not_found.fetch_add(1, Ordering::Relaxed);
                        if verbose || show_not_found {
                            warn!(
                                path = %record.file_path,
                                filename = %record.filename,
                                "track not found"
                            );
                        }
                        return Ok(());
                    };

                    if verbose {
                        info!(path = %record.file_path, "processing track");
                    }

                    let update = resolve_track(&record, &track.annotation(), &resolve_options);
                    if update.is_empty() {
                        return Ok(());
                    }

                    store
                        .upsert_annotation(
                            ItemType::MediaFile,
                            user_id,
                            &track.id,
                            &update,
                            !track.has_annotation(),
                        )
                        .await?;
                    updated.fetch_add(1, Ordering::Relaxed);
                    Ok::<(), Error>(())
                });

                join_all(units)
                    .await
                    .into_iter()
                    .collect::<Result<Vec<()>>>()?;
                Ok(())
            })
            .await?;

        progress.finish_and_clear();
        println!("{} tracks updated", updated.load(Ordering::Relaxed));

        let not_found = not_found.load(Ordering::Relaxed);
        if not_found > 0 {
            warn!(count = not_found, "tracks not found");
        }
        Ok(())
    }

    /// Pull the per-parent rollups and resolve each one. Albums and
    /// artists share this path; only the stats query differs.
    async fn aggregate_phase(&self, store: &Store, user: &User, kind: ItemType) -> Result<u64> {
        let noun = if kind == ItemType::Album { "albums" } else { "artists" };
        println!("Processing {noun}...");

        let rows = match kind {
            ItemType::Album => store.album_stats(&user.id, None).await?,
            _ => store.artist_stats(&user.id, None).await?,
        };

        if rows.is_empty() {
            println!("0 {noun} updated");
            return Ok(0);
        }

        let progress = progress_bar(rows.len() as u64, self.options.verbose);
        let semaphore = Semaphore::new(self.options.concurrency);
        let updated = AtomicU64::new(0);
        let verbose = self.options.verbose;
        let user_id = user.id.as_str();

        let progress = &progress;
        let semaphore = &semaphore;
        let updated = &updated;

        let units = rows.iter().map(|row| async move {
            let _permit = semaphore.acquire().await.expect("semaphore closed");
            progress.inc(1);

            let update = resolve_aggregate(&row.stats(), &row.annotation(), kind);
            if update.is_empty() {
                return Ok(());
            }

            store
                .upsert_annotation(kind, user_id, &row.item_id, &update, !row.has_annotation())
                .await?;
            updated.fetch_add(1, Ordering::Relaxed);
            if verbose {
                info!(item_type = %kind, name = %row.name, "annotation updated");
            }
            Ok::<(), Error>(())
        });

        join_all(units)
            .await
            .into_iter()
            .collect::<Result<Vec<()>>>()?;

        progress.finish_and_clear();
        let updated = updated.load(Ordering::Relaxed);
        println!("{updated} {noun} updated");
        Ok(updated)
    }
}

/// Restore-from-backup on SIGINT/SIGTERM, armed for the lifetime of a
/// run. Interrupts are treated exactly like any other failure.
fn arm_restore_hook(backup_path: PathBuf, db_path: PathBuf) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_interrupt().await;
        eprintln!("Interrupted, restoring DB file...");
        if let Err(e) = backup::restore_db_file(&backup_path, &db_path) {
            error!(error = %e, "restore on interrupt failed");
        }
        std::process::exit(130);
    })
}

async fn wait_for_interrupt() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Progress bar for a phase; hidden in verbose mode where per-record
/// logging replaces it.
fn progress_bar(len: u64, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}, ETA: {eta})")
            .expect("static template")
            .progress_chars("=> "),
    );
    pb
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs < 60.0 {
        format!("{secs:.1}s")
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}
