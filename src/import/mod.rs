//! MusicBee CSV export decoding.
//!
//! The export is a header-driven delimited file. Headers are matched
//! case- and punctuation-insensitively ("<File path>" and "File Path"
//! both resolve to the same logical column), and all required columns
//! must be present before a single row is decoded. Per-field parsing is
//! forgiving: a malformed count or date degrades to zero/absent instead
//! of failing the row.

use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::debug;

use crate::dates::parse_import_date;
use crate::error::{Error, Result};

/// Logical columns the export must carry, in their MusicBee spellings.
const REQUIRED_HEADERS: [&str; 9] = [
    "<File path>",
    "<Filename>",
    "<Folder>",
    "Last Played",
    "Play Count",
    "Rating",
    "Love",
    "Skip Count",
    "Title",
];

/// Default number of records handed to the batch callback at once.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// One decoded row of listening history.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRecord {
    pub title: String,
    pub filename: String,
    pub file_path: String,
    pub play_count: i64,
    pub rating: i64,
    pub loved: bool,
    pub last_played: Option<DateTime<Utc>>,
    pub skip_count: i64,
}

impl ImportRecord {
    /// A row is worth processing iff it carries at least one signal.
    pub fn is_eligible(&self) -> bool {
        self.play_count > 0 || self.rating > 0 || self.last_played.is_some() || self.loved
    }
}

/// Normalize a header for matching: lowercase, alphanumerics only.
fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Resolved column indices for the fields we decode.
#[derive(Debug, Clone, Copy)]
struct Columns {
    title: usize,
    filename: usize,
    file_path: usize,
    play_count: usize,
    rating: usize,
    love: usize,
    last_played: usize,
    skip_count: usize,
}

impl Columns {
    /// Map the header row to column indices, failing on the first
    /// required column that is missing.
    fn resolve(headers: &StringRecord) -> Result<Self> {
        let normalized: Vec<String> = headers.iter().map(normalize_header).collect();
        let find = |logical: &str| -> Result<usize> {
            normalized
                .iter()
                .position(|h| h == &normalize_header(logical))
                .ok_or_else(|| Error::validation(format!("{logical} missing in your CSV headers")))
        };

        for header in REQUIRED_HEADERS {
            find(header)?;
        }

        Ok(Self {
            title: find("Title")?,
            filename: find("<Filename>")?,
            file_path: find("<File path>")?,
            play_count: find("Play Count")?,
            rating: find("Rating")?,
            love: find("Love")?,
            last_played: find("Last Played")?,
            skip_count: find("Skip Count")?,
        })
    }
}

/// Parse a non-negative integer field; anything else counts as zero.
fn parse_count(value: &str) -> i64 {
    value.trim().parse::<i64>().ok().filter(|n| *n >= 0).unwrap_or(0)
}

/// Parse a rating, re-scaling a 0-100 value down to the 0-5 scale and
/// clamping the result.
fn parse_rating(value: &str) -> i64 {
    let mut rating = value.trim().parse::<i64>().unwrap_or(0);
    if rating > 5 && rating <= 100 {
        rating = (rating as f64 / 20.0).round() as i64;
    }
    rating.clamp(0, 5)
}

/// MusicBee marks loved tracks with a non-blank cell.
fn parse_loved(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Streaming reader over the CSV export.
///
/// The file is read twice per run: once to count eligible rows for the
/// progress display, once to hand them out in batches.
pub struct CsvImporter {
    path: PathBuf,
    date_format: String,
}

impl CsvImporter {
    pub fn new(path: impl Into<PathBuf>, date_format: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            date_format: date_format.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<(csv::Reader<File>, Columns)> {
        let mut reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_path(&self.path)?;
        let columns = Columns::resolve(reader.headers()?)?;
        Ok((reader, columns))
    }

    fn decode(&self, row: &StringRecord, columns: &Columns) -> ImportRecord {
        let field = |idx: usize| row.get(idx).unwrap_or("");
        ImportRecord {
            title: field(columns.title).to_string(),
            filename: field(columns.filename).to_string(),
            file_path: field(columns.file_path).to_string(),
            play_count: parse_count(field(columns.play_count)),
            rating: parse_rating(field(columns.rating)),
            loved: parse_loved(field(columns.love)),
            last_played: parse_import_date(field(columns.last_played), &self.date_format),
            skip_count: parse_count(field(columns.skip_count)),
        }
    }

    /// First pass: count eligible rows without keeping any of them.
    pub fn count_eligible(&self) -> Result<u64> {
        let (mut reader, columns) = self.open()?;
        let mut count = 0u64;
        for row in reader.records() {
            if self.decode(&row?, &columns).is_eligible() {
                count += 1;
            }
        }
        debug!(count, "counted eligible rows");
        Ok(count)
    }

    /// Second pass: stream eligible rows to `handler` in batches of
    /// `batch_size`, flushing the final partial batch at EOF.
    pub async fn for_each_batch<F, Fut>(&self, batch_size: usize, mut handler: F) -> Result<u64>
    where
        F: FnMut(Vec<ImportRecord>) -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        let (mut reader, columns) = self.open()?;
        let mut batch = Vec::with_capacity(batch_size);
        let mut processed = 0u64;

        for row in reader.records() {
            let record = self.decode(&row?, &columns);
            if !record.is_eligible() {
                continue;
            }
            batch.push(record);
            if batch.len() >= batch_size {
                processed += batch.len() as u64;
                handler(std::mem::replace(&mut batch, Vec::with_capacity(batch_size))).await?;
            }
        }

        if !batch.is_empty() {
            processed += batch.len() as u64;
            handler(batch).await?;
        }

        Ok(processed)
    }
}
