//! Date parsing, formatting and comparison helpers.
//!
//! All timestamps are normalized to UTC as soon as they enter the system:
//! CSV dates parse under a configurable strftime format, database dates
//! under the handful of shapes Navidrome has written over the years.
//! Comparison follows one rule everywhere: a present date beats an absent
//! one, an absent date never wins, and equal instants never win.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::{Error, Result};

/// Default format for the MusicBee CSV export's date columns.
pub const DEFAULT_DATE_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Storage format used by the annotation table.
const DB_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Returns true iff `left` is strictly after `right`.
///
/// An absent `left` never wins; a present `left` always beats an absent
/// `right`; equal instants do not win.
pub fn is_date_after(left: Option<DateTime<Utc>>, right: Option<DateTime<Utc>>) -> bool {
    match (left, right) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(l), Some(r)) => l > r,
    }
}

/// Validate a user-supplied strftime format by round-tripping the current
/// time through it: format, then parse the result back. A format that
/// cannot reproduce a valid date is rejected before any file I/O happens.
pub fn validate_date_format(format: &str) -> Result<()> {
    let items: Vec<Item> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(Error::config(format!(
            "invalid datetime format: {format}. Use chrono strftime specifiers"
        )));
    }

    let rendered = Utc::now().format(format).to_string();
    if parse_import_date(&rendered, format).is_none() {
        return Err(Error::config(format!(
            "datetime format {format} does not round-trip (rendered {rendered})"
        )));
    }
    Ok(())
}

/// Parse a date field from the CSV export.
///
/// Tries the configured format as a full datetime first, then as a bare
/// date (midnight). Unparseable or blank values become `None`, never an
/// error: a bad date in one row must not abort the run.
pub fn parse_import_date(value: &str, format: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
        return Some(dt.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, format) {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

/// Parse a datetime column read back from the Navidrome database.
///
/// Navidrome has stored RFC 3339 strings and plain `YYYY-MM-DD HH:MM:SS`
/// (with or without fractional seconds) across versions.
pub fn parse_db_date(value: Option<&str>) -> Option<DateTime<Utc>> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(dt.and_utc());
    }
    None
}

/// Format a timestamp the way the annotation table stores it.
pub fn format_db_date(date: DateTime<Utc>) -> String {
    date.format(DB_DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_is_date_after_ordering() {
        let earlier = Some(utc(2025, 1, 10, 9, 0, 0));
        let later = Some(utc(2025, 1, 15, 10, 30, 0));
        assert!(is_date_after(later, earlier));
        assert!(!is_date_after(earlier, later));
    }

    #[test]
    fn test_is_date_after_equal_never_wins() {
        let date = Some(utc(2025, 1, 10, 9, 0, 0));
        assert!(!is_date_after(date, date));
    }

    #[test]
    fn test_is_date_after_absent_handling() {
        let date = Some(utc(2025, 1, 15, 10, 30, 0));
        assert!(!is_date_after(None, date));
        assert!(is_date_after(date, None));
        assert!(!is_date_after(None, None));
    }

    #[test]
    fn test_parse_import_date_default_format() {
        let parsed = parse_import_date("15/01/2025 10:30", DEFAULT_DATE_FORMAT);
        assert_eq!(parsed, Some(utc(2025, 1, 15, 10, 30, 0)));
    }

    #[test]
    fn test_parse_import_date_date_only_format() {
        let parsed = parse_import_date("15/01/2025", "%d/%m/%Y");
        assert_eq!(parsed, Some(utc(2025, 1, 15, 0, 0, 0)));
    }

    #[test]
    fn test_parse_import_date_garbage_is_none() {
        assert_eq!(parse_import_date("not a date", DEFAULT_DATE_FORMAT), None);
        assert_eq!(parse_import_date("", DEFAULT_DATE_FORMAT), None);
        assert_eq!(parse_import_date("   ", DEFAULT_DATE_FORMAT), None);
    }

    #[test]
    fn test_parse_db_date_variants() {
        assert_eq!(
            parse_db_date(Some("2025-01-15 10:30:00")),
            Some(utc(2025, 1, 15, 10, 30, 0))
        );
        assert_eq!(
            parse_db_date(Some("2025-01-15T10:30:00Z")),
            Some(utc(2025, 1, 15, 10, 30, 0))
        );
        assert!(parse_db_date(Some("2025-01-15 10:30:00.123")).is_some());
        assert_eq!(parse_db_date(None), None);
        assert_eq!(parse_db_date(Some("")), None);
    }

    #[test]
    fn test_db_date_round_trip() {
        let date = utc(2024, 12, 31, 23, 59, 59);
        assert_eq!(parse_db_date(Some(&format_db_date(date))), Some(date));
    }

    #[test]
    fn test_validate_date_format_accepts_default() {
        assert!(validate_date_format(DEFAULT_DATE_FORMAT).is_ok());
        assert!(validate_date_format("%Y-%m-%d %H:%M:%S").is_ok());
    }

    #[test]
    fn test_validate_date_format_rejects_bad_specifier() {
        assert!(validate_date_format("%Q-nope").is_err());
    }

    #[test]
    fn test_validate_date_format_rejects_non_round_tripping() {
        // Renders fine but carries no date information to parse back.
        assert!(validate_date_format("%H:%M").is_err());
    }
}
