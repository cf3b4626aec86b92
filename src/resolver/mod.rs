//! Conflict resolution between imported history and stored annotations.
//!
//! Everything here is pure: given an imported row (or an aggregate rollup)
//! and the existing annotation, compute the minimal field-level update.
//! An empty update means the caller skips the write entirely. Persistence
//! lives in [`crate::store`].
//!
//! Play counts and ratings only ever ratchet upward; the two documented
//! exceptions are first-run mode (imported counts are added to existing
//! ones) and the explicit rating-downgrade option.

use chrono::{DateTime, Utc};

use crate::dates::is_date_after;
use crate::import::ImportRecord;
use crate::model::{AggregateStats, Annotation, ItemType};

/// A partial annotation update. `None` fields are left untouched.
///
/// `starred_at` is doubly optional: staging it with an inner `None` writes
/// SQL NULL (the CSV export carries no dedicated "loved since" timestamp).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationUpdate {
    pub play_count: Option<i64>,
    pub rating: Option<i64>,
    pub starred: Option<bool>,
    pub starred_at: Option<Option<DateTime<Utc>>>,
    pub play_date: Option<DateTime<Utc>>,
}

impl AnnotationUpdate {
    /// True when no field is staged and the write should be skipped.
    pub fn is_empty(&self) -> bool {
        self.play_count.is_none()
            && self.rating.is_none()
            && self.starred.is_none()
            && self.starred_at.is_none()
            && self.play_date.is_none()
    }
}

/// Policy switches consumed by [`resolve_track`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    /// Treat imported play counts as additive history rather than a
    /// replacement snapshot.
    pub first_run: bool,
    /// Allow a differing import rating to overwrite a higher stored one.
    pub allow_rating_downgrade: bool,
}

/// Resolve one imported row against the matched track's annotation.
pub fn resolve_track(
    record: &ImportRecord,
    existing: &Annotation,
    opts: &ResolveOptions,
) -> AnnotationUpdate {
    let mut update = AnnotationUpdate::default();

    if opts.allow_rating_downgrade {
        if record.rating > 0 && record.rating != existing.rating {
            update.rating = Some(record.rating);
        }
    } else if record.rating > existing.rating {
        update.rating = Some(record.rating);
    }

    if record.loved && !existing.starred {
        update.starred = Some(true);
        update.starred_at = Some(record.last_played);
    }

    if record.play_count != existing.play_count {
        if record.play_count > existing.play_count {
            update.play_count = Some(record.play_count);
        }
        // First-run mode wins over the snapshot branch above.
        if opts.first_run && record.play_count > 0 {
            update.play_count = Some(existing.play_count + record.play_count);
        }
    }

    if is_date_after(record.last_played, existing.play_date) {
        update.play_date = record.last_played;
        // A bare last-played signal with no countable plays anywhere is
        // treated as one inferred play.
        if existing.play_count == 0
            && update.play_count.is_none()
            && record.skip_count == 0
            && record.play_count == 0
        {
            update.play_count = Some(1);
        }
    }

    update
}

/// Resolve an album or artist annotation from its child-track rollup.
///
/// The album and artist phases share this shape; the only difference is
/// the single-track guard, which stops a lone track from minting a
/// degenerate one-sample artist rating.
pub fn resolve_aggregate(
    stats: &AggregateStats,
    existing: &Annotation,
    kind: ItemType,
) -> AnnotationUpdate {
    let mut update = AnnotationUpdate::default();

    if stats.play_count_sum > existing.play_count {
        update.play_count = Some(stats.play_count_sum);
    }

    let majority = stats.rated_count * 2 > stats.total_tracks;
    let enough_tracks = kind != ItemType::Artist || stats.total_tracks > 1;
    if majority && enough_tracks {
        let computed = (stats.rating_sum as f64 / stats.rated_count as f64).round() as i64;
        let computed = computed.clamp(0, 5);
        if computed > existing.rating {
            update.rating = Some(computed);
        }
    }

    if is_date_after(stats.last_played, existing.play_date) {
        update.play_date = stats.last_played;
    }

    update
}
