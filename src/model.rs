//! Core data model shared across modules.
//!
//! These types mirror the Navidrome schema rows we read (users, candidate
//! tracks, aggregate rollups) plus the in-memory [`Annotation`] view used
//! by conflict resolution. Navidrome keys everything by string UUIDs.

use chrono::{DateTime, Utc};

use crate::dates::parse_db_date;

/// The polymorphic annotation target kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemType {
    MediaFile,
    Album,
    Artist,
}

impl ItemType {
    /// Value stored in the annotation table's `item_type` column.
    pub fn as_str(self) -> &'static str {
        match self {
            ItemType::MediaFile => "media_file",
            ItemType::Album => "album",
            ItemType::Artist => "artist",
        }
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A Navidrome user row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub user_name: String,
}

/// Per-user, per-item listening annotation.
///
/// Missing database rows materialize as the all-zero default; the resolver
/// only ever sees a complete value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotation {
    pub play_count: i64,
    pub rating: i64,
    pub starred: bool,
    pub play_date: Option<DateTime<Utc>>,
    pub starred_at: Option<DateTime<Utc>>,
}

/// A candidate track returned by the title + filename lookup, carrying the
/// target user's media_file annotation columns from the LEFT JOIN.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TrackMatch {
    pub id: String,
    pub path: String,
    pub title: String,
    pub album_id: Option<String>,
    pub artist_id: Option<String>,
    pub annotation_play_count: Option<i64>,
    pub annotation_play_date: Option<String>,
    pub annotation_rating: Option<i64>,
    pub annotation_starred: Option<bool>,
    pub annotation_starred_at: Option<String>,
}

impl TrackMatch {
    /// Whether an annotation row already exists for this track and user.
    pub fn has_annotation(&self) -> bool {
        self.annotation_play_count.is_some() || self.annotation_rating.is_some()
    }

    /// The track's annotation, zero-filled when none exists yet.
    pub fn annotation(&self) -> Annotation {
        Annotation {
            play_count: self.annotation_play_count.unwrap_or(0),
            rating: self.annotation_rating.unwrap_or(0),
            starred: self.annotation_starred.unwrap_or(false),
            play_date: parse_db_date(self.annotation_play_date.as_deref()),
            starred_at: parse_db_date(self.annotation_starred_at.as_deref()),
        }
    }
}

/// One album or artist rollup row from the aggregate queries: child track
/// totals alongside the parent's own existing annotation columns.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AggregateRow {
    pub item_id: String,
    pub name: String,
    pub total_tracks: i64,
    pub total_tracks_play_count: Option<i64>,
    pub tracks_rated_count: Option<i64>,
    pub tracks_rating_sum: Option<i64>,
    pub tracks_last_played: Option<String>,
    pub parent_play_count: Option<i64>,
    pub parent_rating: Option<i64>,
    pub parent_last_played: Option<String>,
}

impl AggregateRow {
    /// Whether the parent entity already has an annotation row.
    pub fn has_annotation(&self) -> bool {
        self.parent_play_count.is_some() || self.parent_rating.is_some()
    }

    /// Child-track rollup, with SQL NULL sums collapsed to zero.
    pub fn stats(&self) -> AggregateStats {
        AggregateStats {
            total_tracks: self.total_tracks,
            play_count_sum: self.total_tracks_play_count.unwrap_or(0),
            rated_count: self.tracks_rated_count.unwrap_or(0),
            rating_sum: self.tracks_rating_sum.unwrap_or(0),
            last_played: parse_db_date(self.tracks_last_played.as_deref()),
        }
    }

    /// The parent's annotation, zero-filled when none exists yet.
    pub fn annotation(&self) -> Annotation {
        Annotation {
            play_count: self.parent_play_count.unwrap_or(0),
            rating: self.parent_rating.unwrap_or(0),
            starred: false,
            play_date: parse_db_date(self.parent_last_played.as_deref()),
            starred_at: None,
        }
    }
}

/// Per-parent rollup of child track annotations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateStats {
    pub total_tracks: i64,
    pub play_count_sum: i64,
    pub rated_count: i64,
    pub rating_sum: i64,
    pub last_played: Option<DateTime<Utc>>,
}
