//! Navidrome database access.
//!
//! Uses SQLx with SQLite against an existing Navidrome database file; the
//! store never creates or migrates one. Navidrome's schema has shifted
//! over the years in two ways that matter here, so [`Store::open`] probes
//! once for:
//!
//! - the annotation key shape: old databases carry a surrogate `ann_id`
//!   column, new ones key purely on (user_id, item_id, item_type);
//! - the artist linkage: post-BFR databases (>= 0.55.0) join tracks to
//!   artists through the `media_file_artists` junction table instead of
//!   the direct `media_file.artist_id` column.
//!
//! The probed [`SchemaInfo`] drives query construction from then on.

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::dates::format_db_date;
use crate::error::{Error, Result};
use crate::model::{AggregateRow, ItemType, TrackMatch, User};
use crate::resolver::AnnotationUpdate;

/// Which of the historical Navidrome schema shapes this database uses.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaInfo {
    /// Annotation table carries the legacy `ann_id` surrogate key.
    pub legacy_annotation_id: bool,
    /// Artists are linked through the `media_file_artists` junction table.
    pub artist_junction: bool,
}

/// Handle over the Navidrome SQLite database.
pub struct Store {
    pool: SqlitePool,
    schema: SchemaInfo,
}

/// A value bound into a dynamically built statement.
enum Bound {
    Int(i64),
    Text(String),
    Null,
}

impl Store {
    /// Open an existing Navidrome database and probe its schema shape.
    ///
    /// WAL is deliberately avoided: the journal file is not necessarily
    /// removed on close, and backup/restore works on the single DB file.
    pub async fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::not_found(path));
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(false)
            .journal_mode(SqliteJournalMode::Delete)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("temp_store", "MEMORY")
            .pragma("cache_size", "-100000");

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let schema = probe_schema(&pool).await?;
        info!(
            legacy_annotation_id = schema.legacy_annotation_id,
            artist_junction = schema.artist_junction,
            "database opened"
        );

        Ok(Self { pool, schema })
    }

    pub fn schema(&self) -> SchemaInfo {
        self.schema
    }

    /// Close the underlying pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Resolve the target user: by exact username when given, otherwise
    /// the first user in the database.
    pub async fn find_user(&self, username: Option<&str>) -> Result<User> {
        let user: Option<User> = match username {
            Some(name) => {
                sqlx::query_as("SELECT id, user_name FROM user WHERE user_name = ?")
                    .bind(name)
                    .fetch_optional(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as("SELECT id, user_name FROM user LIMIT 1")
                    .fetch_optional(&self.pool)
                    .await?
            }
        };

        user.ok_or_else(|| {
            Error::validation(format!("user {} not found", username.unwrap_or_default()))
        })
    }

    /// Candidate tracks for an imported row: exact title match plus a
    /// filename-suffix match on the path, joined with the user's existing
    /// media_file annotation.
    pub async fn find_track_candidates(
        &self,
        user_id: &str,
        title: &str,
        filename: &str,
    ) -> Result<Vec<TrackMatch>> {
        let rows = sqlx::query_as::<_, TrackMatch>(
            r#"
            SELECT
                mf.id,
                mf.path,
                mf.title,
                mf.album_id,
                mf.artist_id,
                a.play_count AS annotation_play_count,
                a.play_date AS annotation_play_date,
                a.rating AS annotation_rating,
                a.starred AS annotation_starred,
                a.starred_at AS annotation_starred_at
            FROM media_file mf
            LEFT JOIN annotation a ON (
                a.item_id = mf.id
                AND a.item_type = 'media_file'
                AND a.user_id = ?
            )
            WHERE mf.title = ?
            AND mf.path LIKE ?
            "#,
        )
        .bind(user_id)
        .bind(title)
        .bind(format!("%{filename}"))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Album rollups: per-album child-track totals next to the album's own
    /// annotation. Albums with no signal at all are filtered out in SQL.
    pub async fn album_stats(
        &self,
        user_id: &str,
        album_ids: Option<&[String]>,
    ) -> Result<Vec<AggregateRow>> {
        let mut sql = String::from(
            r#"
            SELECT
                a.id AS item_id,
                a.name AS name,
                COUNT(mf.id) AS total_tracks,
                SUM(COALESCE(ta.play_count, 0)) AS total_tracks_play_count,
                SUM(CASE WHEN ta.rating IS NULL OR ta.rating = 0 THEN 0 ELSE 1 END) AS tracks_rated_count,
                SUM(COALESCE(ta.rating, 0)) AS tracks_rating_sum,
                MAX(ta.play_date) AS tracks_last_played,
                MAX(aa.play_count) AS parent_play_count,
                MAX(aa.rating) AS parent_rating,
                MAX(aa.play_date) AS parent_last_played
            FROM album a
            INNER JOIN media_file mf ON mf.album_id = a.id
            LEFT JOIN annotation ta ON (
                ta.item_id = mf.id
                AND ta.item_type = 'media_file'
                AND ta.user_id = ?
            )
            LEFT JOIN annotation aa ON (
                aa.item_id = a.id
                AND aa.item_type = 'album'
                AND aa.user_id = ?
            )
            WHERE 1=1
            "#,
        );
        push_id_filter(&mut sql, "a.id", album_ids);
        sql.push_str(
            r#"
            GROUP BY a.id, a.name
            HAVING total_tracks_play_count > 0 OR tracks_rated_count > 0 OR tracks_last_played IS NOT NULL
            "#,
        );

        let mut query = sqlx::query_as::<_, AggregateRow>(&sql)
            .bind(user_id)
            .bind(user_id);
        for id in album_ids.unwrap_or_default() {
            query = query.bind(id);
        }
        Ok(query.fetch_all(&self.pool).await?)
    }

    /// Artist rollups, shaped like [`Store::album_stats`]. The join path
    /// to child tracks follows the probed linkage shape.
    pub async fn artist_stats(
        &self,
        user_id: &str,
        artist_ids: Option<&[String]>,
    ) -> Result<Vec<AggregateRow>> {
        let (join_clause, count_column, annotation_join) = if self.schema.artist_junction {
            (
                "INNER JOIN media_file_artists mfa ON (mfa.artist_id = ar.id AND mfa.role = 'artist')",
                "COUNT(mfa.media_file_id) AS total_tracks",
                r#"LEFT JOIN annotation ta ON (
                    ta.item_id = mfa.media_file_id
                    AND ta.item_type = 'media_file'
                    AND ta.user_id = ?
                )"#,
            )
        } else {
            (
                "INNER JOIN media_file mf ON mf.artist_id = ar.id",
                "COUNT(mf.id) AS total_tracks",
                r#"LEFT JOIN annotation ta ON (
                    ta.item_id = mf.id
                    AND ta.item_type = 'media_file'
                    AND ta.user_id = ?
                )"#,
            )
        };

        let mut sql = format!(
            r#"
            SELECT
                ar.id AS item_id,
                ar.name AS name,
                {count_column},
                SUM(COALESCE(ta.play_count, 0)) AS total_tracks_play_count,
                SUM(CASE WHEN ta.rating IS NULL OR ta.rating = 0 THEN 0 ELSE 1 END) AS tracks_rated_count,
                SUM(COALESCE(ta.rating, 0)) AS tracks_rating_sum,
                MAX(ta.play_date) AS tracks_last_played,
                MAX(aa.play_count) AS parent_play_count,
                MAX(aa.rating) AS parent_rating,
                MAX(aa.play_date) AS parent_last_played
            FROM artist ar
            {join_clause}
            {annotation_join}
            LEFT JOIN annotation aa ON (
                aa.item_id = ar.id
                AND aa.item_type = 'artist'
                AND aa.user_id = ?
            )
            WHERE 1=1
            "#,
        );
        push_id_filter(&mut sql, "ar.id", artist_ids);
        sql.push_str(
            r#"
            GROUP BY ar.id, ar.name
            HAVING total_tracks_play_count > 0 OR tracks_rated_count > 0 OR tracks_last_played IS NOT NULL
            "#,
        );

        let mut query = sqlx::query_as::<_, AggregateRow>(&sql)
            .bind(user_id)
            .bind(user_id);
        for id in artist_ids.unwrap_or_default() {
            query = query.bind(id);
        }
        Ok(query.fetch_all(&self.pool).await?)
    }

    /// Create or mutate an annotation row from a partial update.
    ///
    /// Creation fills unset fields with zero/NULL defaults and, on the
    /// legacy shape, mints a fresh `ann_id`. Updates touch only the staged
    /// fields, keyed on the composite (item_type, user_id, item_id).
    pub async fn upsert_annotation(
        &self,
        item_type: ItemType,
        user_id: &str,
        item_id: &str,
        update: &AnnotationUpdate,
        needs_create: bool,
    ) -> Result<()> {
        let staged = staged_fields(update);
        debug!(item_type = %item_type, item_id, needs_create, fields = staged.len(), "upserting annotation");

        if needs_create {
            let mut fields: Vec<(&str, Bound)> = vec![
                ("item_type", Bound::Text(item_type.as_str().to_string())),
                ("user_id", Bound::Text(user_id.to_string())),
                ("item_id", Bound::Text(item_id.to_string())),
                ("play_count", Bound::Int(0)),
                ("rating", Bound::Int(0)),
                ("starred", Bound::Int(0)),
                ("play_date", Bound::Null),
                ("starred_at", Bound::Null),
            ];
            for (column, value) in staged {
                if let Some(slot) = fields.iter_mut().find(|(c, _)| *c == column) {
                    slot.1 = value;
                }
            }
            if self.schema.legacy_annotation_id {
                fields.push(("ann_id", Bound::Text(Uuid::new_v4().to_string())));
            }

            let columns: Vec<&str> = fields.iter().map(|(c, _)| *c).collect();
            let placeholders = vec!["?"; fields.len()].join(", ");
            let sql = format!(
                "INSERT INTO annotation ({}) VALUES ({placeholders})",
                columns.join(", ")
            );

            let mut query = sqlx::query(&sql);
            for (_, value) in fields {
                query = bind_value(query, value);
            }
            query.execute(&self.pool).await?;
        } else {
            let set_clauses: Vec<String> =
                staged.iter().map(|(c, _)| format!("{c} = ?")).collect();
            let sql = format!(
                "UPDATE annotation SET {} WHERE item_type = ? AND user_id = ? AND item_id = ?",
                set_clauses.join(", ")
            );

            let mut query = sqlx::query(&sql);
            for (_, value) in staged {
                query = bind_value(query, value);
            }
            query
                .bind(item_type.as_str())
                .bind(user_id)
                .bind(item_id)
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }
}

/// Append an `AND <column> IN (?, ...)` filter when ids are given.
fn push_id_filter(sql: &mut String, column: &str, ids: Option<&[String]>) {
    if let Some(ids) = ids {
        if !ids.is_empty() {
            let placeholders = vec!["?"; ids.len()].join(",");
            sql.push_str(&format!(" AND {column} IN ({placeholders})"));
        }
    }
}

/// Flatten a partial update into bindable (column, value) pairs.
fn staged_fields(update: &AnnotationUpdate) -> Vec<(&'static str, Bound)> {
    let mut fields = Vec::new();
    if let Some(count) = update.play_count {
        fields.push(("play_count", Bound::Int(count)));
    }
    if let Some(rating) = update.rating {
        fields.push(("rating", Bound::Int(rating)));
    }
    if let Some(starred) = update.starred {
        fields.push(("starred", Bound::Int(i64::from(starred))));
    }
    if let Some(starred_at) = update.starred_at {
        fields.push((
            "starred_at",
            starred_at.map_or(Bound::Null, |d| Bound::Text(format_db_date(d))),
        ));
    }
    if let Some(play_date) = update.play_date {
        fields.push(("play_date", Bound::Text(format_db_date(play_date))));
    }
    fields
}

type SqliteQuery<'q> = sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>;

fn bind_value(query: SqliteQuery<'_>, value: Bound) -> SqliteQuery<'_> {
    match value {
        Bound::Int(i) => query.bind(i),
        Bound::Text(s) => query.bind(s),
        Bound::Null => query.bind(None::<String>),
    }
}

async fn table_exists(pool: &SqlitePool, table: &str) -> Result<bool> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table)
            .fetch_optional(pool)
            .await?;
    Ok(row.is_some())
}

async fn probe_schema(pool: &SqlitePool) -> Result<SchemaInfo> {
    let legacy_annotation_id = if table_exists(pool, "annotation").await? {
        let columns: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM pragma_table_info('annotation')")
                .fetch_all(pool)
                .await?;
        columns.iter().any(|(name,)| name == "ann_id")
    } else {
        false
    };

    Ok(SchemaInfo {
        legacy_annotation_id,
        artist_junction: table_exists(pool, "media_file_artists").await?,
    })
}
