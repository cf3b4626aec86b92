//! Shared test helpers: miniature Navidrome databases on disk.
//!
//! Real Navidrome schemas are much wider; these tables carry only the
//! columns the sync reads or writes, in both historical shapes.

use std::path::{Path, PathBuf};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

/// A Navidrome-shaped SQLite database in a temp directory.
pub struct TestDb {
    pool: SqlitePool,
    path: PathBuf,
    _dir: tempfile::TempDir,
}

impl TestDb {
    /// Create a fresh database file. `legacy_annotation` adds the old
    /// `ann_id` surrogate key; `artist_junction` adds the
    /// `media_file_artists` table of the post-BFR schema.
    pub async fn create(legacy_annotation: bool, artist_junction: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("navidrome.db");

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await
            .unwrap();

        let annotation_ddl = if legacy_annotation {
            r#"
            CREATE TABLE annotation (
                ann_id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                item_id TEXT NOT NULL,
                item_type TEXT NOT NULL,
                play_count INTEGER,
                play_date TEXT,
                rating INTEGER,
                starred INTEGER DEFAULT 0,
                starred_at TEXT,
                UNIQUE (user_id, item_id, item_type)
            )
            "#
        } else {
            r#"
            CREATE TABLE annotation (
                user_id TEXT NOT NULL,
                item_id TEXT NOT NULL,
                item_type TEXT NOT NULL,
                play_count INTEGER,
                play_date TEXT,
                rating INTEGER,
                starred INTEGER DEFAULT 0,
                starred_at TEXT,
                PRIMARY KEY (user_id, item_id, item_type)
            )
            "#
        };

        let ddl = [
            "CREATE TABLE user (id TEXT PRIMARY KEY, user_name TEXT NOT NULL)",
            "CREATE TABLE artist (id TEXT PRIMARY KEY, name TEXT NOT NULL)",
            "CREATE TABLE album (id TEXT PRIMARY KEY, name TEXT NOT NULL)",
            r#"
            CREATE TABLE media_file (
                id TEXT PRIMARY KEY,
                path TEXT NOT NULL,
                title TEXT NOT NULL,
                album TEXT,
                album_id TEXT,
                artist_id TEXT,
                album_artist TEXT,
                album_artist_id TEXT
            )
            "#,
            annotation_ddl,
        ];
        for statement in ddl {
            sqlx::query(statement).execute(&pool).await.unwrap();
        }
        if artist_junction {
            sqlx::query(
                r#"
                CREATE TABLE media_file_artists (
                    media_file_id TEXT NOT NULL,
                    artist_id TEXT NOT NULL,
                    role TEXT NOT NULL
                )
                "#,
            )
            .execute(&pool)
            .await
            .unwrap();
        }

        Self {
            pool,
            path,
            _dir: dir,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Row-insertion helpers for seeding test databases.
pub mod seed {
    use super::*;

    pub async fn user(pool: &SqlitePool, id: &str, user_name: &str) {
        sqlx::query("INSERT INTO user (id, user_name) VALUES (?, ?)")
            .bind(id)
            .bind(user_name)
            .execute(pool)
            .await
            .unwrap();
    }

    pub async fn artist(pool: &SqlitePool, id: &str, name: &str) {
        sqlx::query("INSERT INTO artist (id, name) VALUES (?, ?)")
            .bind(id)
            .bind(name)
            .execute(pool)
            .await
            .unwrap();
    }

    pub async fn album(pool: &SqlitePool, id: &str, name: &str) {
        sqlx::query("INSERT INTO album (id, name) VALUES (?, ?)")
            .bind(id)
            .bind(name)
            .execute(pool)
            .await
            .unwrap();
    }

    pub async fn track(
        pool: &SqlitePool,
        id: &str,
        title: &str,
        path: &str,
        album_id: Option<&str>,
        artist_id: Option<&str>,
    ) {
        sqlx::query(
            "INSERT INTO media_file (id, title, path, album_id, artist_id) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(title)
        .bind(path)
        .bind(album_id)
        .bind(artist_id)
        .execute(pool)
        .await
        .unwrap();
    }

    pub async fn annotation(
        pool: &SqlitePool,
        user_id: &str,
        item_id: &str,
        item_type: &str,
        play_count: i64,
        rating: Option<i64>,
        starred: bool,
    ) {
        sqlx::query(
            r#"
            INSERT INTO annotation (user_id, item_id, item_type, play_count, rating, starred)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(item_id)
        .bind(item_type)
        .bind(play_count)
        .bind(rating)
        .bind(i64::from(starred))
        .execute(pool)
        .await
        .unwrap();
    }

    pub async fn media_file_artist(
        pool: &SqlitePool,
        media_file_id: &str,
        artist_id: &str,
        role: &str,
    ) {
        sqlx::query(
            "INSERT INTO media_file_artists (media_file_id, artist_id, role) VALUES (?, ?, ?)",
        )
        .bind(media_file_id)
        .bind(artist_id)
        .bind(role)
        .execute(pool)
        .await
        .unwrap();
    }
}
