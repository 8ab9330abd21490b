//! Database initialization
//!
//! Opens (or creates) the SQLite database in the root folder and makes sure
//! every table exists. Table creation is idempotent, so this runs on every
//! start.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Default SQLite busy timeout applied to every connection
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 250;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Pragmas go through the connect options so every pooled connection gets them
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        // WAL lets readers proceed while a sync is writing
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Open a private in-memory database with the full schema
///
/// Every SQLite `:memory:` connection is a separate database, so the pool is
/// pinned to a single connection that never expires.
pub async fn init_in_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    create_schema(&pool).await?;
    Ok(pool)
}

/// Create every albumlog table (idempotent)
///
/// Also used directly by tests against `sqlite::memory:` pools.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    create_albums_table(pool).await?;
    create_tracks_table(pool).await?;
    create_album_listens_table(pool).await?;
    create_user_albums_table(pool).await?;
    create_sync_logs_table(pool).await?;
    create_sync_runs_table(pool).await?;

    info!("Database tables initialized");
    Ok(())
}

/// Albums resolved from the metadata provider, shared by all users
pub async fn create_albums_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS albums (
            guid TEXT PRIMARY KEY,
            spotify_album_id TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            artist_name TEXT NOT NULL,
            image_url TEXT,
            release_date TEXT,
            total_tracks INTEGER NOT NULL CHECK (total_tracks >= 0),
            genres TEXT NOT NULL DEFAULT '[]',
            raw_data TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Per-user track bookkeeping (played tracks plus album-backfilled placeholders)
pub async fn create_tracks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tracks (
            user_id TEXT NOT NULL,
            track_id TEXT NOT NULL,
            track_name TEXT NOT NULL,
            artist_name TEXT NOT NULL,
            album_name TEXT,
            album_image_url TEXT,
            spotify_album_id TEXT,
            track_data TEXT,
            first_seen_at INTEGER NOT NULL,
            last_seen_at INTEGER NOT NULL,
            last_played_at INTEGER,
            PRIMARY KEY (user_id, track_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_tracks_user_album ON tracks(user_id, spotify_album_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Recorded album listens (immutable once written)
pub async fn create_album_listens_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS album_listens (
            guid TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            album_guid TEXT NOT NULL REFERENCES albums(guid) ON DELETE CASCADE,
            listened_at INTEGER NOT NULL,
            earliest_played_at INTEGER NOT NULL,
            latest_played_at INTEGER NOT NULL,
            track_ids TEXT NOT NULL DEFAULT '[]',
            source TEXT NOT NULL,
            CHECK (earliest_played_at <= latest_played_at)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_album_listens_user_album ON album_listens(user_id, album_guid)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_album_listens_user_listened ON album_listens(user_id, listened_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Per-(user, album) listen aggregates
pub async fn create_user_albums_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_albums (
            user_id TEXT NOT NULL,
            album_guid TEXT NOT NULL REFERENCES albums(guid) ON DELETE CASCADE,
            listen_count INTEGER NOT NULL CHECK (listen_count > 0),
            first_listened_at INTEGER NOT NULL,
            last_listened_at INTEGER NOT NULL,
            PRIMARY KEY (user_id, album_guid)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Raw fetched batches, archived before interpretation
pub async fn create_sync_logs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sync_logs (
            guid TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            sync_type TEXT NOT NULL,
            raw_response TEXT NOT NULL,
            status TEXT NOT NULL,
            processed_at INTEGER,
            error TEXT,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sync_logs_status ON sync_logs(status)")
        .execute(pool)
        .await?;

    Ok(())
}

/// One row per sync invocation with its statistics
pub async fn create_sync_runs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sync_runs (
            guid TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            source TEXT NOT NULL,
            status TEXT NOT NULL,
            started_at INTEGER NOT NULL,
            completed_at INTEGER NOT NULL,
            duration_ms INTEGER NOT NULL,
            error TEXT,
            tracks_from_api INTEGER NOT NULL DEFAULT 0,
            unique_tracks_from_api INTEGER NOT NULL DEFAULT 0,
            new_tracks_added INTEGER NOT NULL DEFAULT 0,
            existing_tracks_updated INTEGER NOT NULL DEFAULT 0,
            unique_albums_from_api INTEGER NOT NULL DEFAULT 0,
            albums_already_in_db INTEGER NOT NULL DEFAULT 0,
            new_albums_discovered INTEGER NOT NULL DEFAULT 0,
            albums_fetch_failed INTEGER NOT NULL DEFAULT 0,
            albums_checked_for_listens INTEGER NOT NULL DEFAULT 0,
            album_listens_recorded INTEGER NOT NULL DEFAULT 0,
            tracks_backfilled_from_albums INTEGER NOT NULL DEFAULT 0,
            new_album_names TEXT NOT NULL DEFAULT '[]',
            recorded_listen_album_names TEXT NOT NULL DEFAULT '[]'
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_sync_runs_user_started ON sync_runs(user_id, started_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
