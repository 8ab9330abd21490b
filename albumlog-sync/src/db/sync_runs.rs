//! Sync run history

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use albumlog_common::{Error, Result};

use super::{from_json_column, parse_guid, to_json_column, SqliteStore};
use crate::models::{SyncRun, SyncStats};

fn count(row: &SqliteRow, column: &str) -> usize {
    let value: i64 = row.get(column);
    value.max(0) as usize
}

fn sync_run_from_row(row: &SqliteRow) -> Result<SyncRun> {
    let guid: String = row.get("guid");
    let source: String = row.get("source");
    let status: String = row.get("status");
    let duration_ms: i64 = row.get("duration_ms");
    let new_album_names: String = row.get("new_album_names");
    let recorded_listen_album_names: String = row.get("recorded_listen_album_names");

    Ok(SyncRun {
        guid: parse_guid(&guid)?,
        user_id: row.get("user_id"),
        source: source.parse().map_err(Error::Internal)?,
        status: status.parse().map_err(Error::Internal)?,
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
        duration_ms: duration_ms.max(0) as u64,
        error: row.get("error"),
        stats: SyncStats {
            tracks_from_api: count(row, "tracks_from_api"),
            unique_tracks_from_api: count(row, "unique_tracks_from_api"),
            new_tracks_added: count(row, "new_tracks_added"),
            existing_tracks_updated: count(row, "existing_tracks_updated"),
            unique_albums_from_api: count(row, "unique_albums_from_api"),
            albums_already_in_db: count(row, "albums_already_in_db"),
            new_albums_discovered: count(row, "new_albums_discovered"),
            albums_fetch_failed: count(row, "albums_fetch_failed"),
            albums_checked_for_listens: count(row, "albums_checked_for_listens"),
            album_listens_recorded: count(row, "album_listens_recorded"),
            tracks_backfilled_from_albums: count(row, "tracks_backfilled_from_albums"),
            new_album_names: from_json_column("new_album_names", &new_album_names)?,
            recorded_listen_album_names: from_json_column(
                "recorded_listen_album_names",
                &recorded_listen_album_names,
            )?,
        },
    })
}

pub async fn save_sync_run(pool: &SqlitePool, run: &SyncRun) -> Result<()> {
    let s = &run.stats;
    let new_album_names = to_json_column("new_album_names", &s.new_album_names)?;
    let recorded_listen_album_names =
        to_json_column("recorded_listen_album_names", &s.recorded_listen_album_names)?;

    sqlx::query(
        r#"
        INSERT INTO sync_runs (
            guid, user_id, source, status, started_at, completed_at, duration_ms, error,
            tracks_from_api, unique_tracks_from_api, new_tracks_added, existing_tracks_updated,
            unique_albums_from_api, albums_already_in_db, new_albums_discovered, albums_fetch_failed,
            albums_checked_for_listens, album_listens_recorded, tracks_backfilled_from_albums,
            new_album_names, recorded_listen_album_names
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(run.guid.to_string())
    .bind(&run.user_id)
    .bind(run.source.as_str())
    .bind(run.status.as_str())
    .bind(run.started_at)
    .bind(run.completed_at)
    .bind(run.duration_ms as i64)
    .bind(&run.error)
    .bind(s.tracks_from_api as i64)
    .bind(s.unique_tracks_from_api as i64)
    .bind(s.new_tracks_added as i64)
    .bind(s.existing_tracks_updated as i64)
    .bind(s.unique_albums_from_api as i64)
    .bind(s.albums_already_in_db as i64)
    .bind(s.new_albums_discovered as i64)
    .bind(s.albums_fetch_failed as i64)
    .bind(s.albums_checked_for_listens as i64)
    .bind(s.album_listens_recorded as i64)
    .bind(s.tracks_backfilled_from_albums as i64)
    .bind(&new_album_names)
    .bind(&recorded_listen_album_names)
    .execute(pool)
    .await?;

    Ok(())
}

/// Newest runs first
pub async fn load_recent_sync_runs(pool: &SqlitePool, user_id: &str, limit: u32) -> Result<Vec<SyncRun>> {
    let rows = sqlx::query(
        r#"
        SELECT *
        FROM sync_runs
        WHERE user_id = ?
        ORDER BY started_at DESC, rowid DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    rows.iter().map(sync_run_from_row).collect()
}

impl SqliteStore {
    pub async fn recent_sync_runs(&self, user_id: &str, limit: u32) -> Result<Vec<SyncRun>> {
        load_recent_sync_runs(self.pool(), user_id, limit).await
    }
}
