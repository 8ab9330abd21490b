//! Album listen database operations
//!
//! Listens and the `user_albums` aggregate are always written together in
//! one transaction. The overlap check runs inside that transaction too, so
//! a concurrent writer that committed first forces a lock-contention retry
//! and the retried attempt sees its listen.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use albumlog_common::{Error, Result};

use super::albums::{album_from_row, load_album_by_spotify_id};
use super::{from_json_column, parse_guid, to_json_column, SqliteStore};
use crate::models::{AlbumAggregate, ListenOutcome, RecordedListen, StoredAlbum, TimeWindow};
use crate::store::ListenStore;
use crate::utils::retry_on_lock;

const LISTEN_COLUMNS: &str =
    "guid, user_id, album_guid, listened_at, earliest_played_at, latest_played_at, track_ids, source";

/// Listen joined with its album, for history views
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListenEntry {
    #[serde(flatten)]
    pub listen: RecordedListen,
    pub album_name: String,
    pub artist_name: String,
}

/// Aggregate joined with its album
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserAlbumEntry {
    pub album: StoredAlbum,
    pub listen_count: i64,
    pub first_listened_at: i64,
    pub last_listened_at: i64,
}

fn listen_from_row(row: &SqliteRow) -> Result<RecordedListen> {
    let guid: String = row.get("guid");
    let album_guid: String = row.get("album_guid");
    let track_ids: String = row.get("track_ids");
    let source: String = row.get("source");

    Ok(RecordedListen {
        guid: parse_guid(&guid)?,
        user_id: row.get("user_id"),
        album_guid: parse_guid(&album_guid)?,
        listened_at: row.get("listened_at"),
        earliest_played_at: row.get("earliest_played_at"),
        latest_played_at: row.get("latest_played_at"),
        track_ids: from_json_column("track_ids", &track_ids)?,
        source: source.parse().map_err(Error::Internal)?,
    })
}

/// First recorded listen whose window overlaps `window` (closed intervals)
pub async fn find_overlapping(
    conn: &mut SqliteConnection,
    user_id: &str,
    album_guid: Uuid,
    window: TimeWindow,
) -> Result<Option<RecordedListen>> {
    let row = sqlx::query(&format!(
        r#"
        SELECT {}
        FROM album_listens
        WHERE user_id = ? AND album_guid = ?
          AND earliest_played_at <= ? AND latest_played_at >= ?
        ORDER BY earliest_played_at
        LIMIT 1
        "#,
        LISTEN_COLUMNS
    ))
    .bind(user_id)
    .bind(album_guid.to_string())
    .bind(window.latest)
    .bind(window.earliest)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(listen_from_row).transpose()
}

pub async fn insert_listen(conn: &mut SqliteConnection, listen: &RecordedListen) -> Result<()> {
    let track_ids = to_json_column("track_ids", &listen.track_ids)?;

    sqlx::query(
        r#"
        INSERT INTO album_listens (
            guid, user_id, album_guid, listened_at, earliest_played_at, latest_played_at, track_ids, source
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(listen.guid.to_string())
    .bind(&listen.user_id)
    .bind(listen.album_guid.to_string())
    .bind(listen.listened_at)
    .bind(listen.earliest_played_at)
    .bind(listen.latest_played_at)
    .bind(&track_ids)
    .bind(listen.source.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn load_listen(conn: &mut SqliteConnection, guid: Uuid) -> Result<Option<RecordedListen>> {
    let row = sqlx::query(&format!("SELECT {} FROM album_listens WHERE guid = ?", LISTEN_COLUMNS))
        .bind(guid.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(listen_from_row).transpose()
}

/// All listens for one user and album, oldest window first
pub async fn load_album_listens(
    conn: &mut SqliteConnection,
    user_id: &str,
    album_guid: Uuid,
) -> Result<Vec<RecordedListen>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM album_listens WHERE user_id = ? AND album_guid = ? ORDER BY earliest_played_at",
        LISTEN_COLUMNS
    ))
    .bind(user_id)
    .bind(album_guid.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(listen_from_row).collect()
}

pub async fn get_aggregate(
    conn: &mut SqliteConnection,
    user_id: &str,
    album_guid: Uuid,
) -> Result<Option<AlbumAggregate>> {
    let row = sqlx::query(
        r#"
        SELECT listen_count, first_listened_at, last_listened_at
        FROM user_albums
        WHERE user_id = ? AND album_guid = ?
        "#,
    )
    .bind(user_id)
    .bind(album_guid.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(|row| AlbumAggregate {
        user_id: user_id.to_string(),
        album_guid,
        listen_count: row.get("listen_count"),
        first_listened_at: row.get("first_listened_at"),
        last_listened_at: row.get("last_listened_at"),
    }))
}

pub async fn upsert_aggregate(conn: &mut SqliteConnection, aggregate: &AlbumAggregate) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_albums (user_id, album_guid, listen_count, first_listened_at, last_listened_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(user_id, album_guid) DO UPDATE SET
            listen_count = excluded.listen_count,
            first_listened_at = excluded.first_listened_at,
            last_listened_at = excluded.last_listened_at
        "#,
    )
    .bind(&aggregate.user_id)
    .bind(aggregate.album_guid.to_string())
    .bind(aggregate.listen_count)
    .bind(aggregate.first_listened_at)
    .bind(aggregate.last_listened_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn delete_aggregate(conn: &mut SqliteConnection, user_id: &str, album_guid: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM user_albums WHERE user_id = ? AND album_guid = ?")
        .bind(user_id)
        .bind(album_guid.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Insert `listen` and fold it into the aggregate
async fn insert_and_count(conn: &mut SqliteConnection, listen: &RecordedListen) -> Result<()> {
    insert_listen(conn, listen).await?;

    let aggregate = match get_aggregate(conn, &listen.user_id, listen.album_guid).await? {
        Some(mut existing) => {
            existing.absorb(listen.window());
            existing
        }
        None => AlbumAggregate::seed(&listen.user_id, listen.album_guid, listen.window()),
    };

    upsert_aggregate(conn, &aggregate).await
}

/// Overlap check, insert and aggregate update on one connection
pub async fn record_listen_in(conn: &mut SqliteConnection, listen: &RecordedListen) -> Result<ListenOutcome> {
    if let Some(existing) = find_overlapping(conn, &listen.user_id, listen.album_guid, listen.window()).await? {
        tracing::debug!(
            user_id = %listen.user_id,
            album_guid = %listen.album_guid,
            existing = %existing.guid,
            "Listen overlaps a recorded listen, skipping"
        );
        return Ok(ListenOutcome::Duplicate);
    }

    insert_and_count(conn, listen).await?;
    Ok(ListenOutcome::Recorded)
}

/// Hand-entered listen; a duplicate is one with exactly the same `listened_at`
pub async fn add_manual_listen_in(conn: &mut SqliteConnection, listen: &RecordedListen) -> Result<ListenOutcome> {
    let existing = sqlx::query(
        "SELECT 1 FROM album_listens WHERE user_id = ? AND album_guid = ? AND listened_at = ?",
    )
    .bind(&listen.user_id)
    .bind(listen.album_guid.to_string())
    .bind(listen.listened_at)
    .fetch_optional(&mut *conn)
    .await?;

    if existing.is_some() {
        return Ok(ListenOutcome::Duplicate);
    }

    insert_and_count(conn, listen).await?;
    Ok(ListenOutcome::Recorded)
}

/// Delete a listen and rebuild its aggregate from what remains
///
/// Returns false when no listen has that guid.
pub async fn delete_listen_in(conn: &mut SqliteConnection, guid: Uuid) -> Result<bool> {
    let Some(listen) = load_listen(conn, guid).await? else {
        return Ok(false);
    };

    sqlx::query("DELETE FROM album_listens WHERE guid = ?")
        .bind(guid.to_string())
        .execute(&mut *conn)
        .await?;

    let remaining = load_album_listens(conn, &listen.user_id, listen.album_guid).await?;
    match AlbumAggregate::recompute(&listen.user_id, listen.album_guid, &remaining) {
        Some(aggregate) => upsert_aggregate(conn, &aggregate).await?,
        None => delete_aggregate(conn, &listen.user_id, listen.album_guid).await?,
    }

    Ok(true)
}

/// Most recently recorded listens for a user, with album names
pub async fn list_listens(pool: &SqlitePool, user_id: &str, limit: u32) -> Result<Vec<ListenEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT l.guid, l.user_id, l.album_guid, l.listened_at, l.earliest_played_at,
               l.latest_played_at, l.track_ids, l.source,
               a.name AS album_name, a.artist_name AS artist_name
        FROM album_listens l
        JOIN albums a ON a.guid = l.album_guid
        WHERE l.user_id = ?
        ORDER BY l.listened_at DESC, l.latest_played_at DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(ListenEntry {
                listen: listen_from_row(row)?,
                album_name: row.get("album_name"),
                artist_name: row.get("artist_name"),
            })
        })
        .collect()
}

/// Albums the user has listened to, most recently listened first
pub async fn list_user_albums(pool: &SqlitePool, user_id: &str) -> Result<Vec<UserAlbumEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT a.guid, a.spotify_album_id, a.name, a.artist_name, a.image_url, a.release_date,
               a.total_tracks, a.genres, a.created_at, a.updated_at,
               u.listen_count, u.first_listened_at, u.last_listened_at
        FROM user_albums u
        JOIN albums a ON a.guid = u.album_guid
        WHERE u.user_id = ?
        ORDER BY u.last_listened_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(UserAlbumEntry {
                album: album_from_row(row)?,
                listen_count: row.get("listen_count"),
                first_listened_at: row.get("first_listened_at"),
                last_listened_at: row.get("last_listened_at"),
            })
        })
        .collect()
}

#[async_trait]
impl ListenStore for SqliteStore {
    async fn find_overlapping(
        &self,
        user_id: &str,
        album_guid: Uuid,
        window: TimeWindow,
    ) -> Result<Option<RecordedListen>> {
        let mut conn = self.pool().acquire().await?;
        find_overlapping(&mut conn, user_id, album_guid, window).await
    }

    async fn insert_listen(&self, listen: &RecordedListen) -> Result<()> {
        let mut conn = self.pool().acquire().await?;
        insert_listen(&mut conn, listen).await
    }

    async fn get_aggregate(&self, user_id: &str, album_guid: Uuid) -> Result<Option<AlbumAggregate>> {
        let mut conn = self.pool().acquire().await?;
        get_aggregate(&mut conn, user_id, album_guid).await
    }

    async fn upsert_aggregate(&self, aggregate: &AlbumAggregate) -> Result<()> {
        let mut conn = self.pool().acquire().await?;
        upsert_aggregate(&mut conn, aggregate).await
    }

    async fn record_listen(&self, listen: &RecordedListen) -> Result<ListenOutcome> {
        let pool = self.pool();

        retry_on_lock("record listen", self.max_lock_wait_ms(), move || async move {
            let mut tx = pool.begin().await?;
            let outcome = record_listen_in(&mut tx, listen).await?;
            tx.commit().await?;
            Ok::<_, Error>(outcome)
        })
        .await
    }
}

impl SqliteStore {
    /// Record a hand-entered listen of a stored album
    ///
    /// Fails with `NotFound` when the album has never been synced.
    pub async fn add_manual_listen(
        &self,
        user_id: &str,
        spotify_album_id: &str,
        listened_at: i64,
    ) -> Result<ListenOutcome> {
        let album = load_album_by_spotify_id(self.pool(), spotify_album_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("album {}", spotify_album_id)))?;

        let listen = RecordedListen::manual(user_id, album.guid, listened_at);
        let pool = self.pool();
        let listen = &listen;

        let outcome = retry_on_lock("add manual listen", self.max_lock_wait_ms(), move || async move {
            let mut tx = pool.begin().await?;
            let outcome = add_manual_listen_in(&mut tx, listen).await?;
            tx.commit().await?;
            Ok::<_, Error>(outcome)
        })
        .await?;

        tracing::info!(
            user_id = %user_id,
            album = %album.name,
            listened_at,
            outcome = ?outcome,
            "Manual listen"
        );

        Ok(outcome)
    }

    /// Delete a listen by guid; returns false if it did not exist
    pub async fn delete_listen(&self, guid: Uuid) -> Result<bool> {
        let pool = self.pool();

        let deleted = retry_on_lock("delete listen", self.max_lock_wait_ms(), move || async move {
            let mut tx = pool.begin().await?;
            let deleted = delete_listen_in(&mut tx, guid).await?;
            tx.commit().await?;
            Ok::<_, Error>(deleted)
        })
        .await?;

        if deleted {
            tracing::info!(listen = %guid, "Deleted listen");
        }

        Ok(deleted)
    }

    pub async fn list_listens(&self, user_id: &str, limit: u32) -> Result<Vec<ListenEntry>> {
        list_listens(self.pool(), user_id, limit).await
    }

    pub async fn list_user_albums(&self, user_id: &str) -> Result<Vec<UserAlbumEntry>> {
        list_user_albums(self.pool(), user_id).await
    }
}
