//! Track database operations
//!
//! One row per (user, track). Rows come from plays or, with no
//! `last_played_at`, from album track listings (backfill).

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use albumlog_common::time::now_millis;
use albumlog_common::{Error, Result};

use super::{to_json_column, SqliteStore};
use crate::models::spotify::join_artist_names;
use crate::models::{AlbumDetails, AlbumTrackItem, PlayedTrack, TrackRecord};
use crate::store::TrackStore;
use crate::utils::retry_on_lock;

pub async fn track_exists(pool: &SqlitePool, user_id: &str, track_id: &str) -> Result<bool> {
    let row = sqlx::query("SELECT 1 FROM tracks WHERE user_id = ? AND track_id = ?")
        .bind(user_id)
        .bind(track_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.is_some())
}

const TRACK_COLUMNS: &str = "user_id, track_id, track_name, artist_name, album_name, album_image_url, \
                             spotify_album_id, json_extract(track_data, '$.track_number') AS track_number, \
                             first_seen_at, last_seen_at, last_played_at";

fn track_from_row(row: &SqliteRow) -> TrackRecord {
    TrackRecord {
        user_id: row.get("user_id"),
        track_id: row.get("track_id"),
        track_name: row.get("track_name"),
        artist_name: row.get("artist_name"),
        album_name: row.get("album_name"),
        album_image_url: row.get("album_image_url"),
        spotify_album_id: row.get("spotify_album_id"),
        track_number: row.get("track_number"),
        first_seen_at: row.get("first_seen_at"),
        last_seen_at: row.get("last_seen_at"),
        last_played_at: row.get("last_played_at"),
    }
}

pub async fn load_track(pool: &SqlitePool, user_id: &str, track_id: &str) -> Result<Option<TrackRecord>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM tracks WHERE user_id = ? AND track_id = ?",
        TRACK_COLUMNS
    ))
    .bind(user_id)
    .bind(track_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(track_from_row))
}

/// Played tracks, most recently played first
///
/// Placeholders from album listings have never been played and are left out.
pub async fn list_played_tracks(pool: &SqlitePool, user_id: &str, limit: u32) -> Result<Vec<TrackRecord>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {} FROM tracks
        WHERE user_id = ? AND last_played_at IS NOT NULL
        ORDER BY last_played_at DESC, last_seen_at DESC
        LIMIT ?
        "#,
        TRACK_COLUMNS
    ))
    .bind(user_id)
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(track_from_row).collect())
}

/// Every track row of one album for a user, played or backfilled, in album order
pub async fn list_album_tracks(pool: &SqlitePool, user_id: &str, spotify_album_id: &str) -> Result<Vec<TrackRecord>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {} FROM tracks
        WHERE user_id = ? AND spotify_album_id = ?
        ORDER BY track_number IS NULL, track_number, track_name
        "#,
        TRACK_COLUMNS
    ))
    .bind(user_id)
    .bind(spotify_album_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(track_from_row).collect())
}

/// Upsert one play
///
/// In the update branch every `tracks.*` reference is the pre-update value,
/// so `last_seen_at` is compared against the old and incoming play times.
pub async fn upsert_played_track(
    conn: &mut SqliteConnection,
    user_id: &str,
    track: &PlayedTrack,
    now: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO tracks (
            user_id, track_id, track_name, artist_name, album_name, album_image_url,
            spotify_album_id, track_data, first_seen_at, last_seen_at, last_played_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id, track_id) DO UPDATE SET
            track_name = excluded.track_name,
            artist_name = excluded.artist_name,
            album_name = excluded.album_name,
            album_image_url = excluded.album_image_url,
            spotify_album_id = COALESCE(excluded.spotify_album_id, tracks.spotify_album_id),
            track_data = COALESCE(excluded.track_data, tracks.track_data),
            last_played_at = MAX(COALESCE(tracks.last_played_at, 0), excluded.last_played_at),
            last_seen_at = MAX(tracks.last_seen_at, COALESCE(tracks.last_played_at, 0), excluded.last_played_at)
        "#,
    )
    .bind(user_id)
    .bind(&track.track_id)
    .bind(&track.track_name)
    .bind(&track.artist_name)
    .bind(&track.album_name)
    .bind(&track.album_image_url)
    .bind(&track.spotify_album_id)
    .bind(&track.track_data)
    .bind(now)
    .bind(track.played_at)
    .bind(track.played_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Insert a placeholder row for an album track; returns true when a row was added
///
/// Existing rows only gain the album id if they had none.
pub async fn backfill_album_track(
    conn: &mut SqliteConnection,
    user_id: &str,
    album: &AlbumDetails,
    item: &AlbumTrackItem,
    now: i64,
) -> Result<bool> {
    let artist_name = if item.artists.is_empty() {
        album.artist_name()
    } else {
        join_artist_names(&item.artists)
    };
    let track_data = to_json_column("track_data", item)?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO tracks (
            user_id, track_id, track_name, artist_name, album_name, album_image_url,
            spotify_album_id, track_data, first_seen_at, last_seen_at, last_played_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL)
        ON CONFLICT(user_id, track_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(&item.id)
    .bind(&item.name)
    .bind(&artist_name)
    .bind(&album.name)
    .bind(album.image_url())
    .bind(&album.id)
    .bind(&track_data)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?
    .rows_affected()
        > 0;

    if !inserted {
        sqlx::query(
            r#"
            UPDATE tracks SET spotify_album_id = ?
            WHERE user_id = ? AND track_id = ? AND spotify_album_id IS NULL
            "#,
        )
        .bind(&album.id)
        .bind(user_id)
        .bind(&item.id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(inserted)
}

#[async_trait]
impl TrackStore for SqliteStore {
    async fn track_exists(&self, user_id: &str, track_id: &str) -> Result<bool> {
        track_exists(self.pool(), user_id, track_id).await
    }

    async fn upsert_played_tracks(&self, user_id: &str, tracks: &[PlayedTrack]) -> Result<()> {
        let pool = self.pool();

        retry_on_lock("upsert played tracks", self.max_lock_wait_ms(), move || async move {
            let now = now_millis();
            let mut tx = pool.begin().await?;
            for track in tracks {
                upsert_played_track(&mut tx, user_id, track, now).await?;
            }
            tx.commit().await?;
            Ok::<_, Error>(())
        })
        .await
    }

    async fn backfill_album_tracks(&self, user_id: &str, album: &AlbumDetails) -> Result<usize> {
        let pool = self.pool();

        retry_on_lock("backfill album tracks", self.max_lock_wait_ms(), move || async move {
            let now = now_millis();
            let mut tx = pool.begin().await?;
            let mut added = 0;
            for item in &album.tracks.items {
                if backfill_album_track(&mut tx, user_id, album, item, now).await? {
                    added += 1;
                }
            }
            tx.commit().await?;
            Ok::<_, Error>(added)
        })
        .await
    }
}

impl SqliteStore {
    pub async fn list_tracks(&self, user_id: &str, limit: u32) -> Result<Vec<TrackRecord>> {
        list_played_tracks(self.pool(), user_id, limit).await
    }

    pub async fn album_tracks(&self, user_id: &str, spotify_album_id: &str) -> Result<Vec<TrackRecord>> {
        list_album_tracks(self.pool(), user_id, spotify_album_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use albumlog_common::db::init_in_memory_database;

    fn played(track_id: &str, played_at: i64) -> PlayedTrack {
        PlayedTrack {
            track_id: track_id.to_string(),
            track_name: format!("Track {}", track_id),
            artist_name: "Band".to_string(),
            album_name: Some("Record".to_string()),
            album_image_url: None,
            spotify_album_id: Some("al1".to_string()),
            track_data: None,
            played_at,
        }
    }

    #[tokio::test]
    async fn test_first_play_seeds_timestamps() {
        let store = SqliteStore::new(init_in_memory_database().await.unwrap());

        store.upsert_played_tracks("u1", &[played("t1", 5_000)]).await.unwrap();

        let track = load_track(store.pool(), "u1", "t1").await.unwrap().unwrap();
        assert_eq!(track.last_played_at, Some(5_000));
        assert_eq!(track.last_seen_at, 5_000);
        assert!(track.first_seen_at > 5_000);
        assert!(store.track_exists("u1", "t1").await.unwrap());
        assert!(!store.track_exists("u2", "t1").await.unwrap());
    }

    #[tokio::test]
    async fn test_older_play_does_not_rewind() {
        let store = SqliteStore::new(init_in_memory_database().await.unwrap());

        store
            .upsert_played_tracks("u1", &[played("t1", 9_000), played("t1", 4_000)])
            .await
            .unwrap();

        let track = load_track(store.pool(), "u1", "t1").await.unwrap().unwrap();
        assert_eq!(track.last_played_at, Some(9_000));
        assert_eq!(track.last_seen_at, 9_000);
    }
}
