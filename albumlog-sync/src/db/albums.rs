//! Album database operations
//!
//! Albums are keyed by their Spotify id and shared across users.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use albumlog_common::time::now_millis;
use albumlog_common::{Error, Result};

use super::{from_json_column, parse_guid, to_json_column, SqliteStore};
use crate::models::{AlbumDetails, StoredAlbum};
use crate::store::AlbumStore;
use crate::utils::retry_on_lock;

const ALBUM_COLUMNS: &str = "guid, spotify_album_id, name, artist_name, image_url, release_date, \
                             total_tracks, genres, created_at, updated_at";

pub(crate) fn album_from_row(row: &SqliteRow) -> Result<StoredAlbum> {
    let guid: String = row.get("guid");
    let genres: String = row.get("genres");
    let total_tracks: i64 = row.get("total_tracks");

    Ok(StoredAlbum {
        guid: parse_guid(&guid)?,
        spotify_album_id: row.get("spotify_album_id"),
        name: row.get("name"),
        artist_name: row.get("artist_name"),
        image_url: row.get("image_url"),
        release_date: row.get("release_date"),
        total_tracks: u32::try_from(total_tracks)
            .map_err(|_| Error::Internal(format!("Invalid total_tracks {}", total_tracks)))?,
        genres: from_json_column("genres", &genres)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Load album by Spotify id
pub async fn load_album_by_spotify_id(pool: &SqlitePool, spotify_album_id: &str) -> Result<Option<StoredAlbum>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM albums WHERE spotify_album_id = ?",
        ALBUM_COLUMNS
    ))
    .bind(spotify_album_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(album_from_row).transpose()
}

/// Every stored album, newest first
pub async fn list_albums(pool: &SqlitePool, limit: Option<u32>) -> Result<Vec<StoredAlbum>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM albums ORDER BY created_at DESC, rowid DESC LIMIT ?",
        ALBUM_COLUMNS
    ))
    .bind(limit.map(i64::from).unwrap_or(-1))
    .fetch_all(pool)
    .await?;

    rows.iter().map(album_from_row).collect()
}

/// Save album metadata; an existing row keeps its guid and `created_at`
pub async fn save_album(pool: &SqlitePool, album: &AlbumDetails, now: i64) -> Result<()> {
    let genres = to_json_column("genres", &album.genres)?;
    let raw_data = to_json_column("raw_data", album)?;

    sqlx::query(
        r#"
        INSERT INTO albums (
            guid, spotify_album_id, name, artist_name, image_url, release_date,
            total_tracks, genres, raw_data, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(spotify_album_id) DO UPDATE SET
            name = excluded.name,
            artist_name = excluded.artist_name,
            image_url = excluded.image_url,
            release_date = excluded.release_date,
            total_tracks = excluded.total_tracks,
            genres = excluded.genres,
            raw_data = excluded.raw_data,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&album.id)
    .bind(&album.name)
    .bind(album.artist_name())
    .bind(album.image_url())
    .bind(&album.release_date)
    .bind(album.total_tracks as i64)
    .bind(&genres)
    .bind(&raw_data)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

#[async_trait]
impl AlbumStore for SqliteStore {
    async fn find_album(&self, spotify_album_id: &str) -> Result<Option<StoredAlbum>> {
        load_album_by_spotify_id(self.pool(), spotify_album_id).await
    }

    async fn upsert_album(&self, album: &AlbumDetails) -> Result<StoredAlbum> {
        let pool = self.pool();

        retry_on_lock("save album", self.max_lock_wait_ms(), move || async move {
            save_album(pool, album, now_millis()).await
        })
        .await?;

        load_album_by_spotify_id(pool, &album.id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("album {}", album.id)))
    }
}

impl SqliteStore {
    pub async fn list_albums(&self, limit: Option<u32>) -> Result<Vec<StoredAlbum>> {
        list_albums(self.pool(), limit).await
    }
}
