//! Batch and album builders
//!
//! Track ids follow the pattern `<album>-t<n>` so album listings and plays
//! line up without extra bookkeeping.

use albumlog_common::db::init_in_memory_database;
use albumlog_sync::models::spotify::AlbumTrackPage;
use albumlog_sync::models::{
    AlbumDetails, AlbumTrackItem, RecentlyPlayedItem, SpotifyAlbumRef, SpotifyArtist, SpotifyImage,
    SpotifyTrack,
};
use albumlog_sync::SqliteStore;
use chrono::{SecondsFormat, TimeZone, Utc};

pub const MINUTE: i64 = 60 * 1000;

/// 2024-03-01T10:00:00Z
pub const BASE_TIME: i64 = 1_709_287_200_000;

pub fn track_id(album_id: &str, track_number: i64) -> String {
    format!("{}-t{}", album_id, track_number)
}

fn artist() -> SpotifyArtist {
    SpotifyArtist {
        id: Some("ar1".to_string()),
        name: "Band".to_string(),
    }
}

pub fn album_details(album_id: &str, name: &str, total_tracks: u32) -> AlbumDetails {
    AlbumDetails {
        id: album_id.to_string(),
        name: name.to_string(),
        artists: vec![artist()],
        images: vec![SpotifyImage {
            url: format!("https://img.test/{}", album_id),
            height: Some(640),
            width: Some(640),
        }],
        release_date: Some("2021-06-01".to_string()),
        total_tracks,
        genres: Vec::new(),
        tracks: AlbumTrackPage {
            items: (1..=total_tracks as i64)
                .map(|n| AlbumTrackItem {
                    id: track_id(album_id, n),
                    name: format!("Song {}", n),
                    track_number: n,
                    duration_ms: Some(200_000),
                    artists: vec![artist()],
                })
                .collect(),
            total: Some(total_tracks),
        },
    }
}

/// One recently-played entry for track `track_number` of `album_id`
pub fn play_item(album_id: &str, album_name: &str, track_number: i64, played_at: i64) -> RecentlyPlayedItem {
    let played_at = Utc
        .timestamp_millis_opt(played_at)
        .single()
        .expect("valid timestamp")
        .to_rfc3339_opts(SecondsFormat::Millis, true);

    RecentlyPlayedItem {
        track: SpotifyTrack {
            id: track_id(album_id, track_number),
            name: format!("Song {}", track_number),
            artists: vec![artist()],
            album: SpotifyAlbumRef {
                id: album_id.to_string(),
                name: album_name.to_string(),
                images: Vec::new(),
            },
            duration_ms: Some(200_000),
            track_number,
        },
        played_at,
    }
}

/// Tracks 1..=tracks in order, four minutes apart, newest first like the API
pub fn straight_through(album_id: &str, album_name: &str, tracks: i64, start: i64) -> Vec<RecentlyPlayedItem> {
    let mut items: Vec<_> = (1..=tracks)
        .map(|n| play_item(album_id, album_name, n, start + (n - 1) * 4 * MINUTE))
        .collect();
    items.reverse();
    items
}

pub async fn memory_store() -> SqliteStore {
    SqliteStore::new(init_in_memory_database().await.expect("in-memory database"))
}
