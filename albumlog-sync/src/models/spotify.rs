//! Spotify Web API payloads
//!
//! Only the fields albumlog reads are modelled; unknown fields are ignored.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::models::PlayEvent;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotifyArtist {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotifyImage {
    pub url: String,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub width: Option<u32>,
}

/// Album summary embedded in a track object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotifyAlbumRef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub images: Vec<SpotifyImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotifyTrack {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<SpotifyArtist>,
    pub album: SpotifyAlbumRef,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    /// 1-based position on its album (disc-relative, as reported)
    pub track_number: i64,
}

/// One entry of the recently-played history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentlyPlayedItem {
    pub track: SpotifyTrack,
    /// RFC 3339 timestamp
    pub played_at: String,
}

/// `GET /me/player/recently-played` response envelope
#[derive(Debug, Clone, Deserialize)]
pub struct RecentlyPlayedPage {
    pub items: Vec<RecentlyPlayedItem>,
}

/// Full album as returned by `GET /albums/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumDetails {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<SpotifyArtist>,
    #[serde(default)]
    pub images: Vec<SpotifyImage>,
    #[serde(default)]
    pub release_date: Option<String>,
    pub total_tracks: u32,
    #[serde(default)]
    pub genres: Vec<String>,
    pub tracks: AlbumTrackPage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumTrackPage {
    pub items: Vec<AlbumTrackItem>,
    #[serde(default)]
    pub total: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumTrackItem {
    pub id: String,
    pub name: String,
    pub track_number: i64,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub artists: Vec<SpotifyArtist>,
}

/// Comma-joined artist names ("A, B")
pub fn join_artist_names(artists: &[SpotifyArtist]) -> String {
    artists
        .iter()
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// URL of the first (largest) image, if any
pub fn first_image_url(images: &[SpotifyImage]) -> Option<String> {
    images.first().map(|i| i.url.clone())
}

impl RecentlyPlayedItem {
    pub fn played_at_millis(&self) -> Result<i64> {
        albumlog_common::time::parse_rfc3339_millis(&self.played_at).map_err(|e| {
            SyncError::InvalidBatch(format!("track {}: {}", self.track.id, e))
        })
    }

    pub fn to_play_event(&self) -> Result<PlayEvent> {
        Ok(PlayEvent {
            track_id: self.track.id.clone(),
            track_number: self.track.track_number,
            played_at: self.played_at_millis()?,
            album_id: self.track.album.id.clone(),
        })
    }
}

impl AlbumDetails {
    pub fn artist_name(&self) -> String {
        join_artist_names(&self.artists)
    }

    pub fn image_url(&self) -> Option<String> {
        first_image_url(&self.images)
    }
}
