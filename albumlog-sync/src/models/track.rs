//! Per-user track bookkeeping

use serde::{Deserialize, Serialize};

use crate::db::to_json_column;
use crate::error::Result;
use crate::models::spotify::{first_image_url, join_artist_names};
use crate::models::RecentlyPlayedItem;

/// One play of a track, flattened for the track store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayedTrack {
    pub track_id: String,
    pub track_name: String,
    pub artist_name: String,
    pub album_name: Option<String>,
    pub album_image_url: Option<String>,
    pub spotify_album_id: Option<String>,
    /// Raw track JSON
    pub track_data: Option<String>,
    pub played_at: i64,
}

impl PlayedTrack {
    pub fn from_item(item: &RecentlyPlayedItem) -> Result<Self> {
        Ok(Self {
            track_id: item.track.id.clone(),
            track_name: item.track.name.clone(),
            artist_name: join_artist_names(&item.track.artists),
            album_name: Some(item.track.album.name.clone()),
            album_image_url: first_image_url(&item.track.album.images),
            spotify_album_id: Some(item.track.album.id.clone()),
            track_data: Some(to_json_column("track_data", &item.track)?),
            played_at: item.played_at_millis()?,
        })
    }
}

/// Track row as stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub user_id: String,
    pub track_id: String,
    pub track_name: String,
    pub artist_name: String,
    pub album_name: Option<String>,
    pub album_image_url: Option<String>,
    pub spotify_album_id: Option<String>,
    /// Position on the album, from the stored track JSON
    pub track_number: Option<i64>,
    pub first_seen_at: i64,
    pub last_seen_at: i64,
    /// `None` for tracks only known from an album listing
    pub last_played_at: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::models::{SpotifyAlbumRef, SpotifyArtist, SpotifyTrack};

    fn item(played_at: &str) -> RecentlyPlayedItem {
        RecentlyPlayedItem {
            track: SpotifyTrack {
                id: "t3".to_string(),
                name: "Third".to_string(),
                artists: vec![SpotifyArtist {
                    id: None,
                    name: "Band".to_string(),
                }],
                album: SpotifyAlbumRef {
                    id: "al1".to_string(),
                    name: "Record".to_string(),
                    images: Vec::new(),
                },
                duration_ms: Some(180_000),
                track_number: 3,
            },
            played_at: played_at.to_string(),
        }
    }

    #[test]
    fn test_from_item_keeps_track_json() {
        let played = PlayedTrack::from_item(&item("2024-03-01T10:00:00Z")).unwrap();

        let stored: serde_json::Value = serde_json::from_str(played.track_data.as_deref().unwrap()).unwrap();
        assert_eq!(stored["id"], "t3");
        assert_eq!(stored["track_number"], 3);
        assert_eq!(played.spotify_album_id.as_deref(), Some("al1"));
        assert_eq!(played.played_at, 1_709_287_200_000);
    }

    #[test]
    fn test_from_item_rejects_bad_timestamp() {
        let result = PlayedTrack::from_item(&item("soon"));
        assert!(matches!(result, Err(SyncError::InvalidBatch(_))));
    }
}
