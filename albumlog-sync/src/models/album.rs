//! Stored album record

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Album as cached in the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAlbum {
    pub guid: Uuid,
    pub spotify_album_id: String,
    pub name: String,
    pub artist_name: String,
    pub image_url: Option<String>,
    pub release_date: Option<String>,
    /// Track count used as detection input
    pub total_tracks: u32,
    pub genres: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}
