//! In-memory metadata provider and play history

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use albumlog_sync::models::{AlbumDetails, RecentlyPlayedItem};
use albumlog_sync::{MetadataProvider, PlayHistorySource, ProviderError};

#[derive(Default)]
pub struct FakeProvider {
    albums: HashMap<String, AlbumDetails>,
    failing: HashSet<String>,
    history: Vec<RecentlyPlayedItem>,
    history_fails: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_album(mut self, album: AlbumDetails) -> Self {
        self.albums.insert(album.id.clone(), album);
        self
    }

    /// Every fetch of this album fails with a server error
    pub fn with_failing_album(mut self, album_id: &str) -> Self {
        self.failing.insert(album_id.to_string());
        self
    }

    pub fn with_history(mut self, items: Vec<RecentlyPlayedItem>) -> Self {
        self.history = items;
        self
    }

    pub fn with_failing_history(mut self) -> Self {
        self.history_fails = true;
        self
    }

    /// Album ids passed to `fetch_album`, in call order
    pub fn album_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetadataProvider for FakeProvider {
    async fn fetch_album(&self, album_id: &str) -> Result<AlbumDetails, ProviderError> {
        self.calls.lock().unwrap().push(album_id.to_string());

        if self.failing.contains(album_id) {
            return Err(ProviderError::Api(500, "upstream unavailable".to_string()));
        }

        self.albums
            .get(album_id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("album {}", album_id)))
    }
}

#[async_trait]
impl PlayHistorySource for FakeProvider {
    async fn recently_played(&self, limit: u32) -> Result<Vec<RecentlyPlayedItem>, ProviderError> {
        if self.history_fails {
            return Err(ProviderError::Unauthorized);
        }

        Ok(self.history.iter().take(limit as usize).cloned().collect())
    }
}
