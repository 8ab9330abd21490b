//! Provider seams: album metadata and listening history
//!
//! The orchestrator only sees these traits, so tests can substitute an
//! in-memory provider for the HTTP client.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{AlbumDetails, RecentlyPlayedItem};

/// Provider errors
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Access token missing, expired or revoked
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Resolves album metadata (track count and track listing)
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn fetch_album(&self, album_id: &str) -> Result<AlbumDetails, ProviderError>;
}

/// Supplies the user's most recent plays
#[async_trait]
pub trait PlayHistorySource: Send + Sync {
    /// Most recent plays, newest first, at most `limit`
    async fn recently_played(&self, limit: u32) -> Result<Vec<RecentlyPlayedItem>, ProviderError>;
}
