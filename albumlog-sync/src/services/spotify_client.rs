//! Spotify Web API client
//!
//! Bearer-token client for the two endpoints albumlog needs: the
//! recently-played history and full album lookups. Requests are spaced by a
//! minimum interval so a batch with many new albums does not trip the API's
//! rate limit.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::models::spotify::RecentlyPlayedPage;
use crate::models::{AlbumDetails, RecentlyPlayedItem};
use crate::services::provider::{MetadataProvider, PlayHistorySource, ProviderError};

const USER_AGENT: &str = concat!("albumlog/", env!("CARGO_PKG_VERSION"));

/// The recently-played endpoint returns at most 50 items
pub const MAX_RECENTLY_PLAYED_LIMIT: u32 = 50;

/// Rate limiter enforcing a minimum interval between requests
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    /// Wait if necessary to comply with rate limit
    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// Spotify Web API client
pub struct SpotifyClient {
    http_client: reqwest::Client,
    access_token: String,
    base_url: String,
    rate_limiter: Arc<RateLimiter>,
}

impl SpotifyClient {
    pub fn new(
        access_token: impl Into<String>,
        base_url: impl Into<String>,
        rate_limit_ms: u64,
    ) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            access_token: access_token.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            rate_limiter: Arc::new(RateLimiter::new(rate_limit_ms)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `{base_url}{path}` and decode the JSON body
    async fn get_json<T: DeserializeOwned>(&self, path: &str, resource: &str) -> Result<T, ProviderError> {
        self.rate_limiter.wait().await;

        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "Querying Spotify API");

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ProviderError::Unauthorized);
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(resource.to_string()));
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimitExceeded);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))
    }

    /// Most recent plays, newest first
    ///
    /// `limit` is clamped to 1..=50.
    pub async fn get_recently_played(&self, limit: u32) -> Result<Vec<RecentlyPlayedItem>, ProviderError> {
        let limit = limit.clamp(1, MAX_RECENTLY_PLAYED_LIMIT);
        let page: RecentlyPlayedPage = self
            .get_json(
                &format!("/me/player/recently-played?limit={}", limit),
                "recently played",
            )
            .await?;

        tracing::info!(items = page.items.len(), "Retrieved recently played tracks");
        Ok(page.items)
    }

    /// Full album including its track listing
    pub async fn get_album(&self, album_id: &str) -> Result<AlbumDetails, ProviderError> {
        let album: AlbumDetails = self
            .get_json(&format!("/albums/{}", album_id), &format!("album {}", album_id))
            .await?;

        tracing::info!(
            album_id = %album_id,
            name = %album.name,
            total_tracks = album.total_tracks,
            "Retrieved album from Spotify"
        );

        Ok(album)
    }
}

#[async_trait]
impl MetadataProvider for SpotifyClient {
    async fn fetch_album(&self, album_id: &str) -> Result<AlbumDetails, ProviderError> {
        self.get_album(album_id).await
    }
}

#[async_trait]
impl PlayHistorySource for SpotifyClient {
    async fn recently_played(&self, limit: u32) -> Result<Vec<RecentlyPlayedItem>, ProviderError> {
        self.get_recently_played(limit).await
    }
}
