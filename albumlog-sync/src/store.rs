//! Store traits used by the sync orchestrator
//!
//! The SQLite implementation lives in [`crate::db`]; tests may substitute
//! their own. All methods return the common error type so lock contention
//! can be recognised and retried by the implementation.

use async_trait::async_trait;
use uuid::Uuid;

use albumlog_common::Result;

use crate::models::{
    AlbumAggregate, AlbumDetails, ListenOutcome, PlayedTrack, RecordedListen, StoredAlbum, SyncLog,
    SyncLogStatus, SyncRun, TimeWindow,
};

/// Per-user track bookkeeping
#[async_trait]
pub trait TrackStore: Send + Sync {
    async fn track_exists(&self, user_id: &str, track_id: &str) -> Result<bool>;

    /// Upsert one row per play
    ///
    /// `last_played_at` never moves backwards; `last_seen_at` is at least the
    /// new `last_played_at`. Descriptive fields are overwritten.
    async fn upsert_played_tracks(&self, user_id: &str, tracks: &[PlayedTrack]) -> Result<()>;

    /// Add placeholder rows for album tracks the user has never played and
    /// attach the album id to existing rows that lack one
    ///
    /// Returns the number of rows added.
    async fn backfill_album_tracks(&self, user_id: &str, album: &AlbumDetails) -> Result<usize>;
}

/// Album metadata cache
#[async_trait]
pub trait AlbumStore: Send + Sync {
    async fn find_album(&self, spotify_album_id: &str) -> Result<Option<StoredAlbum>>;

    /// Insert or refresh an album from provider metadata
    async fn upsert_album(&self, album: &AlbumDetails) -> Result<StoredAlbum>;
}

/// Recorded listens and their per-(user, album) aggregates
#[async_trait]
pub trait ListenStore: Send + Sync {
    /// Any recorded listen for the user and album whose window overlaps `window`
    async fn find_overlapping(
        &self,
        user_id: &str,
        album_guid: Uuid,
        window: TimeWindow,
    ) -> Result<Option<RecordedListen>>;

    async fn insert_listen(&self, listen: &RecordedListen) -> Result<()>;

    async fn get_aggregate(&self, user_id: &str, album_guid: Uuid) -> Result<Option<AlbumAggregate>>;

    async fn upsert_aggregate(&self, aggregate: &AlbumAggregate) -> Result<()>;

    /// Record a listen unless an overlapping one exists, updating the aggregate
    ///
    /// The default runs the steps one after another; implementations backed
    /// by a database should override it with a single transaction.
    async fn record_listen(&self, listen: &RecordedListen) -> Result<ListenOutcome> {
        if self
            .find_overlapping(&listen.user_id, listen.album_guid, listen.window())
            .await?
            .is_some()
        {
            return Ok(ListenOutcome::Duplicate);
        }

        self.insert_listen(listen).await?;

        let aggregate = match self.get_aggregate(&listen.user_id, listen.album_guid).await? {
            Some(mut existing) => {
                existing.absorb(listen.window());
                existing
            }
            None => AlbumAggregate::seed(&listen.user_id, listen.album_guid, listen.window()),
        };
        self.upsert_aggregate(&aggregate).await?;

        Ok(ListenOutcome::Recorded)
    }
}

/// Archived batches and sync-run history
#[async_trait]
pub trait SyncLogStore: Send + Sync {
    /// Archive a raw batch as `pending`
    async fn create_sync_log(&self, user_id: &str, sync_type: &str, raw_response: &str) -> Result<Uuid>;

    async fn update_sync_log_status(
        &self,
        guid: Uuid,
        status: SyncLogStatus,
        error: Option<&str>,
    ) -> Result<()>;

    /// Logs still `pending`, oldest first
    async fn pending_sync_logs(&self) -> Result<Vec<SyncLog>>;

    async fn save_sync_run(&self, run: &SyncRun) -> Result<()>;
}

/// Everything the orchestrator needs from persistence
pub trait SyncStore: TrackStore + AlbumStore + ListenStore + SyncLogStore {}

impl<T> SyncStore for T where T: TrackStore + AlbumStore + ListenStore + SyncLogStore {}
