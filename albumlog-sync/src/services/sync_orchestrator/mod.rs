//! Sync orchestrator
//!
//! Turns one batch of recently-played items into track bookkeeping, album
//! metadata and recorded album listens.
//!
//! # Phases
//! 1. **Archive**: the raw batch is stored as a `pending` sync log
//! 2. **Tracks** (`phase_tracks`): batch counters, new/existing
//!    classification, per-play upserts
//! 3. **Albums** (`phase_albums`): group plays by album, resolve metadata
//!    from the cache or the provider, backfill album track listings
//! 4. **Listens** (`phase_listens`): detect sessions and record the ones that
//!    do not overlap an existing listen
//! 5. **Finish**: sync log marked `processed`/`failed`, sync run saved
//!
//! Any store error or malformed batch aborts phases 2-4. Writes already made
//! stay in place; the caller gets a failed [`SyncResult`] carrying the
//! counters gathered so far.

use std::time::Instant;

use tracing::{error, info, warn};
use uuid::Uuid;

use albumlog_common::time::now_millis;

use crate::error::{Result, SyncError};
use crate::models::sync_log::SYNC_TYPE_RECENTLY_PLAYED;
use crate::models::{
    RecentlyPlayedItem, SyncLogStatus, SyncResult, SyncRun, SyncRunStatus, SyncSource, SyncStats,
};
use crate::services::provider::{MetadataProvider, PlayHistorySource};
use crate::store::SyncStore;

mod phase_albums;
mod phase_listens;
mod phase_tracks;

/// Drives a sync against an injected store and metadata provider
pub struct SyncOrchestrator<S, P> {
    store: S,
    provider: P,
}

/// Timing captured at the start of a sync
struct SyncClock {
    started_at: i64,
    start: Instant,
}

impl SyncClock {
    fn start() -> Self {
        Self {
            started_at: now_millis(),
            start: Instant::now(),
        }
    }
}

impl<S: SyncStore, P: MetadataProvider> SyncOrchestrator<S, P> {
    pub fn new(store: S, provider: P) -> Self {
        Self { store, provider }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Process one fetched batch for `user_id`
    ///
    /// Never returns an error: failures are reported through
    /// `SyncResult::success`/`error`, and recorded on the sync log and run.
    pub async fn sync_batch(&self, user_id: &str, items: &[RecentlyPlayedItem], source: SyncSource) -> SyncResult {
        self.run_batch(user_id, items, source, SyncClock::start()).await
    }

    async fn run_batch(
        &self,
        user_id: &str,
        items: &[RecentlyPlayedItem],
        source: SyncSource,
        clock: SyncClock,
    ) -> SyncResult {
        let mut stats = SyncStats::default();

        info!(user_id = %user_id, source = %source, items = items.len(), "Starting sync");

        let log_guid = match self.archive_batch(user_id, items).await {
            Ok(guid) => guid,
            Err(e) => return self.finish(user_id, source, None, clock, stats, Err(e)).await,
        };

        let outcome = self.process_batch(user_id, items, source, &mut stats).await;
        self.finish(user_id, source, Some(log_guid), clock, stats, outcome).await
    }

    /// Re-run every `pending` sync log from its archived batch
    ///
    /// Used after a crash left logs unfinished. Each log is processed as a
    /// `replay` sync and gets its own result and sync run.
    pub async fn replay_pending_logs(&self) -> Result<Vec<SyncResult>> {
        let logs = self.store.pending_sync_logs().await?;
        info!(pending = logs.len(), "Replaying pending sync logs");

        let mut results = Vec::with_capacity(logs.len());
        for log in logs {
            let clock = SyncClock::start();
            let mut stats = SyncStats::default();

            let outcome = match serde_json::from_str::<Vec<RecentlyPlayedItem>>(&log.raw_response) {
                Ok(items) => {
                    self.process_batch(&log.user_id, &items, SyncSource::Replay, &mut stats)
                        .await
                }
                Err(e) => Err(SyncError::InvalidBatch(format!(
                    "archived batch {} is not readable: {}",
                    log.guid, e
                ))),
            };

            results.push(
                self.finish(&log.user_id, SyncSource::Replay, Some(log.guid), clock, stats, outcome)
                    .await,
            );
        }

        Ok(results)
    }

    async fn archive_batch(&self, user_id: &str, items: &[RecentlyPlayedItem]) -> Result<Uuid> {
        let raw = serde_json::to_string(items)
            .map_err(|e| SyncError::InvalidBatch(format!("batch could not be serialized: {}", e)))?;

        Ok(self
            .store
            .create_sync_log(user_id, SYNC_TYPE_RECENTLY_PLAYED, &raw)
            .await?)
    }

    /// Phases 2-4; `stats` keeps whatever was counted before a failure
    async fn process_batch(
        &self,
        user_id: &str,
        items: &[RecentlyPlayedItem],
        source: SyncSource,
        stats: &mut SyncStats,
    ) -> Result<()> {
        self.phase_tracks(user_id, items, stats).await?;
        let (groups, resolved) = self.phase_albums(user_id, items, stats).await?;
        self.phase_listens(user_id, &groups, &resolved, source, stats).await
    }

    /// Mark the sync log, save the run, build the result
    ///
    /// Bookkeeping failures here are logged and do not change the outcome.
    async fn finish(
        &self,
        user_id: &str,
        source: SyncSource,
        log_guid: Option<Uuid>,
        clock: SyncClock,
        stats: SyncStats,
        outcome: Result<()>,
    ) -> SyncResult {
        let error_message = outcome.as_ref().err().map(|e| e.to_string());

        if let Some(guid) = log_guid {
            let status = if error_message.is_some() {
                SyncLogStatus::Failed
            } else {
                SyncLogStatus::Processed
            };
            if let Err(e) = self
                .store
                .update_sync_log_status(guid, status, error_message.as_deref())
                .await
            {
                warn!(sync_log = %guid, error = %e, "Failed to update sync log status");
            }
        }

        let completed_at = now_millis();
        let duration_ms = clock.start.elapsed().as_millis() as u64;

        let run = SyncRun {
            guid: Uuid::new_v4(),
            user_id: user_id.to_string(),
            source,
            status: if error_message.is_some() {
                SyncRunStatus::Failed
            } else {
                SyncRunStatus::Success
            },
            started_at: clock.started_at,
            completed_at,
            duration_ms,
            error: error_message.clone(),
            stats: stats.clone(),
        };

        if let Err(e) = self.store.save_sync_run(&run).await {
            warn!(sync_run = %run.guid, error = %e, "Failed to save sync run");
        }

        match &error_message {
            None => info!(
                user_id = %user_id,
                source = %source,
                duration_ms,
                tracks = stats.tracks_from_api,
                new_albums = stats.new_albums_discovered,
                listens_recorded = stats.album_listens_recorded,
                "Sync completed"
            ),
            Some(message) => error!(
                user_id = %user_id,
                source = %source,
                duration_ms,
                error = %message,
                "Sync failed"
            ),
        }

        SyncResult {
            success: error_message.is_none(),
            duration_ms,
            error: error_message,
            stats,
        }
    }
}

impl<S: SyncStore, P: MetadataProvider + PlayHistorySource> SyncOrchestrator<S, P> {
    /// Fetch the latest plays from the provider and sync them
    ///
    /// A failed fetch archives nothing but still saves a failed sync run.
    pub async fn sync_recently_played(&self, user_id: &str, limit: u32, source: SyncSource) -> SyncResult {
        let clock = SyncClock::start();

        match self.provider.recently_played(limit).await {
            Ok(items) => self.run_batch(user_id, &items, source, clock).await,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to fetch recently played tracks");
                self.finish(user_id, source, None, clock, SyncStats::default(), Err(e.into()))
                    .await
            }
        }
    }
}
