//! Phase 2: TRACKS
//!
//! Batch counters, new/existing classification and per-play upserts.

use std::collections::HashSet;

use super::SyncOrchestrator;
use crate::error::Result;
use crate::models::{PlayedTrack, RecentlyPlayedItem, SyncStats};
use crate::services::provider::MetadataProvider;
use crate::store::SyncStore;

impl<S: SyncStore, P: MetadataProvider> SyncOrchestrator<S, P> {
    pub(super) async fn phase_tracks(
        &self,
        user_id: &str,
        items: &[RecentlyPlayedItem],
        stats: &mut SyncStats,
    ) -> Result<()> {
        stats.tracks_from_api = items.len();

        // First-occurrence order so classification is deterministic
        let mut seen = HashSet::new();
        let unique_track_ids: Vec<&str> = items
            .iter()
            .map(|item| item.track.id.as_str())
            .filter(|id| seen.insert(*id))
            .collect();
        stats.unique_tracks_from_api = unique_track_ids.len();

        stats.unique_albums_from_api = items
            .iter()
            .map(|item| item.track.album.id.as_str())
            .collect::<HashSet<_>>()
            .len();

        for track_id in &unique_track_ids {
            if self.store.track_exists(user_id, track_id).await? {
                stats.existing_tracks_updated += 1;
            } else {
                stats.new_tracks_added += 1;
            }
        }

        let played = items
            .iter()
            .map(PlayedTrack::from_item)
            .collect::<Result<Vec<_>>>()?;
        self.store.upsert_played_tracks(user_id, &played).await?;

        tracing::debug!(
            user_id = %user_id,
            plays = stats.tracks_from_api,
            new = stats.new_tracks_added,
            existing = stats.existing_tracks_updated,
            "Tracks updated"
        );

        Ok(())
    }
}
