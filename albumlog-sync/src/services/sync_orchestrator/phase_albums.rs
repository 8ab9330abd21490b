//! Phase 3: ALBUMS
//!
//! Groups the batch by album and makes sure every album has metadata.
//! Albums already cached are used as-is; the rest are fetched one at a time.
//! A failed fetch only drops that album from listen detection.

use std::collections::HashMap;

use super::SyncOrchestrator;
use crate::detection::{group_plays_by_album, AlbumGroups};
use crate::error::Result;
use crate::models::{RecentlyPlayedItem, StoredAlbum, SyncStats};
use crate::services::provider::MetadataProvider;
use crate::store::SyncStore;

/// Albums with usable metadata, keyed by Spotify album id
pub(super) type ResolvedAlbums = HashMap<String, StoredAlbum>;

impl<S: SyncStore, P: MetadataProvider> SyncOrchestrator<S, P> {
    pub(super) async fn phase_albums(
        &self,
        user_id: &str,
        items: &[RecentlyPlayedItem],
        stats: &mut SyncStats,
    ) -> Result<(AlbumGroups, ResolvedAlbums)> {
        let plays = items
            .iter()
            .map(RecentlyPlayedItem::to_play_event)
            .collect::<Result<Vec<_>>>()?;

        let groups = group_plays_by_album(plays);
        stats.albums_checked_for_listens = groups.len();

        let mut resolved = ResolvedAlbums::new();

        for album_id in groups.album_ids() {
            if let Some(album) = self.store.find_album(album_id).await? {
                stats.albums_already_in_db += 1;
                resolved.insert(album_id.to_string(), album);
                continue;
            }

            let details = match self.provider.fetch_album(album_id).await {
                Ok(details) => details,
                Err(e) => {
                    tracing::warn!(album_id = %album_id, error = %e, "Failed to fetch album");
                    stats.albums_fetch_failed += 1;
                    continue;
                }
            };

            let album = self.store.upsert_album(&details).await?;
            let backfilled = self.store.backfill_album_tracks(user_id, &details).await?;

            tracing::info!(
                album_id = %album_id,
                name = %album.name,
                total_tracks = album.total_tracks,
                backfilled,
                "Discovered new album"
            );

            stats.new_albums_discovered += 1;
            stats.new_album_names.push(album.name.clone());
            stats.tracks_backfilled_from_albums += backfilled;
            resolved.insert(album_id.to_string(), album);
        }

        Ok((groups, resolved))
    }
}
