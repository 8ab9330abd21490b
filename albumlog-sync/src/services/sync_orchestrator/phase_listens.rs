//! Phase 4: LISTENS
//!
//! Runs session detection for every resolved album and records each session
//! that does not overlap a listen already on file.

use std::collections::HashMap;

use albumlog_common::time::now_millis;

use super::phase_albums::ResolvedAlbums;
use super::SyncOrchestrator;
use crate::detection::{detect_all_album_listens, AlbumGroups};
use crate::error::Result;
use crate::models::{ListenOutcome, PlayEvent, RecordedListen, SyncSource, SyncStats};
use crate::services::provider::MetadataProvider;
use crate::store::SyncStore;

impl<S: SyncStore, P: MetadataProvider> SyncOrchestrator<S, P> {
    pub(super) async fn phase_listens(
        &self,
        user_id: &str,
        groups: &AlbumGroups,
        resolved: &ResolvedAlbums,
        source: SyncSource,
        stats: &mut SyncStats,
    ) -> Result<()> {
        let album_total_tracks: HashMap<String, u32> = resolved
            .iter()
            .map(|(album_id, album)| (album_id.clone(), album.total_tracks))
            .collect();

        // Grouping order is preserved by detection, so listens are recorded album by album
        let plays: Vec<PlayEvent> = groups
            .iter()
            .flat_map(|(_, album_plays)| album_plays.iter().cloned())
            .collect();
        let sessions = detect_all_album_listens(&plays, &album_total_tracks);

        for session in &sessions {
            let Some(album) = resolved.get(&session.album_id) else {
                continue;
            };

            let listen = RecordedListen::from_session(
                user_id,
                album.guid,
                session,
                source.listen_source(),
                now_millis(),
            );

            match self.store.record_listen(&listen).await? {
                ListenOutcome::Recorded => {
                    tracing::info!(
                        user_id = %user_id,
                        album = %album.name,
                        tracks = session.track_ids.len(),
                        earliest_played_at = session.earliest_played_at,
                        latest_played_at = session.latest_played_at,
                        "Recorded album listen"
                    );
                    stats.album_listens_recorded += 1;
                    stats.recorded_listen_album_names.push(album.name.clone());
                }
                ListenOutcome::Duplicate => {
                    tracing::debug!(
                        user_id = %user_id,
                        album = %album.name,
                        "Listen already recorded"
                    );
                }
            }
        }

        Ok(())
    }
}
