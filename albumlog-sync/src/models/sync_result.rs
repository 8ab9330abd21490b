//! Sync statistics and the result handed back to callers
//!
//! Serialized in camelCase so the JSON output matches the field names the
//! history summary has always used (`tracksFromApi`, `albumListensRecorded`, ...).

use serde::{Deserialize, Serialize};

use albumlog_common::time::format_duration_secs;

/// Counters gathered while a batch is processed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStats {
    /// Plays in the batch
    pub tracks_from_api: usize,
    pub unique_tracks_from_api: usize,
    /// Unique tracks with no prior row for this user
    pub new_tracks_added: usize,
    pub existing_tracks_updated: usize,
    pub unique_albums_from_api: usize,
    pub albums_already_in_db: usize,
    pub new_albums_discovered: usize,
    pub albums_fetch_failed: usize,
    pub albums_checked_for_listens: usize,
    pub album_listens_recorded: usize,
    /// Placeholder rows added from album track listings
    pub tracks_backfilled_from_albums: usize,
    pub new_album_names: Vec<String>,
    pub recorded_listen_album_names: Vec<String>,
}

/// Outcome of one sync invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub success: bool,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub stats: SyncStats,
}

impl SyncResult {
    /// Human-readable summary; partial progress is shown for failed syncs too
    pub fn summary(&self) -> String {
        let s = &self.stats;
        let mut lines = Vec::new();

        if self.success {
            lines.push(format!("Completed in {}", format_duration_secs(self.duration_ms)));
        } else {
            lines.push(format!(
                "Failed after {}: {}",
                format_duration_secs(self.duration_ms),
                self.error.as_deref().unwrap_or("unknown error")
            ));
        }

        lines.push(String::new());
        lines.push("Tracks:".to_string());
        lines.push(format!(
            "  - {} from API ({} unique)",
            s.tracks_from_api, s.unique_tracks_from_api
        ));
        lines.push(format!(
            "  - {} new, {} updated",
            s.new_tracks_added, s.existing_tracks_updated
        ));

        lines.push(String::new());
        lines.push("Albums:".to_string());
        lines.push(format!("  - {} unique in batch", s.unique_albums_from_api));
        lines.push(format!("  - {} already known", s.albums_already_in_db));
        lines.push(format!("  - {} newly discovered", s.new_albums_discovered));
        if s.albums_fetch_failed > 0 {
            lines.push(format!("  - {} failed to fetch", s.albums_fetch_failed));
        }
        if s.tracks_backfilled_from_albums > 0 {
            lines.push(format!(
                "  - {} tracks backfilled",
                s.tracks_backfilled_from_albums
            ));
        }

        lines.push(String::new());
        lines.push("Listens:".to_string());
        lines.push(format!("  - {} albums checked", s.albums_checked_for_listens));
        lines.push(format!("  - {} listens recorded", s.album_listens_recorded));

        if !s.new_album_names.is_empty() {
            lines.push(String::new());
            lines.push("New albums:".to_string());
            lines.extend(s.new_album_names.iter().map(|n| format!("  - {}", n)));
        }

        if !s.recorded_listen_album_names.is_empty() {
            lines.push(String::new());
            lines.push("Listened to:".to_string());
            lines.extend(
                s.recorded_listen_album_names
                    .iter()
                    .map(|n| format!("  - {}", n)),
            );
        }

        lines.join("\n")
    }
}
