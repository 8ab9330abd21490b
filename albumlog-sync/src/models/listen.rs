//! Play events, detected listen sessions, and recorded listens

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// One track play
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayEvent {
    pub track_id: String,
    /// 1-based position within the album; not validated
    pub track_number: i64,
    /// Epoch milliseconds
    pub played_at: i64,
    pub album_id: String,
}

/// A detected pass through one album
///
/// Only produced by the detector, so it always satisfies the validity rules:
/// `track_ids` is non-empty and `earliest_played_at <= latest_played_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenSession {
    pub album_id: String,
    /// Distinct track ids in first-play order
    pub track_ids: Vec<String>,
    pub earliest_played_at: i64,
    pub latest_played_at: i64,
}

impl ListenSession {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.earliest_played_at, self.latest_played_at)
    }
}

/// Closed interval of epoch milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub earliest: i64,
    pub latest: i64,
}

impl TimeWindow {
    pub fn new(earliest: i64, latest: i64) -> Self {
        Self { earliest, latest }
    }

    /// Single-instant window
    pub fn at(instant: i64) -> Self {
        Self::new(instant, instant)
    }

    /// Closed-interval intersection; touching endpoints count as overlapping
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.earliest <= other.latest && self.latest >= other.earliest
    }
}

/// Where a recorded listen came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenSource {
    /// Detected during a user-triggered sync
    ManualSync,
    /// Detected during a scheduled sync
    CronSync,
    /// Detected while replaying an archived batch
    ReplaySync,
    /// Entered by hand
    Manual,
}

impl ListenSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListenSource::ManualSync => "manual_sync",
            ListenSource::CronSync => "cron_sync",
            ListenSource::ReplaySync => "replay_sync",
            ListenSource::Manual => "manual",
        }
    }
}

impl fmt::Display for ListenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListenSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual_sync" => Ok(ListenSource::ManualSync),
            "cron_sync" => Ok(ListenSource::CronSync),
            "replay_sync" => Ok(ListenSource::ReplaySync),
            "manual" => Ok(ListenSource::Manual),
            other => Err(format!("unknown listen source '{}'", other)),
        }
    }
}

/// Persisted album listen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedListen {
    pub guid: Uuid,
    pub user_id: String,
    pub album_guid: Uuid,
    /// When the listen was recorded (or the user-supplied time for manual listens)
    pub listened_at: i64,
    pub earliest_played_at: i64,
    pub latest_played_at: i64,
    pub track_ids: Vec<String>,
    pub source: ListenSource,
}

impl RecordedListen {
    /// Listen for a detected session, recorded at `recorded_at`
    pub fn from_session(
        user_id: &str,
        album_guid: Uuid,
        session: &ListenSession,
        source: ListenSource,
        recorded_at: i64,
    ) -> Self {
        Self {
            guid: Uuid::new_v4(),
            user_id: user_id.to_string(),
            album_guid,
            listened_at: recorded_at,
            earliest_played_at: session.earliest_played_at,
            latest_played_at: session.latest_played_at,
            track_ids: session.track_ids.clone(),
            source,
        }
    }

    /// Hand-entered listen at a single instant, with no track detail
    pub fn manual(user_id: &str, album_guid: Uuid, listened_at: i64) -> Self {
        Self {
            guid: Uuid::new_v4(),
            user_id: user_id.to_string(),
            album_guid,
            listened_at,
            earliest_played_at: listened_at,
            latest_played_at: listened_at,
            track_ids: Vec::new(),
            source: ListenSource::Manual,
        }
    }

    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.earliest_played_at, self.latest_played_at)
    }
}

/// Result of trying to record a listen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenOutcome {
    Recorded,
    /// An existing listen already covers this window
    Duplicate,
}

/// Listen count and first/last listen times for one (user, album)
///
/// First/last are taken from the listens' played-at windows, for detected
/// and manual listens alike, so incremental updates and recomputation after a
/// deletion always agree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumAggregate {
    pub user_id: String,
    pub album_guid: Uuid,
    pub listen_count: i64,
    pub first_listened_at: i64,
    pub last_listened_at: i64,
}

impl AlbumAggregate {
    /// Aggregate for a first listen
    pub fn seed(user_id: &str, album_guid: Uuid, window: TimeWindow) -> Self {
        Self {
            user_id: user_id.to_string(),
            album_guid,
            listen_count: 1,
            first_listened_at: window.earliest,
            last_listened_at: window.latest,
        }
    }

    /// Count one more listen and widen first/last to cover it
    pub fn absorb(&mut self, window: TimeWindow) {
        self.listen_count += 1;
        self.first_listened_at = self.first_listened_at.min(window.earliest);
        self.last_listened_at = self.last_listened_at.max(window.latest);
    }

    /// Rebuild from the listens that remain; `None` when there are none left
    pub fn recompute(user_id: &str, album_guid: Uuid, listens: &[RecordedListen]) -> Option<Self> {
        let first = listens.iter().map(|l| l.earliest_played_at).min()?;
        let last = listens.iter().map(|l| l.latest_played_at).max()?;

        Some(Self {
            user_id: user_id.to_string(),
            album_guid,
            listen_count: listens.len() as i64,
            first_listened_at: first,
            last_listened_at: last,
        })
    }
}
