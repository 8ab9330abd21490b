//! Sync logs (archived raw batches) and sync runs (per-invocation stats)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::models::{ListenSource, SyncStats};

/// Sync type recorded for recently-played batches
pub const SYNC_TYPE_RECENTLY_PLAYED: &str = "recently_played";

/// What triggered a sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncSource {
    Manual,
    Cron,
    Replay,
}

impl SyncSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncSource::Manual => "manual",
            SyncSource::Cron => "cron",
            SyncSource::Replay => "replay",
        }
    }

    /// Source stamped on listens detected by this kind of sync
    pub fn listen_source(&self) -> ListenSource {
        match self {
            SyncSource::Manual => ListenSource::ManualSync,
            SyncSource::Cron => ListenSource::CronSync,
            SyncSource::Replay => ListenSource::ReplaySync,
        }
    }
}

impl fmt::Display for SyncSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(SyncSource::Manual),
            "cron" => Ok(SyncSource::Cron),
            "replay" => Ok(SyncSource::Replay),
            other => Err(format!("unknown sync source '{}'", other)),
        }
    }
}

/// Lifecycle of an archived batch: pending → processed | failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncLogStatus {
    Pending,
    Processed,
    Failed,
}

impl SyncLogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncLogStatus::Pending => "pending",
            SyncLogStatus::Processed => "processed",
            SyncLogStatus::Failed => "failed",
        }
    }
}

impl FromStr for SyncLogStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SyncLogStatus::Pending),
            "processed" => Ok(SyncLogStatus::Processed),
            "failed" => Ok(SyncLogStatus::Failed),
            other => Err(format!("unknown sync log status '{}'", other)),
        }
    }
}

/// Archived raw batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncLog {
    pub guid: Uuid,
    pub user_id: String,
    pub sync_type: String,
    /// Verbatim JSON of the fetched batch
    pub raw_response: String,
    pub status: SyncLogStatus,
    pub processed_at: Option<i64>,
    pub error: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncRunStatus {
    Success,
    Failed,
}

impl SyncRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncRunStatus::Success => "success",
            SyncRunStatus::Failed => "failed",
        }
    }
}

impl FromStr for SyncRunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(SyncRunStatus::Success),
            "failed" => Ok(SyncRunStatus::Failed),
            other => Err(format!("unknown sync run status '{}'", other)),
        }
    }
}

/// One sync invocation, successful or not
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRun {
    pub guid: Uuid,
    pub user_id: String,
    pub source: SyncSource,
    pub status: SyncRunStatus,
    pub started_at: i64,
    pub completed_at: i64,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub stats: SyncStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_source_maps_to_listen_source() {
        assert_eq!(SyncSource::Manual.listen_source(), ListenSource::ManualSync);
        assert_eq!(SyncSource::Cron.listen_source(), ListenSource::CronSync);
        assert_eq!(SyncSource::Replay.listen_source(), ListenSource::ReplaySync);
    }

    #[test]
    fn test_status_strings_parse_back() {
        for status in [SyncLogStatus::Pending, SyncLogStatus::Processed, SyncLogStatus::Failed] {
            assert_eq!(status.as_str().parse::<SyncLogStatus>().unwrap(), status);
        }
        for status in [SyncRunStatus::Success, SyncRunStatus::Failed] {
            assert_eq!(status.as_str().parse::<SyncRunStatus>().unwrap(), status);
        }
        assert!("cron".parse::<SyncSource>().is_ok());
        assert!("hourly".parse::<SyncSource>().is_err());
    }
}
