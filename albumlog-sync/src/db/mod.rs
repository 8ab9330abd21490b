//! SQLite-backed store
//!
//! Each submodule holds the queries for one table group as free functions
//! and implements the matching store trait for [`SqliteStore`].

pub mod albums;
pub mod listens;
pub mod sync_logs;
pub mod sync_runs;
pub mod tracks;

use sqlx::SqlitePool;
use uuid::Uuid;

use albumlog_common::{Error, Result};

pub use listens::{ListenEntry, UserAlbumEntry};

/// Default ceiling for lock-contention retries
pub const DEFAULT_MAX_LOCK_WAIT_MS: u64 = 5000;

/// Store over a shared SQLite pool
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    max_lock_wait_ms: u64,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            max_lock_wait_ms: DEFAULT_MAX_LOCK_WAIT_MS,
        }
    }

    /// Override how long writes keep retrying while the database is locked
    pub fn with_max_lock_wait(mut self, max_lock_wait_ms: u64) -> Self {
        self.max_lock_wait_ms = max_lock_wait_ms;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn max_lock_wait_ms(&self) -> u64 {
        self.max_lock_wait_ms
    }
}

/// Parse a TEXT guid column
pub(crate) fn parse_guid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Invalid guid '{}': {}", value, e)))
}

/// Decode a JSON TEXT column
pub(crate) fn from_json_column<T: serde::de::DeserializeOwned>(column: &str, value: &str) -> Result<T> {
    serde_json::from_str(value).map_err(|e| Error::Internal(format!("Invalid JSON in {}: {}", column, e)))
}

/// Encode a value for a JSON TEXT column
pub(crate) fn to_json_column<T: serde::Serialize + ?Sized>(column: &str, value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::Internal(format!("Encode {} failed: {}", column, e)))
}
