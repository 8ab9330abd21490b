//! Error types for albumlog-sync
//!
//! Metadata fetch failures are isolated per album by the orchestrator and
//! only surface here when a caller asks the provider directly. Store errors
//! and malformed batches abort the sync that hit them.

use thiserror::Error;

use crate::services::ProviderError;

/// Sync error type
#[derive(Debug, Error)]
pub enum SyncError {
    /// Database / store failure
    #[error("Store error: {0}")]
    Store(#[from] albumlog_common::Error),

    /// Metadata or history provider failure
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Batch content that cannot be interpreted (e.g. unparseable timestamps)
    #[error("Invalid batch: {0}")]
    InvalidBatch(String),
}

/// Result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
