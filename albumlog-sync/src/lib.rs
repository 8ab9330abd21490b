//! albumlog-sync library interface
//!
//! Album listen detection over a listening history, plus the sync workflow
//! that feeds it: archive a fetched batch, keep per-user track rows, resolve
//! album metadata, detect straight-through album listens and record the new
//! ones.

pub mod config;
pub mod db;
pub mod detection;
pub mod error;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

pub use crate::db::SqliteStore;
pub use crate::error::{Result, SyncError};
pub use crate::services::{MetadataProvider, PlayHistorySource, ProviderError, SpotifyClient, SyncOrchestrator};
pub use crate::store::{AlbumStore, ListenStore, SyncLogStore, SyncStore, TrackStore};
