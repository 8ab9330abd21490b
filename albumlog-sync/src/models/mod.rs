//! Data models for albumlog-sync

pub mod album;
pub mod listen;
pub mod spotify;
pub mod sync_log;
pub mod sync_result;
pub mod track;

pub use album::StoredAlbum;
pub use listen::{AlbumAggregate, ListenOutcome, ListenSession, ListenSource, PlayEvent, RecordedListen, TimeWindow};
pub use spotify::{AlbumDetails, AlbumTrackItem, RecentlyPlayedItem, SpotifyAlbumRef, SpotifyArtist, SpotifyImage, SpotifyTrack};
pub use sync_log::{SyncLog, SyncLogStatus, SyncRun, SyncRunStatus, SyncSource};
pub use sync_result::{SyncResult, SyncStats};
pub use track::{PlayedTrack, TrackRecord};
