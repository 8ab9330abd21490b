//! Service modules: external providers and the sync workflow

pub mod provider;
pub mod spotify_client;
pub mod sync_orchestrator;

pub use provider::{MetadataProvider, PlayHistorySource, ProviderError};
pub use spotify_client::SpotifyClient;
pub use sync_orchestrator::SyncOrchestrator;
