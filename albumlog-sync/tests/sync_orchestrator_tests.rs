//! End-to-end sync tests against an in-memory SQLite store

mod helpers;

use albumlog_sync::db::tracks::load_track;
use albumlog_sync::models::sync_log::SYNC_TYPE_RECENTLY_PLAYED;
use albumlog_sync::models::{ListenSource, PlayedTrack, SyncRunStatus, SyncSource};
use albumlog_sync::{SqliteStore, SyncLogStore, SyncOrchestrator, TrackStore};
use helpers::fixtures::{track_id, BASE_TIME};
use helpers::{album_details, memory_store, play_item, straight_through, FakeProvider, MINUTE};
use sqlx::Row;

async fn sync_log_statuses(store: &SqliteStore) -> Vec<(String, Option<String>)> {
    sqlx::query("SELECT status, error FROM sync_logs ORDER BY created_at, rowid")
        .fetch_all(store.pool())
        .await
        .unwrap()
        .iter()
        .map(|row| (row.get("status"), row.get("error")))
        .collect()
}

#[tokio::test]
async fn test_full_album_recorded_once_across_syncs() {
    let provider = FakeProvider::new().with_album(album_details("al1", "Record", 10));
    let orchestrator = SyncOrchestrator::new(memory_store().await, provider);
    let items = straight_through("al1", "Record", 10, BASE_TIME);

    let first = orchestrator.sync_batch("u1", &items, SyncSource::Manual).await;
    assert!(first.success, "{:?}", first.error);
    assert_eq!(first.stats.tracks_from_api, 10);
    assert_eq!(first.stats.unique_tracks_from_api, 10);
    assert_eq!(first.stats.new_tracks_added, 10);
    assert_eq!(first.stats.unique_albums_from_api, 1);
    assert_eq!(first.stats.new_albums_discovered, 1);
    assert_eq!(first.stats.tracks_backfilled_from_albums, 0);
    assert_eq!(first.stats.albums_checked_for_listens, 1);
    assert_eq!(first.stats.album_listens_recorded, 1);
    assert_eq!(first.stats.new_album_names, vec!["Record".to_string()]);
    assert_eq!(first.stats.recorded_listen_album_names, vec!["Record".to_string()]);

    let second = orchestrator.sync_batch("u1", &items, SyncSource::Cron).await;
    assert!(second.success);
    assert_eq!(second.stats.existing_tracks_updated, 10);
    assert_eq!(second.stats.new_tracks_added, 0);
    assert_eq!(second.stats.albums_already_in_db, 1);
    assert_eq!(second.stats.new_albums_discovered, 0);
    assert_eq!(second.stats.album_listens_recorded, 0);

    // Metadata fetched once, then served from the cache
    assert_eq!(orchestrator.provider().album_calls(), vec!["al1".to_string()]);

    let store = orchestrator.store();
    let listens = store.list_listens("u1", 10).await.unwrap();
    assert_eq!(listens.len(), 1);
    assert_eq!(listens[0].listen.source, ListenSource::ManualSync);
    assert_eq!(listens[0].listen.earliest_played_at, BASE_TIME);
    assert_eq!(listens[0].listen.latest_played_at, BASE_TIME + 9 * 4 * MINUTE);

    let albums = store.list_user_albums("u1").await.unwrap();
    assert_eq!(albums.len(), 1);
    assert_eq!(albums[0].listen_count, 1);

    assert!(store.pending_sync_logs().await.unwrap().is_empty());
    let runs = store.recent_sync_runs("u1", 10).await.unwrap();
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|r| r.status == SyncRunStatus::Success));
}

#[tokio::test]
async fn test_interleaved_albums_record_one_listen_each() {
    let provider = FakeProvider::new()
        .with_album(album_details("a", "Alpha", 10))
        .with_album(album_details("b", "Beta", 10));
    let orchestrator = SyncOrchestrator::new(memory_store().await, provider);

    let mut items = Vec::new();
    for n in 1..=10 {
        items.push(play_item("a", "Alpha", n, BASE_TIME + n * 2 * MINUTE));
        items.push(play_item("b", "Beta", n, BASE_TIME + n * 2 * MINUTE + MINUTE));
    }

    let result = orchestrator.sync_batch("u1", &items, SyncSource::Manual).await;
    assert!(result.success);
    assert_eq!(result.stats.unique_albums_from_api, 2);
    assert_eq!(result.stats.album_listens_recorded, 2);
    assert_eq!(
        result.stats.recorded_listen_album_names,
        vec!["Alpha".to_string(), "Beta".to_string()]
    );
}

#[tokio::test]
async fn test_album_fetch_failure_only_skips_that_album() {
    let provider = FakeProvider::new()
        .with_album(album_details("good", "Good Record", 10))
        .with_failing_album("bad");
    let orchestrator = SyncOrchestrator::new(memory_store().await, provider);

    let mut items = straight_through("good", "Good Record", 10, BASE_TIME);
    items.extend(straight_through("bad", "Bad Record", 10, BASE_TIME + 120 * MINUTE));

    let result = orchestrator.sync_batch("u1", &items, SyncSource::Manual).await;
    assert!(result.success);
    assert_eq!(result.stats.albums_checked_for_listens, 2);
    assert_eq!(result.stats.albums_fetch_failed, 1);
    assert_eq!(result.stats.new_albums_discovered, 1);
    assert_eq!(result.stats.album_listens_recorded, 1);
    assert_eq!(result.stats.recorded_listen_album_names, vec!["Good Record".to_string()]);

    // Plays of the failed album are still tracked
    assert!(orchestrator
        .store()
        .track_exists("u1", &track_id("bad", 1))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_new_album_backfills_unplayed_tracks() {
    let store = memory_store().await;

    // Known track with no album id yet
    let orphan = PlayedTrack {
        track_id: track_id("al1", 11),
        track_name: "Song 11".to_string(),
        artist_name: "Band".to_string(),
        album_name: None,
        album_image_url: None,
        spotify_album_id: None,
        track_data: None,
        played_at: BASE_TIME - 60 * MINUTE,
    };
    store.upsert_played_tracks("u1", &[orphan]).await.unwrap();

    let provider = FakeProvider::new().with_album(album_details("al1", "Long Record", 12));
    let orchestrator = SyncOrchestrator::new(store, provider);

    let mut items: Vec<_> = (1..=9)
        .map(|n| play_item("al1", "Long Record", n, BASE_TIME + n * 4 * MINUTE))
        .collect();
    items.reverse();

    let result = orchestrator.sync_batch("u1", &items, SyncSource::Manual).await;
    assert!(result.success);
    // Tracks 10 and 12 are new placeholders; 11 already existed
    assert_eq!(result.stats.tracks_backfilled_from_albums, 2);
    assert_eq!(result.stats.album_listens_recorded, 1);

    let pool = orchestrator.store().pool();
    let placeholder = load_track(pool, "u1", &track_id("al1", 12)).await.unwrap().unwrap();
    assert_eq!(placeholder.last_played_at, None);
    assert_eq!(placeholder.spotify_album_id.as_deref(), Some("al1"));
    assert_eq!(placeholder.album_name.as_deref(), Some("Long Record"));

    let attached = load_track(pool, "u1", &track_id("al1", 11)).await.unwrap().unwrap();
    assert_eq!(attached.spotify_album_id.as_deref(), Some("al1"));
    assert_eq!(attached.last_played_at, Some(BASE_TIME - 60 * MINUTE));
    assert_eq!(attached.album_name, None);
}

#[tokio::test]
async fn test_last_played_never_moves_backwards() {
    let provider = FakeProvider::new().with_album(album_details("al1", "Record", 10));
    let orchestrator = SyncOrchestrator::new(memory_store().await, provider);

    let newer = play_item("al1", "Record", 3, BASE_TIME + 30 * MINUTE);
    let older = play_item("al1", "Record", 3, BASE_TIME);

    assert!(orchestrator.sync_batch("u1", &[newer], SyncSource::Manual).await.success);
    assert!(orchestrator.sync_batch("u1", &[older], SyncSource::Manual).await.success);

    let track = load_track(orchestrator.store().pool(), "u1", &track_id("al1", 3))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(track.last_played_at, Some(BASE_TIME + 30 * MINUTE));
    assert_eq!(track.last_seen_at, BASE_TIME + 30 * MINUTE);
}

#[tokio::test]
async fn test_store_failure_fails_sync_and_is_recorded() {
    let store = memory_store().await;
    sqlx::query("DROP TABLE album_listens")
        .execute(store.pool())
        .await
        .unwrap();

    let provider = FakeProvider::new().with_album(album_details("al1", "Record", 10));
    let orchestrator = SyncOrchestrator::new(store, provider);
    let items = straight_through("al1", "Record", 10, BASE_TIME);

    let result = orchestrator.sync_batch("u1", &items, SyncSource::Cron).await;
    assert!(!result.success);
    assert!(result.error.is_some());
    // Counters gathered before the failure are kept
    assert_eq!(result.stats.tracks_from_api, 10);
    assert_eq!(result.stats.new_albums_discovered, 1);
    assert_eq!(result.stats.album_listens_recorded, 0);
    assert!(result.summary().starts_with("Failed after"));

    let store = orchestrator.store();
    let statuses = sync_log_statuses(store).await;
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].0, "failed");
    assert_eq!(statuses[0].1, result.error);

    let runs = store.recent_sync_runs("u1", 10).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, SyncRunStatus::Failed);
    assert_eq!(runs[0].source, SyncSource::Cron);
    assert_eq!(runs[0].stats, result.stats);
}

#[tokio::test]
async fn test_unparseable_timestamp_fails_batch() {
    let provider = FakeProvider::new().with_album(album_details("al1", "Record", 10));
    let orchestrator = SyncOrchestrator::new(memory_store().await, provider);

    let mut items = straight_through("al1", "Record", 10, BASE_TIME);
    items[4].played_at = "yesterday".to_string();

    let result = orchestrator.sync_batch("u1", &items, SyncSource::Manual).await;
    assert!(!result.success);
    assert!(result.error.as_deref().unwrap_or_default().contains("Invalid batch"));
    assert_eq!(sync_log_statuses(orchestrator.store()).await[0].0, "failed");
}

#[tokio::test]
async fn test_replay_processes_pending_logs() {
    let store = memory_store().await;
    let items = straight_through("al1", "Record", 10, BASE_TIME);

    store
        .create_sync_log("u1", SYNC_TYPE_RECENTLY_PLAYED, &serde_json::to_string(&items).unwrap())
        .await
        .unwrap();
    store
        .create_sync_log("u1", SYNC_TYPE_RECENTLY_PLAYED, "{not json")
        .await
        .unwrap();

    let provider = FakeProvider::new().with_album(album_details("al1", "Record", 10));
    let orchestrator = SyncOrchestrator::new(store, provider);

    let results = orchestrator.replay_pending_logs().await.unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0].success);
    assert_eq!(results[0].stats.album_listens_recorded, 1);
    assert!(!results[1].success);

    let store = orchestrator.store();
    assert!(store.pending_sync_logs().await.unwrap().is_empty());

    let statuses: Vec<String> = sync_log_statuses(store).await.into_iter().map(|(s, _)| s).collect();
    assert_eq!(statuses, vec!["processed".to_string(), "failed".to_string()]);

    let listens = store.list_listens("u1", 10).await.unwrap();
    assert_eq!(listens[0].listen.source, ListenSource::ReplaySync);

    let runs = store.recent_sync_runs("u1", 10).await.unwrap();
    assert!(runs.iter().all(|r| r.source == SyncSource::Replay));

    // Nothing left to replay
    assert!(orchestrator.replay_pending_logs().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_sync_recently_played_fetches_history() {
    let provider = FakeProvider::new()
        .with_album(album_details("al1", "Record", 10))
        .with_history(straight_through("al1", "Record", 10, BASE_TIME));
    let orchestrator = SyncOrchestrator::new(memory_store().await, provider);

    let result = orchestrator.sync_recently_played("u1", 50, SyncSource::Cron).await;
    assert!(result.success);
    assert_eq!(result.stats.tracks_from_api, 10);
    assert_eq!(result.stats.album_listens_recorded, 1);
}

#[tokio::test]
async fn test_history_fetch_failure_saves_failed_run_without_log() {
    let provider = FakeProvider::new().with_failing_history();
    let orchestrator = SyncOrchestrator::new(memory_store().await, provider);

    let result = orchestrator.sync_recently_played("u1", 50, SyncSource::Cron).await;
    assert!(!result.success);
    assert!(result.error.as_deref().unwrap_or_default().contains("Unauthorized"));

    let store = orchestrator.store();
    assert!(sync_log_statuses(store).await.is_empty());

    let runs = store.recent_sync_runs("u1", 10).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, SyncRunStatus::Failed);
}
