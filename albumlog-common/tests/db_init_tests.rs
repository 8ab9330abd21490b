//! Tests for database initialization

use albumlog_common::db::{create_schema, init_database, init_in_memory_database};

const TABLES: [&str; 6] = [
    "albums",
    "tracks",
    "album_listens",
    "user_albums",
    "sync_logs",
    "sync_runs",
];

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("sub").join("albumlog.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("albumlog.db");

    let pool1 = init_database(&db_path).await.unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_all_tables_created() {
    let pool = init_in_memory_database().await.unwrap();

    for table in TABLES {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();

        assert_eq!(count, 1, "table {} missing", table);
    }
}

#[tokio::test]
async fn test_schema_creation_is_idempotent() {
    let pool = init_in_memory_database().await.unwrap();

    create_schema(&pool).await.unwrap();
    create_schema(&pool).await.unwrap();
}

#[tokio::test]
async fn test_listen_window_check_constraint() {
    let pool = init_in_memory_database().await.unwrap();

    sqlx::query(
        r#"
        INSERT INTO albums (guid, spotify_album_id, name, artist_name, total_tracks, created_at, updated_at)
        VALUES ('a1', 'sp-1', 'Album', 'Artist', 10, 0, 0)
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();

    let result = sqlx::query(
        r#"
        INSERT INTO album_listens (guid, user_id, album_guid, listened_at, earliest_played_at, latest_played_at, source)
        VALUES ('l1', 'u1', 'a1', 0, 200, 100, 'manual')
        "#,
    )
    .execute(&pool)
    .await;

    assert!(result.is_err(), "earliest > latest must be rejected");
}
