//! Sync log database operations
//!
//! A sync log archives a fetched batch before anything is interpreted, so a
//! crashed or failed sync can be replayed from the raw response.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use albumlog_common::time::now_millis;
use albumlog_common::{Error, Result};

use super::{parse_guid, SqliteStore};
use crate::models::{SyncLog, SyncLogStatus, SyncRun};
use crate::store::SyncLogStore;
use crate::utils::retry_on_lock;

const SYNC_LOG_COLUMNS: &str = "guid, user_id, sync_type, raw_response, status, processed_at, error, created_at";

fn sync_log_from_row(row: &SqliteRow) -> Result<SyncLog> {
    let guid: String = row.get("guid");
    let status: String = row.get("status");

    Ok(SyncLog {
        guid: parse_guid(&guid)?,
        user_id: row.get("user_id"),
        sync_type: row.get("sync_type"),
        raw_response: row.get("raw_response"),
        status: status.parse().map_err(Error::Internal)?,
        processed_at: row.get("processed_at"),
        error: row.get("error"),
        created_at: row.get("created_at"),
    })
}

pub async fn insert_sync_log(pool: &SqlitePool, log: &SyncLog) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sync_logs (guid, user_id, sync_type, raw_response, status, processed_at, error, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(log.guid.to_string())
    .bind(&log.user_id)
    .bind(&log.sync_type)
    .bind(&log.raw_response)
    .bind(log.status.as_str())
    .bind(log.processed_at)
    .bind(&log.error)
    .bind(log.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Set status; `processed_at` is stamped for terminal states
pub async fn set_sync_log_status(
    pool: &SqlitePool,
    guid: Uuid,
    status: SyncLogStatus,
    error: Option<&str>,
    now: i64,
) -> Result<()> {
    let processed_at = match status {
        SyncLogStatus::Pending => None,
        SyncLogStatus::Processed | SyncLogStatus::Failed => Some(now),
    };

    let result = sqlx::query("UPDATE sync_logs SET status = ?, processed_at = ?, error = ? WHERE guid = ?")
        .bind(status.as_str())
        .bind(processed_at)
        .bind(error)
        .bind(guid.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("sync log {}", guid)));
    }

    Ok(())
}

pub async fn load_sync_log(pool: &SqlitePool, guid: Uuid) -> Result<Option<SyncLog>> {
    let row = sqlx::query(&format!("SELECT {} FROM sync_logs WHERE guid = ?", SYNC_LOG_COLUMNS))
        .bind(guid.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(sync_log_from_row).transpose()
}

pub async fn load_pending_sync_logs(pool: &SqlitePool) -> Result<Vec<SyncLog>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM sync_logs WHERE status = ? ORDER BY created_at, rowid",
        SYNC_LOG_COLUMNS
    ))
    .bind(SyncLogStatus::Pending.as_str())
    .fetch_all(pool)
    .await?;

    rows.iter().map(sync_log_from_row).collect()
}

#[async_trait]
impl SyncLogStore for SqliteStore {
    async fn create_sync_log(&self, user_id: &str, sync_type: &str, raw_response: &str) -> Result<Uuid> {
        let log = SyncLog {
            guid: Uuid::new_v4(),
            user_id: user_id.to_string(),
            sync_type: sync_type.to_string(),
            raw_response: raw_response.to_string(),
            status: SyncLogStatus::Pending,
            processed_at: None,
            error: None,
            created_at: now_millis(),
        };
        let pool = self.pool();
        let log_ref = &log;

        retry_on_lock("archive sync log", self.max_lock_wait_ms(), move || async move {
            insert_sync_log(pool, log_ref).await
        })
        .await?;

        Ok(log.guid)
    }

    async fn update_sync_log_status(
        &self,
        guid: Uuid,
        status: SyncLogStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let pool = self.pool();

        retry_on_lock("update sync log", self.max_lock_wait_ms(), move || async move {
            set_sync_log_status(pool, guid, status, error, now_millis()).await
        })
        .await
    }

    async fn pending_sync_logs(&self) -> Result<Vec<SyncLog>> {
        load_pending_sync_logs(self.pool()).await
    }

    async fn save_sync_run(&self, run: &SyncRun) -> Result<()> {
        let pool = self.pool();

        retry_on_lock("save sync run", self.max_lock_wait_ms(), move || async move {
            super::sync_runs::save_sync_run(pool, run).await
        })
        .await
    }
}
