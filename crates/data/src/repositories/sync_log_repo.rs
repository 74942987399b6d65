//! Append-only sync log repository.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use stocklens_core::store::{SyncKind, SyncLogStore, SyncStatus};

use crate::models::SyncLogRecord;

fn parse_kind(raw: &str) -> SyncKind {
    match raw {
        "POSITIONS" => SyncKind::Positions,
        "TRADES" => SyncKind::Trades,
        "KLINES" => SyncKind::Klines,
        "WATCHLIST" => SyncKind::Watchlist,
        _ => SyncKind::All,
    }
}

fn parse_status(raw: &str) -> SyncStatus {
    match raw {
        "SUCCESS" => SyncStatus::Success,
        "FAILED" => SyncStatus::Failed,
        _ => SyncStatus::Partial,
    }
}

#[derive(Debug, Clone)]
pub struct SyncLogRepository {
    pool: PgPool,
}

impl SyncLogRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Appends one log row.
    ///
    /// # Errors
    /// Returns an error when the insert fails.
    pub async fn insert(&self, record: &stocklens_core::store::SyncLogRecord) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO sync_logs
            (user_id, sync_type, status, records_count, error_message,
             started_at, finished_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(record.user_id)
        .bind(record.kind.as_str())
        .bind(record.status.as_str())
        .bind(record.records_count)
        .bind(&record.error)
        .bind(record.started_at)
        .bind(record.finished_at)
        .execute(&self.pool)
        .await
        .context("failed to insert sync log")?;

        Ok(())
    }

    /// Most recent log row for a user and kind.
    ///
    /// # Errors
    /// Returns an error when the query fails.
    pub async fn latest(&self, user_id: i64, kind: SyncKind) -> Result<Option<SyncLogRecord>> {
        let record = sqlx::query_as::<_, SyncLogRecord>(
            r"
            SELECT id, user_id, sync_type, status, records_count,
                   error_message, started_at, finished_at
            FROM sync_logs
            WHERE user_id = $1 AND sync_type = $2
            ORDER BY started_at DESC
            LIMIT 1
            ",
        )
        .bind(user_id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("failed to query latest sync log")?;

        Ok(record)
    }
}

#[async_trait]
impl SyncLogStore for SyncLogRepository {
    async fn append(&self, record: &stocklens_core::store::SyncLogRecord) -> Result<()> {
        self.insert(record).await
    }

    async fn last(
        &self,
        user_id: i64,
        kind: SyncKind,
    ) -> Result<Option<stocklens_core::store::SyncLogRecord>> {
        let row = self.latest(user_id, kind).await?;
        Ok(row.map(|r| stocklens_core::store::SyncLogRecord {
            user_id: r.user_id,
            kind: parse_kind(&r.sync_type),
            status: parse_status(&r.status),
            records_count: r.records_count,
            error: r.error_message,
            started_at: r.started_at,
            finished_at: r.finished_at,
        }))
    }
}
