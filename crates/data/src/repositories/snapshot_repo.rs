//! Account cash-snapshot repository. Append-per-date like positions.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use stocklens_core::store::SnapshotStore;
use stocklens_core::traits::CashPull;

use crate::models::AccountSnapshotRecord;

#[derive(Debug, Clone)]
pub struct SnapshotRepository {
    pool: PgPool,
}

impl SnapshotRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts the day's snapshot if absent.
    ///
    /// # Returns
    /// 1 when a row was inserted, 0 when the date already had one.
    ///
    /// # Errors
    /// Returns an error when the insert fails.
    pub async fn insert_day(
        &self,
        account_id: i64,
        snapshot_date: NaiveDate,
        cash: &CashPull,
    ) -> Result<u64> {
        let result = sqlx::query(
            r"
            INSERT INTO account_snapshots
            (account_id, snapshot_date, total_assets, cash, market_value,
             frozen_cash, buying_power, currency)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (account_id, snapshot_date) DO NOTHING
            ",
        )
        .bind(account_id)
        .bind(snapshot_date)
        .bind(cash.total_assets)
        .bind(cash.cash)
        .bind(cash.market_value)
        .bind(cash.frozen_cash)
        .bind(cash.buying_power)
        .bind(&cash.currency)
        .execute(&self.pool)
        .await
        .context("failed to insert account snapshot")?;

        Ok(result.rows_affected())
    }

    /// Snapshots for an account over a date range, ascending.
    ///
    /// # Errors
    /// Returns an error when the query fails.
    pub async fn query_range(
        &self,
        account_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AccountSnapshotRecord>> {
        let records = sqlx::query_as::<_, AccountSnapshotRecord>(
            r"
            SELECT id, account_id, snapshot_date, total_assets, cash,
                   market_value, frozen_cash, buying_power, currency
            FROM account_snapshots
            WHERE account_id = $1 AND snapshot_date >= $2 AND snapshot_date <= $3
            ORDER BY snapshot_date ASC
            ",
        )
        .bind(account_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .context("failed to query account snapshots")?;

        Ok(records)
    }
}

#[async_trait]
impl SnapshotStore for SnapshotRepository {
    async fn insert_snapshot(
        &self,
        account_id: i64,
        snapshot_date: NaiveDate,
        cash: &CashPull,
    ) -> Result<u64> {
        self.insert_day(account_id, snapshot_date, cash).await
    }
}
