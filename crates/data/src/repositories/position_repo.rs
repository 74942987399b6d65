//! Position snapshot repository.
//!
//! Positions are append-per-date: a fresh snapshot row is inserted for
//! each `(account, snapshot_date, market, code)` and never updated in
//! place.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use stocklens_core::store::PositionStore;
use stocklens_core::traits::{PositionPull, PositionSide};
use stocklens_core::Symbol;

use crate::models::PositionRecord;

fn side_str(side: PositionSide) -> &'static str {
    match side {
        PositionSide::Long => "LONG",
        PositionSide::Short => "SHORT",
    }
}

#[derive(Debug, Clone)]
pub struct PositionRepository {
    pool: PgPool,
}

impl PositionRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts one day's snapshot rows for an account; rows already
    /// present for the date are left untouched.
    ///
    /// # Returns
    /// The number of rows actually inserted.
    ///
    /// # Errors
    /// Returns an error when the transaction fails.
    pub async fn insert_day(
        &self,
        account_id: i64,
        snapshot_date: NaiveDate,
        positions: &[PositionPull],
    ) -> Result<u64> {
        if positions.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin transaction")?;
        let mut inserted = 0u64;

        for position in positions {
            let result = sqlx::query(
                r"
                INSERT INTO positions
                (account_id, snapshot_date, market, code, stock_name, qty,
                 can_sell_qty, cost_price, market_price, market_value,
                 pl_value, pl_ratio, position_side)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                ON CONFLICT (account_id, snapshot_date, market, code) DO NOTHING
                ",
            )
            .bind(account_id)
            .bind(snapshot_date)
            .bind(position.market.as_str())
            .bind(&position.code)
            .bind(&position.name)
            .bind(position.qty)
            .bind(position.can_sell_qty)
            .bind(position.cost_price)
            .bind(position.market_price)
            .bind(position.market_value)
            .bind(position.pl_value)
            .bind(position.pl_ratio)
            .bind(side_str(position.side))
            .execute(&mut *tx)
            .await
            .context("failed to insert position snapshot")?;

            inserted += result.rows_affected();
        }

        tx.commit().await.context("failed to commit transaction")?;
        Ok(inserted)
    }

    /// Snapshot rows for a user on one date, across all accounts.
    ///
    /// # Errors
    /// Returns an error when the query fails.
    pub async fn for_user_on(
        &self,
        user_id: i64,
        snapshot_date: NaiveDate,
    ) -> Result<Vec<PositionRecord>> {
        let records = sqlx::query_as::<_, PositionRecord>(
            r"
            SELECT p.id, p.account_id, p.snapshot_date, p.market, p.code,
                   p.stock_name, p.qty, p.can_sell_qty, p.cost_price,
                   p.market_price, p.market_value, p.pl_value, p.pl_ratio,
                   p.position_side
            FROM positions p
            JOIN accounts a ON a.id = p.account_id
            WHERE a.user_id = $1 AND p.snapshot_date = $2
            ORDER BY p.market, p.code
            ",
        )
        .bind(user_id)
        .bind(snapshot_date)
        .fetch_all(&self.pool)
        .await
        .context("failed to query positions for user")?;

        Ok(records)
    }

    /// Distinct symbols held by the user on one date.
    ///
    /// # Errors
    /// Returns an error when the query fails.
    pub async fn distinct_symbols(
        &self,
        user_id: i64,
        snapshot_date: NaiveDate,
    ) -> Result<Vec<(String, String)>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r"
            SELECT DISTINCT p.market, p.code
            FROM positions p
            JOIN accounts a ON a.id = p.account_id
            WHERE a.user_id = $1 AND p.snapshot_date = $2
            ",
        )
        .bind(user_id)
        .bind(snapshot_date)
        .fetch_all(&self.pool)
        .await
        .context("failed to query held symbols")?;

        Ok(rows)
    }
}

#[async_trait]
impl PositionStore for PositionRepository {
    async fn insert_snapshots(
        &self,
        account_id: i64,
        snapshot_date: NaiveDate,
        positions: &[PositionPull],
    ) -> Result<u64> {
        self.insert_day(account_id, snapshot_date, positions).await
    }

    async fn held_symbols(&self, user_id: i64, snapshot_date: NaiveDate) -> Result<Vec<Symbol>> {
        let rows = self.distinct_symbols(user_id, snapshot_date).await?;
        let mut symbols = Vec::with_capacity(rows.len());
        for (market, code) in rows {
            if let Ok(symbol) = Symbol::parse(&format!("{market}.{code}")) {
                symbols.push(symbol);
            }
        }
        Ok(symbols)
    }
}
