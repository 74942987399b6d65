//! Trade (fill) repository. Append-only, deduplicated on
//! `(account_id, deal_id)`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use stocklens_core::store::TradeStore;
use stocklens_core::traits::{FillPull, TradeSide};

use crate::models::TradeRecord;

fn side_str(side: TradeSide) -> &'static str {
    match side {
        TradeSide::Buy => "BUY",
        TradeSide::Sell => "SELL",
    }
}

#[derive(Debug, Clone)]
pub struct TradeRepository {
    pool: PgPool,
}

impl TradeRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts fills, skipping deal ids already present.
    ///
    /// # Returns
    /// The number of rows actually inserted.
    ///
    /// # Errors
    /// Returns an error when the transaction fails.
    pub async fn insert_batch(&self, account_id: i64, fills: &[FillPull]) -> Result<u64> {
        if fills.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin transaction")?;
        let mut inserted = 0u64;

        for fill in fills {
            let result = sqlx::query(
                r"
                INSERT INTO trades
                (account_id, deal_id, order_id, trade_time, market, code,
                 stock_name, trd_side, qty, price, amount, fee, currency)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                ON CONFLICT (account_id, deal_id) DO NOTHING
                ",
            )
            .bind(account_id)
            .bind(&fill.deal_id)
            .bind(&fill.order_id)
            .bind(fill.trade_time)
            .bind(fill.market.as_str())
            .bind(&fill.code)
            .bind(&fill.name)
            .bind(side_str(fill.side))
            .bind(fill.qty)
            .bind(fill.price)
            .bind(fill.amount)
            .bind(fill.fee)
            .bind(&fill.currency)
            .execute(&mut *tx)
            .await
            .context("failed to insert trade")?;

            inserted += result.rows_affected();
        }

        tx.commit().await.context("failed to commit transaction")?;
        Ok(inserted)
    }

    /// Fills for an account within a time range, ascending by trade time.
    ///
    /// # Errors
    /// Returns an error when the query fails.
    pub async fn query_range(
        &self,
        account_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<TradeRecord>> {
        let records = sqlx::query_as::<_, TradeRecord>(
            r"
            SELECT id, account_id, deal_id, order_id, trade_time, market, code,
                   stock_name, trd_side, qty, price, amount, fee, currency
            FROM trades
            WHERE account_id = $1 AND trade_time >= $2 AND trade_time <= $3
            ORDER BY trade_time ASC
            ",
        )
        .bind(account_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .context("failed to query trades")?;

        Ok(records)
    }
}

#[async_trait]
impl TradeStore for TradeRepository {
    async fn insert_fills(&self, account_id: i64, fills: &[FillPull]) -> Result<u64> {
        self.insert_batch(account_id, fills).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_serializes_to_schema_values() {
        assert_eq!(side_str(TradeSide::Buy), "BUY");
        assert_eq!(side_str(TradeSide::Sell), "SELL");
    }
}
