//! Daily-bar repository.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use stocklens_core::store::BarStore;
use stocklens_core::{Bar, Symbol};

use crate::models::KlineRecord;

#[derive(Debug, Clone)]
pub struct KlineRepository {
    pool: PgPool,
}

impl KlineRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a batch idempotently; duplicates on
    /// `(market, code, trade_date)` are skipped.
    ///
    /// # Returns
    /// The number of rows actually inserted.
    ///
    /// # Errors
    /// Returns an error when the transaction fails.
    pub async fn insert_batch(&self, records: &[KlineRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin transaction")?;
        let mut inserted = 0u64;

        for chunk in records.chunks(100) {
            for record in chunk {
                let result = sqlx::query(
                    r"
                    INSERT INTO klines
                    (market, code, trade_date, open, high, low, close, volume,
                     amount, turnover_rate, change_pct, ma5, ma10, ma20, ma60, obv)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
                    ON CONFLICT (market, code, trade_date) DO NOTHING
                    ",
                )
                .bind(&record.market)
                .bind(&record.code)
                .bind(record.trade_date)
                .bind(record.open)
                .bind(record.high)
                .bind(record.low)
                .bind(record.close)
                .bind(record.volume)
                .bind(record.amount)
                .bind(record.turnover_rate)
                .bind(record.change_pct)
                .bind(record.ma5)
                .bind(record.ma10)
                .bind(record.ma20)
                .bind(record.ma60)
                .bind(record.obv)
                .execute(&mut *tx)
                .await
                .context("failed to insert kline")?;

                inserted += result.rows_affected();
            }
        }

        tx.commit().await.context("failed to commit transaction")?;
        Ok(inserted)
    }

    /// Most recent persisted trading date for a symbol.
    ///
    /// # Errors
    /// Returns an error when the query fails.
    pub async fn latest_trade_date(
        &self,
        market: &str,
        code: &str,
    ) -> Result<Option<NaiveDate>> {
        let row: Option<(Option<NaiveDate>,)> = sqlx::query_as(
            r"
            SELECT MAX(trade_date)
            FROM klines
            WHERE market = $1 AND code = $2
            ",
        )
        .bind(market)
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .context("failed to query latest trade date")?;

        Ok(row.and_then(|r| r.0))
    }

    /// Bars for a symbol within an inclusive date range, ascending.
    ///
    /// # Errors
    /// Returns an error when the query fails.
    pub async fn query_range(
        &self,
        market: &str,
        code: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<KlineRecord>> {
        let records = sqlx::query_as::<_, KlineRecord>(
            r"
            SELECT market, code, trade_date, open, high, low, close, volume,
                   amount, turnover_rate, change_pct, ma5, ma10, ma20, ma60, obv
            FROM klines
            WHERE market = $1 AND code = $2
              AND trade_date >= $3 AND trade_date <= $4
            ORDER BY trade_date ASC
            ",
        )
        .bind(market)
        .bind(code)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .context("failed to query klines")?;

        Ok(records)
    }

    /// Writes the precomputed MA panel and OBV back onto one row.
    ///
    /// # Errors
    /// Returns an error when the update fails.
    pub async fn update_precomputed(&self, record: &KlineRecord) -> Result<u64> {
        let result = sqlx::query(
            r"
            UPDATE klines
            SET ma5 = $4, ma10 = $5, ma20 = $6, ma60 = $7, obv = $8
            WHERE market = $1 AND code = $2 AND trade_date = $3
            ",
        )
        .bind(&record.market)
        .bind(&record.code)
        .bind(record.trade_date)
        .bind(record.ma5)
        .bind(record.ma10)
        .bind(record.ma20)
        .bind(record.ma60)
        .bind(record.obv)
        .execute(&self.pool)
        .await
        .context("failed to update precomputed columns")?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl BarStore for KlineRepository {
    async fn upsert_bars(&self, symbol: &Symbol, bars: &[Bar]) -> Result<u64> {
        let records: Vec<KlineRecord> = bars
            .iter()
            .map(|bar| KlineRecord::from_bar(symbol, bar))
            .collect();
        self.insert_batch(&records).await
    }

    async fn latest_date(&self, symbol: &Symbol) -> Result<Option<NaiveDate>> {
        self.latest_trade_date(symbol.market.as_str(), &symbol.code)
            .await
    }

    async fn bars_in_range(
        &self,
        symbol: &Symbol,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Bar>> {
        let records = self
            .query_range(symbol.market.as_str(), &symbol.code, from, to)
            .await?;
        Ok(records.iter().map(KlineRecord::to_bar).collect())
    }
}
