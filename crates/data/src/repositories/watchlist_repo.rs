//! Watchlist repository.
//!
//! Reconciliation activates pulled rows and deactivates rows the broker
//! no longer reports, without deleting history.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use stocklens_core::store::WatchlistStore;
use stocklens_core::traits::WatchlistPull;
use stocklens_core::Symbol;

use crate::models::WatchlistRecord;

#[derive(Debug, Clone)]
pub struct WatchlistRepository {
    pool: PgPool,
}

impl WatchlistRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Reconciles the stored watchlist against a broker pull.
    ///
    /// # Returns
    /// The number of rows inserted, reactivated or deactivated.
    ///
    /// # Errors
    /// Returns an error when the transaction fails.
    pub async fn reconcile_pull(
        &self,
        user_id: i64,
        entries: &[WatchlistPull],
    ) -> Result<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin transaction")?;
        let mut changed = 0u64;

        for entry in entries {
            let result = sqlx::query(
                r"
                INSERT INTO watchlist
                (user_id, market, code, stock_name, group_name, sort_order, active)
                VALUES ($1, $2, $3, $4, $5, $6, TRUE)
                ON CONFLICT (user_id, market, code) DO UPDATE
                SET stock_name = EXCLUDED.stock_name,
                    group_name = EXCLUDED.group_name,
                    sort_order = EXCLUDED.sort_order,
                    active = TRUE
                WHERE watchlist.active = FALSE
                   OR watchlist.stock_name IS DISTINCT FROM EXCLUDED.stock_name
                   OR watchlist.group_name IS DISTINCT FROM EXCLUDED.group_name
                   OR watchlist.sort_order IS DISTINCT FROM EXCLUDED.sort_order
                ",
            )
            .bind(user_id)
            .bind(entry.symbol.market.as_str())
            .bind(&entry.symbol.code)
            .bind(&entry.name)
            .bind(&entry.group)
            .bind(entry.sort_order)
            .execute(&mut *tx)
            .await
            .context("failed to upsert watchlist entry")?;

            changed += result.rows_affected();
        }

        // Deactivate rows the pull no longer contains.
        let markets: Vec<String> = entries
            .iter()
            .map(|e| e.symbol.market.as_str().to_string())
            .collect();
        let codes: Vec<String> = entries.iter().map(|e| e.symbol.code.clone()).collect();
        let result = sqlx::query(
            r"
            UPDATE watchlist
            SET active = FALSE
            WHERE user_id = $1 AND active = TRUE
              AND (market, code) NOT IN (
                  SELECT * FROM UNNEST($2::text[], $3::text[])
              )
            ",
        )
        .bind(user_id)
        .bind(&markets)
        .bind(&codes)
        .execute(&mut *tx)
        .await
        .context("failed to deactivate removed watchlist entries")?;
        changed += result.rows_affected();

        tx.commit().await.context("failed to commit transaction")?;
        Ok(changed)
    }

    /// Active rows for a user, in display order.
    ///
    /// # Errors
    /// Returns an error when the query fails.
    pub async fn active_for_user(&self, user_id: i64) -> Result<Vec<WatchlistRecord>> {
        let records = sqlx::query_as::<_, WatchlistRecord>(
            r"
            SELECT id, user_id, market, code, stock_name, group_name, notes,
                   sort_order, active
            FROM watchlist
            WHERE user_id = $1 AND active = TRUE
            ORDER BY sort_order ASC, id ASC
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("failed to query watchlist")?;

        Ok(records)
    }
}

#[async_trait]
impl WatchlistStore for WatchlistRepository {
    async fn reconcile(&self, user_id: i64, entries: &[WatchlistPull]) -> Result<u64> {
        self.reconcile_pull(user_id, entries).await
    }

    async fn active_symbols(&self, user_id: i64) -> Result<Vec<Symbol>> {
        let records = self.active_for_user(user_id).await?;
        let mut symbols = Vec::with_capacity(records.len());
        for record in records {
            if let Ok(symbol) = Symbol::parse(&format!("{}.{}", record.market, record.code)) {
                symbols.push(symbol);
            }
        }
        Ok(symbols)
    }
}
