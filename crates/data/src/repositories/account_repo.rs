//! Account repository.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use stocklens_core::store::{AccountRef, AccountStore};

use crate::models::AccountRecord;

#[derive(Debug, Clone)]
pub struct AccountRepository {
    pool: PgPool,
}

impl AccountRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Active accounts for a user, oldest first.
    ///
    /// # Errors
    /// Returns an error when the query fails.
    pub async fn active_for_user(&self, user_id: i64) -> Result<Vec<AccountRecord>> {
        let records = sqlx::query_as::<_, AccountRecord>(
            r"
            SELECT id, user_id, broker_acc_id, account_name, account_type,
                   market, currency, active
            FROM accounts
            WHERE user_id = $1 AND active = TRUE
            ORDER BY id ASC
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("failed to query active accounts")?;

        Ok(records)
    }

    /// Registers a broker account; re-registration updates the metadata.
    ///
    /// # Errors
    /// Returns an error when the upsert fails.
    pub async fn upsert(
        &self,
        user_id: i64,
        broker_acc_id: i64,
        account_name: Option<&str>,
        account_type: &str,
        market: &str,
        currency: &str,
    ) -> Result<u64> {
        let result = sqlx::query(
            r"
            INSERT INTO accounts
            (user_id, broker_acc_id, account_name, account_type, market, currency, active)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE)
            ON CONFLICT (user_id, broker_acc_id) DO UPDATE
            SET account_name = EXCLUDED.account_name,
                account_type = EXCLUDED.account_type,
                market = EXCLUDED.market,
                currency = EXCLUDED.currency,
                active = TRUE
            ",
        )
        .bind(user_id)
        .bind(broker_acc_id)
        .bind(account_name)
        .bind(account_type)
        .bind(market)
        .bind(currency)
        .execute(&self.pool)
        .await
        .context("failed to upsert account")?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl AccountStore for AccountRepository {
    async fn active_accounts(&self, user_id: i64) -> Result<Vec<AccountRef>> {
        let records = self.active_for_user(user_id).await?;
        Ok(records
            .into_iter()
            .map(|r| AccountRef {
                id: r.id,
                broker_acc_id: r.broker_acc_id,
            })
            .collect())
    }
}
