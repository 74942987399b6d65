//! User repository.

use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::UserRecord;

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    /// Returns an error when the query fails.
    pub async fn by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        let record = sqlx::query_as::<_, UserRecord>(
            r"
            SELECT id, username, display_name, active, created_at
            FROM users
            WHERE username = $1
            ",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .context("failed to query user by username")?;

        Ok(record)
    }

    /// # Errors
    /// Returns an error when the query fails.
    pub async fn by_id(&self, id: i64) -> Result<Option<UserRecord>> {
        let record = sqlx::query_as::<_, UserRecord>(
            r"
            SELECT id, username, display_name, active, created_at
            FROM users
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to query user by id")?;

        Ok(record)
    }

    /// Inserts a user; the unique username makes retries idempotent.
    ///
    /// # Errors
    /// Returns an error when the insert fails.
    pub async fn insert(&self, username: &str, display_name: Option<&str>) -> Result<u64> {
        let result = sqlx::query(
            r"
            INSERT INTO users (username, display_name, active)
            VALUES ($1, $2, TRUE)
            ON CONFLICT (username) DO NOTHING
            ",
        )
        .bind(username)
        .bind(display_name)
        .execute(&self.pool)
        .await
        .context("failed to insert user")?;

        Ok(result.rows_affected())
    }
}
