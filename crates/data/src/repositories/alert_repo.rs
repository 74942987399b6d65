//! Price alert repository.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use stocklens_core::store::{AlertKind, AlertStore, PriceAlert};
use stocklens_core::Symbol;

use crate::models::PriceAlertRecord;

fn parse_alert_kind(raw: &str) -> Option<AlertKind> {
    match raw {
        "ABOVE" => Some(AlertKind::Above),
        "BELOW" => Some(AlertKind::Below),
        "CHANGE_UP" => Some(AlertKind::ChangeUp),
        "CHANGE_DOWN" => Some(AlertKind::ChangeDown),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct AlertRepository {
    pool: PgPool,
}

impl AlertRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Active, untriggered alerts for a user.
    ///
    /// # Errors
    /// Returns an error when the query fails.
    pub async fn active_for_user(&self, user_id: i64) -> Result<Vec<PriceAlertRecord>> {
        let records = sqlx::query_as::<_, PriceAlertRecord>(
            r"
            SELECT id, user_id, market, code, alert_type, target_price,
                   target_change_pct, base_price, active, triggered_at,
                   triggered_price
            FROM price_alerts
            WHERE user_id = $1 AND active = TRUE AND triggered_at IS NULL
            ORDER BY id ASC
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("failed to query price alerts")?;

        Ok(records)
    }

    /// Marks an alert as triggered.
    ///
    /// # Errors
    /// Returns an error when the update fails.
    pub async fn set_triggered(
        &self,
        alert_id: i64,
        price: Decimal,
        at: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            r"
            UPDATE price_alerts
            SET triggered_at = $2, triggered_price = $3, active = FALSE
            WHERE id = $1 AND triggered_at IS NULL
            ",
        )
        .bind(alert_id)
        .bind(at)
        .bind(price)
        .execute(&self.pool)
        .await
        .context("failed to mark alert triggered")?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl AlertStore for AlertRepository {
    async fn active_alerts(&self, user_id: i64) -> Result<Vec<PriceAlert>> {
        let records = self.active_for_user(user_id).await?;
        let mut alerts = Vec::with_capacity(records.len());
        for record in records {
            let Some(kind) = parse_alert_kind(&record.alert_type) else {
                continue;
            };
            let Ok(symbol) = Symbol::parse(&format!("{}.{}", record.market, record.code)) else {
                continue;
            };
            let threshold = match kind {
                AlertKind::Above | AlertKind::Below => record.target_price,
                AlertKind::ChangeUp | AlertKind::ChangeDown => record.target_change_pct,
            };
            let Some(threshold) = threshold else { continue };
            alerts.push(PriceAlert {
                id: record.id,
                user_id: record.user_id,
                symbol,
                kind,
                threshold,
                base_price: record.base_price,
            });
        }
        Ok(alerts)
    }

    async fn mark_triggered(
        &self,
        alert_id: i64,
        price: Decimal,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.set_triggered(alert_id, price, at).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_kinds_parse_from_schema_values() {
        assert_eq!(parse_alert_kind("ABOVE"), Some(AlertKind::Above));
        assert_eq!(parse_alert_kind("BELOW"), Some(AlertKind::Below));
        assert_eq!(parse_alert_kind("CHANGE_UP"), Some(AlertKind::ChangeUp));
        assert_eq!(parse_alert_kind("CHANGE_DOWN"), Some(AlertKind::ChangeDown));
        assert_eq!(parse_alert_kind("NOPE"), None);
    }
}
