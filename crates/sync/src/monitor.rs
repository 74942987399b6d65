//! Price-alert evaluation against the latest persisted closes.
//!
//! Transport of triggered alerts (mail, push, ...) is the host's
//! concern; the monitor only evaluates rules and marks them triggered.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use stocklens_core::store::{AlertKind, AlertStore, BarStore, PriceAlert};
use tracing::info;

/// An alert whose condition held at evaluation time.
#[derive(Debug, Clone)]
pub struct TriggeredAlert {
    pub alert: PriceAlert,
    pub price: Decimal,
    pub at: chrono::DateTime<Utc>,
}

pub struct AlertMonitor {
    alerts: Arc<dyn AlertStore>,
    bars: Arc<dyn BarStore>,
}

impl AlertMonitor {
    #[must_use]
    pub fn new(alerts: Arc<dyn AlertStore>, bars: Arc<dyn BarStore>) -> Self {
        Self { alerts, bars }
    }

    /// Evaluates every active alert for the user against the latest
    /// close. Triggered rules are marked in the store and returned.
    ///
    /// # Errors
    /// Store failures.
    pub async fn check_user(&self, user_id: i64) -> Result<Vec<TriggeredAlert>> {
        let mut triggered = Vec::new();
        let now = Utc::now();

        for alert in self.alerts.active_alerts(user_id).await? {
            let Some(latest) = self.bars.latest_date(&alert.symbol).await? else {
                continue;
            };
            let bars = self
                .bars
                .bars_in_range(&alert.symbol, latest, latest)
                .await?;
            let Some(close) = bars.last().map(|b| b.close) else {
                continue;
            };
            let Some(price) = Decimal::from_f64(close) else {
                continue;
            };

            if Self::condition_holds(&alert, price) {
                self.alerts.mark_triggered(alert.id, price, now).await?;
                info!(symbol = %alert.symbol, %price, "price alert triggered");
                triggered.push(TriggeredAlert {
                    alert,
                    price,
                    at: now,
                });
            }
        }

        Ok(triggered)
    }

    fn condition_holds(alert: &PriceAlert, price: Decimal) -> bool {
        match alert.kind {
            AlertKind::Above => price >= alert.threshold,
            AlertKind::Below => price <= alert.threshold,
            AlertKind::ChangeUp | AlertKind::ChangeDown => {
                let Some(base) = alert.base_price else {
                    return false;
                };
                if base.is_zero() {
                    return false;
                }
                let change_pct = (price - base) / base * Decimal::from(100);
                match alert.kind {
                    AlertKind::ChangeUp => change_pct >= alert.threshold,
                    _ => change_pct <= -alert.threshold,
                }
            }
        }
    }
}
