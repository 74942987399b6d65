//! Engine configuration value types.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::market::Market;

/// Tuning for the sync orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Bounded worker pool size for per-symbol bar fetches.
    pub worker_pool_size: usize,
    /// Per-call deadline for quote provider requests.
    pub bar_deadline: Duration,
    /// Per-call deadline for broker provider requests.
    pub broker_deadline: Duration,
    /// Attempts for transient provider failures (first try included).
    pub retry_attempts: u32,
    /// Base delay for exponential backoff between retries.
    pub retry_base_delay: Duration,
    /// Default bar history window when a symbol has no persisted bars.
    pub kline_days: i64,
    /// Default trade history window for `sync_trades`.
    pub trade_days: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: 4,
            bar_deadline: Duration::from_secs(10),
            broker_deadline: Duration::from_secs(15),
            retry_attempts: 3,
            retry_base_delay: Duration::from_millis(500),
            kline_days: 120,
            trade_days: 90,
        }
    }
}

/// One contract-multiplier rule: the first matching `(market, code_prefix)`
/// wins; longer prefixes are checked first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiplierRule {
    pub market: Market,
    pub code_prefix: String,
    pub multiplier: Decimal,
}

/// Option contract multipliers supplied as configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MultiplierTable {
    rules: Vec<MultiplierRule>,
}

impl MultiplierTable {
    #[must_use]
    pub fn new(mut rules: Vec<MultiplierRule>) -> Self {
        rules.sort_by(|a, b| b.code_prefix.len().cmp(&a.code_prefix.len()));
        Self { rules }
    }

    /// Multiplier for an option code. Unknown US options default to 100,
    /// everything else to 1.
    #[must_use]
    pub fn option_multiplier(&self, market: Market, code: &str) -> Decimal {
        for rule in &self.rules {
            if rule.market == market && code.starts_with(rule.code_prefix.as_str()) {
                return rule.multiplier;
            }
        }
        match market {
            Market::Us => Decimal::from(100),
            _ => Decimal::ONE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn default_sync_config_matches_contract() {
        let cfg = SyncConfig::default();
        assert_eq!(cfg.worker_pool_size, 4);
        assert_eq!(cfg.bar_deadline, Duration::from_secs(10));
        assert_eq!(cfg.broker_deadline, Duration::from_secs(15));
        assert_eq!(cfg.retry_attempts, 3);
    }

    #[test]
    fn longest_prefix_wins() {
        let table = MultiplierTable::new(vec![
            MultiplierRule {
                market: Market::Hk,
                code_prefix: "TCH".to_string(),
                multiplier: dec!(100),
            },
            MultiplierRule {
                market: Market::Hk,
                code_prefix: "TCH2603".to_string(),
                multiplier: dec!(500),
            },
        ]);
        assert_eq!(
            table.option_multiplier(Market::Hk, "TCH260330C650000"),
            dec!(500)
        );
        assert_eq!(
            table.option_multiplier(Market::Hk, "TCH991231C1000"),
            dec!(100)
        );
    }

    #[test]
    fn unknown_us_option_defaults_to_100() {
        let table = MultiplierTable::default();
        assert_eq!(
            table.option_multiplier(Market::Us, "MU260116C230000"),
            dec!(100)
        );
        assert_eq!(table.option_multiplier(Market::Hk, "SMC260629C75000"), dec!(1));
    }
}
