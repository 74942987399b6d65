//! Moving-average crossover strategy.
//!
//! Buys when the fast average crosses above the slow one, sells the
//! position on the reverse cross. Signals fire only on the crossing bar.

use std::cmp::Ordering;
use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use stocklens_core::Bar;

use crate::strategy::{Intent, Strategy, StrategyContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaKind {
    Sma,
    Ema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaCrossConfig {
    pub fast_period: usize,
    pub slow_period: usize,
    pub kind: MaKind,
    /// Fraction of available cash committed per entry.
    pub position_fraction: f64,
}

impl Default for MaCrossConfig {
    fn default() -> Self {
        Self {
            fast_period: 5,
            slow_period: 20,
            kind: MaKind::Sma,
            position_fraction: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relation {
    FastAbove,
    FastBelow,
}

pub struct MaCrossStrategy {
    config: MaCrossConfig,
    name: String,
    closes: VecDeque<f64>,
    fast_ema: Option<f64>,
    slow_ema: Option<f64>,
    last_relation: Option<Relation>,
}

impl MaCrossStrategy {
    #[must_use]
    pub fn new(config: MaCrossConfig) -> Self {
        let name = format!("ma-cross({}/{})", config.fast_period, config.slow_period);
        Self {
            config,
            name,
            closes: VecDeque::new(),
            fast_ema: None,
            slow_ema: None,
            last_relation: None,
        }
    }

    fn rolling_mean(&self, period: usize) -> f64 {
        let n = self.closes.len();
        self.closes.iter().skip(n - period).sum::<f64>() / period as f64
    }

    fn averages(&mut self, close: f64) -> Option<(f64, f64)> {
        if self.closes.len() < self.config.slow_period {
            return None;
        }
        match self.config.kind {
            MaKind::Sma => Some((
                self.rolling_mean(self.config.fast_period),
                self.rolling_mean(self.config.slow_period),
            )),
            MaKind::Ema => {
                let fast_alpha = 2.0 / (self.config.fast_period as f64 + 1.0);
                let slow_alpha = 2.0 / (self.config.slow_period as f64 + 1.0);
                let fast = match self.fast_ema {
                    Some(prev) => fast_alpha * close + (1.0 - fast_alpha) * prev,
                    None => self.rolling_mean(self.config.fast_period),
                };
                let slow = match self.slow_ema {
                    Some(prev) => slow_alpha * close + (1.0 - slow_alpha) * prev,
                    None => self.rolling_mean(self.config.slow_period),
                };
                self.fast_ema = Some(fast);
                self.slow_ema = Some(slow);
                Some((fast, slow))
            }
        }
    }
}

impl Strategy for MaCrossStrategy {
    fn on_bar(&mut self, ctx: &StrategyContext, bar: &Bar) -> Vec<Intent> {
        self.closes.push_back(bar.close);
        if self.closes.len() > self.config.slow_period {
            self.closes.pop_front();
        }

        let Some((fast, slow)) = self.averages(bar.close) else {
            return Vec::new();
        };

        let relation = match fast.partial_cmp(&slow) {
            Some(Ordering::Greater) => Some(Relation::FastAbove),
            Some(Ordering::Less) => Some(Relation::FastBelow),
            _ => None,
        };

        let mut intents = Vec::new();
        if relation != self.last_relation {
            match relation {
                Some(Relation::FastAbove) if ctx.position_qty == 0.0 => {
                    let qty = (ctx.cash * self.config.position_fraction / bar.close).floor();
                    if qty > 0.0 {
                        intents.push(Intent::buy(qty, "fast average crossed above slow"));
                    }
                }
                Some(Relation::FastBelow) if ctx.position_qty > 0.0 => {
                    intents.push(Intent::sell(
                        ctx.position_qty,
                        "fast average crossed below slow",
                    ));
                }
                _ => {}
            }
            if relation.is_some() {
                self.last_relation = relation;
            }
        }

        intents
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{BacktestEngine, TradeLogStatus};
    use crate::strategy::{FeeModel, IntentSide};
    use chrono::NaiveDate;
    use stocklens_core::BarSeries;

    fn series(closes: &[f64]) -> BarSeries {
        let bars: Vec<Bar> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                    + chrono::Duration::days(i as i64);
                Bar::new(date, c, c, c, c, 1_000.0)
            })
            .collect();
        BarSeries::new(bars).unwrap()
    }

    /// Flat, then a rally forcing a golden cross, then a slide forcing the
    /// death cross.
    fn cross_path() -> Vec<f64> {
        let mut closes = vec![100.0; 25];
        for i in 1..=15 {
            closes.push(100.0 + f64::from(i) * 2.0);
        }
        for i in 1..=20 {
            closes.push(130.0 - f64::from(i) * 3.0);
        }
        closes
    }

    #[test]
    fn one_buy_on_golden_cross_one_sell_on_death_cross() {
        let mut strategy = MaCrossStrategy::new(MaCrossConfig::default());
        let result = BacktestEngine::new(10_000.0, FeeModel::default())
            .run(&mut strategy, &series(&cross_path()))
            .unwrap();

        let executed: Vec<_> = result
            .trade_log
            .iter()
            .filter(|t| t.status == TradeLogStatus::Executed)
            .collect();
        assert_eq!(executed.len(), 2);
        assert_eq!(executed[0].side, IntentSide::Buy);
        assert_eq!(executed[1].side, IntentSide::Sell);
        // The buy fills at the close of the first rally bar, the sell
        // partway down the slide.
        assert!(executed[0].price > 100.0);
        assert!(executed[1].price < 130.0);
    }

    #[test]
    fn final_equity_is_all_cash_after_exit() {
        let mut strategy = MaCrossStrategy::new(MaCrossConfig::default());
        let result = BacktestEngine::new(10_000.0, FeeModel::default())
            .run(&mut strategy, &series(&cross_path()))
            .unwrap();
        assert_eq!(result.final_position_qty, 0.0);
        assert!((result.final_equity - result.final_cash).abs() < 1e-9);

        // Cash reconstructs from the two fills.
        let buy = &result.trade_log[0];
        let sell = &result.trade_log[1];
        let expected = 10_000.0 - buy.qty * buy.price + sell.qty * sell.price;
        assert!((result.final_cash - expected).abs() < 1e-9);
    }

    #[test]
    fn no_signal_without_warm_up() {
        let mut strategy = MaCrossStrategy::new(MaCrossConfig::default());
        let result = BacktestEngine::new(10_000.0, FeeModel::default())
            .run(&mut strategy, &series(&vec![100.0; 10]))
            .unwrap();
        assert!(result.trade_log.is_empty());
    }

    #[test]
    fn no_duplicate_entries_while_above() {
        let mut closes = vec![100.0; 25];
        for i in 1..=30 {
            closes.push(100.0 + f64::from(i) * 1.5);
        }
        let mut strategy = MaCrossStrategy::new(MaCrossConfig::default());
        let result = BacktestEngine::new(10_000.0, FeeModel::default())
            .run(&mut strategy, &series(&closes))
            .unwrap();
        let buys = result
            .trade_log
            .iter()
            .filter(|t| t.side == IntentSide::Buy)
            .count();
        assert_eq!(buys, 1);
    }
}
