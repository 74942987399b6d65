//! Volatility-contraction breakout strategy.
//!
//! Buys when a matured contraction pattern scores above threshold and the
//! close clears the pivot; exits on a percent trailing stop, optionally
//! also when price falls back under the pivot.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use stocklens_core::{Bar, BarSeries};
use stocklens_patterns::{Vcp, VcpConfig, VcpStage};
use tracing::debug;

use crate::strategy::{Intent, Strategy, StrategyContext};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VcpBreakoutConfig {
    /// Minimum detector score to act on.
    pub min_score: f64,
    /// Bars of history handed to the detector each bar.
    pub lookback: usize,
    /// Percent trailing stop from the post-entry high, as a fraction.
    pub trailing_stop: f64,
    /// Also exit when the close falls back under the entry pivot.
    pub exit_below_pivot: bool,
    /// Fraction of available cash committed per entry.
    pub position_fraction: f64,
    pub detector: VcpConfig,
}

impl Default for VcpBreakoutConfig {
    fn default() -> Self {
        Self {
            min_score: 60.0,
            lookback: 80,
            trailing_stop: 0.08,
            exit_below_pivot: true,
            position_fraction: 1.0,
            detector: VcpConfig::default(),
        }
    }
}

pub struct VcpBreakoutStrategy {
    config: VcpBreakoutConfig,
    detector: Vcp,
    window: VecDeque<Bar>,
    entry_pivot: Option<f64>,
    highest_since_entry: f64,
}

impl VcpBreakoutStrategy {
    #[must_use]
    pub fn new(config: VcpBreakoutConfig) -> Self {
        let detector = Vcp::new(config.detector.clone());
        Self {
            config,
            detector,
            window: VecDeque::new(),
            entry_pivot: None,
            highest_since_entry: 0.0,
        }
    }

    fn window_series(&self) -> Option<BarSeries> {
        let bars: Vec<Bar> = self.window.iter().cloned().collect();
        BarSeries::new(bars).ok()
    }
}

impl Strategy for VcpBreakoutStrategy {
    fn on_bar(&mut self, ctx: &StrategyContext, bar: &Bar) -> Vec<Intent> {
        self.window.push_back(bar.clone());
        if self.window.len() > self.config.lookback {
            self.window.pop_front();
        }

        if ctx.position_qty > 0.0 {
            self.highest_since_entry = self.highest_since_entry.max(bar.close);

            let stop = self.highest_since_entry * (1.0 - self.config.trailing_stop);
            if bar.close < stop {
                self.entry_pivot = None;
                return vec![Intent::sell(
                    ctx.position_qty,
                    format!("trailing stop at {stop:.2}"),
                )];
            }
            if self.config.exit_below_pivot {
                if let Some(pivot) = self.entry_pivot {
                    if bar.close < pivot {
                        self.entry_pivot = None;
                        return vec![Intent::sell(
                            ctx.position_qty,
                            format!("close back under pivot {pivot:.2}"),
                        )];
                    }
                }
            }
            return Vec::new();
        }

        let Some(series) = self.window_series() else {
            return Vec::new();
        };
        let result = self.detector.detect(&series);
        let Some(pivot) = result.pivot_price else {
            return Vec::new();
        };
        let matured = matches!(result.stage, VcpStage::Mature | VcpStage::Breakout);
        if matured && result.score >= self.config.min_score && bar.close >= pivot {
            let qty = (ctx.cash * self.config.position_fraction / bar.close).floor();
            if qty > 0.0 {
                debug!(score = result.score, pivot, close = bar.close, "breakout entry");
                self.entry_pivot = Some(pivot);
                self.highest_since_entry = bar.close;
                return vec![Intent::buy(
                    qty,
                    format!("contraction breakout over {pivot:.2} (score {:.0})", result.score),
                )];
            }
        }

        Vec::new()
    }

    fn name(&self) -> &str {
        "vcp-breakout"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{BacktestEngine, TradeLogStatus};
    use crate::strategy::{FeeModel, IntentSide};
    use chrono::NaiveDate;

    fn series_from_path(path: &[f64], start_volume: f64, end_volume: f64) -> BarSeries {
        let n = path.len();
        let bars: Vec<Bar> = path
            .iter()
            .enumerate()
            .map(|(i, &p)| {
                let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                    + chrono::Duration::days(i as i64);
                let volume =
                    start_volume + (end_volume - start_volume) * i as f64 / (n - 1) as f64;
                Bar::new(date, p, p, p, p, volume)
            })
            .collect();
        BarSeries::new(bars).unwrap()
    }

    fn linspace(from: f64, to: f64, points: usize) -> Vec<f64> {
        (0..points)
            .map(|i| from + (to - from) * i as f64 / (points - 1) as f64)
            .collect()
    }

    fn extend_path(path: &mut Vec<f64>, to: f64, points: usize) {
        let from = *path.last().unwrap();
        path.extend(linspace(from, to, points + 1).into_iter().skip(1));
    }

    /// Three narrowing contractions, a pop through the 95 pivot, then a
    /// slide that trips the trailing stop.
    fn breakout_then_failure() -> Vec<f64> {
        let mut path = linspace(60.0, 100.0, 25);
        extend_path(&mut path, 80.0, 8);
        extend_path(&mut path, 97.0, 8);
        extend_path(&mut path, 85.36, 6);
        extend_path(&mut path, 95.0, 6);
        extend_path(&mut path, 90.25, 5);
        extend_path(&mut path, 93.5, 6);
        extend_path(&mut path, 97.0, 4); // breakout over 95
        extend_path(&mut path, 84.0, 10); // -13% slide
        path
    }

    #[test]
    fn buys_breakout_and_exits_on_trailing_stop() {
        let mut strategy = VcpBreakoutStrategy::new(VcpBreakoutConfig::default());
        let result = BacktestEngine::new(10_000.0, FeeModel::default())
            .run(&mut strategy, &series_from_path(&breakout_then_failure(), 1000.0, 300.0))
            .unwrap();

        let executed: Vec<_> = result
            .trade_log
            .iter()
            .filter(|t| t.status == TradeLogStatus::Executed)
            .collect();
        assert!(!executed.is_empty(), "expected a breakout entry");
        assert_eq!(executed[0].side, IntentSide::Buy);
        assert!(executed[0].price >= 95.0, "entry at or above the pivot");

        let sells: Vec<_> = executed
            .iter()
            .filter(|t| t.side == IntentSide::Sell)
            .collect();
        assert!(!sells.is_empty(), "expected a stop exit");
        assert_eq!(result.final_position_qty, 0.0);
    }

    #[test]
    fn stays_flat_without_a_pattern() {
        let path = linspace(50.0, 120.0, 90);
        let mut strategy = VcpBreakoutStrategy::new(VcpBreakoutConfig::default());
        let result = BacktestEngine::new(10_000.0, FeeModel::default())
            .run(&mut strategy, &series_from_path(&path, 1000.0, 900.0))
            .unwrap();
        assert!(result.trade_log.is_empty());
        assert!((result.final_equity - 10_000.0).abs() < 1e-9);
    }

    #[test]
    fn respects_score_threshold() {
        let mut config = VcpBreakoutConfig::default();
        config.min_score = 101.0; // unreachable
        let mut strategy = VcpBreakoutStrategy::new(config);
        let result = BacktestEngine::new(10_000.0, FeeModel::default())
            .run(&mut strategy, &series_from_path(&breakout_then_failure(), 1000.0, 300.0))
            .unwrap();
        assert!(result.trade_log.is_empty());
    }
}
