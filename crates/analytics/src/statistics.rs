//! Trade statistics over paired round trips.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::pairing::{Instrument, RoundTrip};

/// Monthly realized P&L, keyed by exit month.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonthlyPnl {
    pub trade_count: usize,
    pub winning_trades: usize,
    pub gross_profit: Decimal,
    pub gross_loss: Decimal,
    pub net_pnl: Decimal,
}

/// One pnl-ratio histogram bucket; bounds are fractions, half-open
/// `[lower, upper)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatioBucket {
    pub label: String,
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Per-market breakdown.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketBreakdown {
    pub trade_count: usize,
    pub winning_trades: usize,
    pub gross_profit: Decimal,
    pub gross_loss: Decimal,
    pub net_pnl: Decimal,
}

/// Aggregate trade statistics. Stock and option trades are counted
/// separately where it matters; rankings hold indices into the input
/// round-trip slice.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradeStatistics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub breakeven_trades: usize,
    /// Fraction of trades with positive net P&L.
    pub win_rate: f64,

    pub total_gain: Decimal,
    pub total_loss: Decimal,
    pub net_pnl: Decimal,
    pub avg_gain: Decimal,
    pub avg_loss: Decimal,
    /// `total_gain / total_loss`; zero when no losses.
    pub profit_factor: f64,
    /// Expected net P&L per trade.
    pub expectancy: Decimal,

    pub avg_hold_days: f64,
    pub avg_winning_hold_days: f64,
    pub avg_losing_hold_days: f64,
    pub max_hold_days: i64,
    pub min_hold_days: i64,

    pub stock_fees: Decimal,
    pub option_fees: Decimal,
    pub total_fees: Decimal,

    pub option_trades: usize,
    pub option_winning_trades: usize,
    pub option_net_pnl: Decimal,

    /// Indices of the best trades, descending by net P&L.
    pub top_winners: Vec<usize>,
    /// Indices of the worst trades, ascending by net P&L.
    pub top_losers: Vec<usize>,

    pub monthly: BTreeMap<String, MonthlyPnl>,
    pub ratio_histogram: Vec<RatioBucket>,
    pub by_market: BTreeMap<String, MarketBreakdown>,
}

/// Histogram edges as fractions, mirroring the report buckets.
const BUCKET_EDGES: &[(&str, f64, f64)] = &[
    ("<-50%", f64::NEG_INFINITY, -0.5),
    ("-50%..-30%", -0.5, -0.3),
    ("-30%..-20%", -0.3, -0.2),
    ("-20%..-10%", -0.2, -0.1),
    ("-10%..0%", -0.1, 0.0),
    ("0%..10%", 0.0, 0.1),
    ("10%..20%", 0.1, 0.2),
    ("20%..30%", 0.2, 0.3),
    ("30%..50%", 0.3, 0.5),
    (">=50%", 0.5, f64::INFINITY),
];

#[derive(Debug, Clone)]
pub struct StatisticsCalculator {
    top_n: usize,
}

impl Default for StatisticsCalculator {
    fn default() -> Self {
        Self { top_n: 5 }
    }
}

impl StatisticsCalculator {
    #[must_use]
    pub fn new(top_n: usize) -> Self {
        Self { top_n }
    }

    #[must_use]
    pub fn calculate(&self, trips: &[RoundTrip]) -> TradeStatistics {
        let mut stats = TradeStatistics {
            ratio_histogram: BUCKET_EDGES
                .iter()
                .map(|&(label, lower, upper)| RatioBucket {
                    label: label.to_string(),
                    lower,
                    upper,
                    count: 0,
                })
                .collect(),
            ..TradeStatistics::default()
        };
        if trips.is_empty() {
            return stats;
        }

        let stock_idx: Vec<usize> = (0..trips.len())
            .filter(|&i| trips[i].instrument == Instrument::Stock)
            .collect();

        for &i in &stock_idx {
            let trip = &trips[i];
            stats.total_trades += 1;
            stats.stock_fees += trip.fees;
            if trip.net_pnl > Decimal::ZERO {
                stats.winning_trades += 1;
                stats.total_gain += trip.net_pnl;
            } else if trip.net_pnl < Decimal::ZERO {
                stats.losing_trades += 1;
                stats.total_loss += trip.net_pnl.abs();
            } else {
                stats.breakeven_trades += 1;
            }
            stats.net_pnl += trip.net_pnl;
        }

        if stats.total_trades > 0 {
            stats.win_rate = stats.winning_trades as f64 / stats.total_trades as f64;
        }
        if stats.winning_trades > 0 {
            stats.avg_gain = stats.total_gain / Decimal::from(stats.winning_trades);
        }
        if stats.losing_trades > 0 {
            stats.avg_loss = stats.total_loss / Decimal::from(stats.losing_trades);
        }
        if stats.total_loss > Decimal::ZERO {
            stats.profit_factor = decimal_to_f64(stats.total_gain / stats.total_loss);
        }
        if stats.total_trades > 0 {
            stats.expectancy = stats.net_pnl / Decimal::from(stats.total_trades);
        }

        self.hold_stats(trips, &stock_idx, &mut stats);
        self.option_stats(trips, &mut stats);
        self.rankings(trips, &stock_idx, &mut stats);
        Self::distributions(trips, &stock_idx, &mut stats);

        stats.total_fees = stats.stock_fees + stats.option_fees;
        stats
    }

    fn hold_stats(&self, trips: &[RoundTrip], stock_idx: &[usize], stats: &mut TradeStatistics) {
        let holds: Vec<i64> = stock_idx.iter().map(|&i| trips[i].hold_days).collect();
        if holds.is_empty() {
            return;
        }
        stats.avg_hold_days = holds.iter().sum::<i64>() as f64 / holds.len() as f64;
        stats.max_hold_days = holds.iter().copied().max().unwrap_or(0);
        stats.min_hold_days = holds.iter().copied().min().unwrap_or(0);

        let winning: Vec<i64> = stock_idx
            .iter()
            .filter(|&&i| trips[i].net_pnl > Decimal::ZERO)
            .map(|&i| trips[i].hold_days)
            .collect();
        if !winning.is_empty() {
            stats.avg_winning_hold_days =
                winning.iter().sum::<i64>() as f64 / winning.len() as f64;
        }
        let losing: Vec<i64> = stock_idx
            .iter()
            .filter(|&&i| trips[i].net_pnl < Decimal::ZERO)
            .map(|&i| trips[i].hold_days)
            .collect();
        if !losing.is_empty() {
            stats.avg_losing_hold_days = losing.iter().sum::<i64>() as f64 / losing.len() as f64;
        }
    }

    fn option_stats(&self, trips: &[RoundTrip], stats: &mut TradeStatistics) {
        for trip in trips.iter().filter(|t| t.instrument == Instrument::Option) {
            stats.option_trades += 1;
            stats.option_net_pnl += trip.net_pnl;
            stats.option_fees += trip.fees;
            if trip.net_pnl > Decimal::ZERO {
                stats.option_winning_trades += 1;
            }
        }
    }

    fn rankings(&self, trips: &[RoundTrip], stock_idx: &[usize], stats: &mut TradeStatistics) {
        let mut ranked: Vec<usize> = stock_idx.to_vec();
        ranked.sort_by(|&a, &b| trips[b].net_pnl.cmp(&trips[a].net_pnl));

        stats.top_winners = ranked
            .iter()
            .take(self.top_n)
            .copied()
            .filter(|&i| trips[i].net_pnl > Decimal::ZERO)
            .collect();
        stats.top_losers = ranked
            .iter()
            .rev()
            .take(self.top_n)
            .copied()
            .filter(|&i| trips[i].net_pnl < Decimal::ZERO)
            .collect();
    }

    fn distributions(trips: &[RoundTrip], stock_idx: &[usize], stats: &mut TradeStatistics) {
        for &i in stock_idx {
            let trip = &trips[i];

            let month = trip.exit_time.format("%Y-%m").to_string();
            let monthly = stats.monthly.entry(month).or_default();
            monthly.trade_count += 1;
            monthly.net_pnl += trip.net_pnl;
            if trip.net_pnl > Decimal::ZERO {
                monthly.winning_trades += 1;
                monthly.gross_profit += trip.net_pnl;
            } else if trip.net_pnl < Decimal::ZERO {
                monthly.gross_loss += trip.net_pnl.abs();
            }

            let market = stats
                .by_market
                .entry(trip.market.as_str().to_string())
                .or_default();
            market.trade_count += 1;
            market.net_pnl += trip.net_pnl;
            if trip.net_pnl > Decimal::ZERO {
                market.winning_trades += 1;
                market.gross_profit += trip.net_pnl;
            } else if trip.net_pnl < Decimal::ZERO {
                market.gross_loss += trip.net_pnl.abs();
            }

            let ratio = decimal_to_f64(trip.pnl_ratio);
            for bucket in &mut stats.ratio_histogram {
                if ratio >= bucket.lower && ratio < bucket.upper {
                    bucket.count += 1;
                    break;
                }
            }
        }
    }
}

fn decimal_to_f64(value: Decimal) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    value.to_f64().unwrap_or(0.0)
}
