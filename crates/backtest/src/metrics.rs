//! Backtest performance statistics.

use serde::{Deserialize, Serialize};

use crate::engine::{EquityPoint, TradeLogEntry, TradeLogStatus};
use crate::strategy::IntentSide;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Fractional total return over the run.
    pub total_return: f64,
    /// Compound annual growth rate from calendar span.
    pub cagr: f64,
    /// Annualized Sharpe from daily returns, risk-free rate zero.
    pub sharpe: f64,
    /// Sortino: downside-deviation denominator.
    pub sortino: f64,
    /// CAGR over |max drawdown|.
    pub calmar: f64,
    /// Largest peak-to-trough equity loss, as a fraction.
    pub max_drawdown: f64,
    pub num_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub profit_factor: f64,
    pub expectancy: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub rejected_intents: usize,
}

impl PerformanceMetrics {
    #[must_use]
    pub fn compute(
        initial_cash: f64,
        final_equity: f64,
        equity_curve: &[EquityPoint],
        daily_returns: &[f64],
        trade_log: &[TradeLogEntry],
    ) -> Self {
        let mut metrics = Self {
            total_return: if initial_cash > 0.0 {
                (final_equity - initial_cash) / initial_cash
            } else {
                0.0
            },
            ..Self::default()
        };

        if let (Some(first), Some(last)) = (equity_curve.first(), equity_curve.last()) {
            let days = (last.date - first.date).num_days();
            if days > 0 && metrics.total_return > -1.0 {
                let years = days as f64 / 365.0;
                metrics.cagr = (1.0 + metrics.total_return).powf(1.0 / years) - 1.0;
            }
        }

        metrics.max_drawdown = max_drawdown(equity_curve);
        metrics.sharpe = sharpe(daily_returns);
        metrics.sortino = sortino(daily_returns);
        if metrics.max_drawdown > 0.0 {
            metrics.calmar = metrics.cagr / metrics.max_drawdown;
        }

        metrics.fill_trade_stats(trade_log);
        metrics
    }

    fn fill_trade_stats(&mut self, trade_log: &[TradeLogEntry]) {
        self.rejected_intents = trade_log
            .iter()
            .filter(|t| t.status == TradeLogStatus::Rejected)
            .count();

        // Closed trades are the executed sells.
        let closes: Vec<&TradeLogEntry> = trade_log
            .iter()
            .filter(|t| t.status == TradeLogStatus::Executed && t.side == IntentSide::Sell)
            .collect();
        self.num_trades = closes.len();
        if closes.is_empty() {
            return;
        }

        let mut win_sum = 0.0;
        let mut loss_sum = 0.0;
        let mut streak_wins = 0usize;
        let mut streak_losses = 0usize;
        for close in &closes {
            if close.realized_pnl > 0.0 {
                self.winning_trades += 1;
                win_sum += close.realized_pnl;
                streak_wins += 1;
                streak_losses = 0;
            } else {
                self.losing_trades += 1;
                loss_sum += close.realized_pnl.abs();
                streak_losses += 1;
                streak_wins = 0;
            }
            self.max_consecutive_wins = self.max_consecutive_wins.max(streak_wins);
            self.max_consecutive_losses = self.max_consecutive_losses.max(streak_losses);
        }

        self.win_rate = self.winning_trades as f64 / closes.len() as f64;
        if self.winning_trades > 0 {
            self.avg_win = win_sum / self.winning_trades as f64;
        }
        if self.losing_trades > 0 {
            self.avg_loss = loss_sum / self.losing_trades as f64;
        }
        if loss_sum > 0.0 {
            self.profit_factor = win_sum / loss_sum;
        }
        self.expectancy =
            self.win_rate * self.avg_win - (1.0 - self.win_rate) * self.avg_loss;
    }
}

fn max_drawdown(equity_curve: &[EquityPoint]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0f64;
    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
        }
        if peak > 0.0 {
            let drawdown = (peak - point.equity) / peak;
            if drawdown > worst {
                worst = drawdown;
            }
        }
    }
    worst
}

fn sharpe(daily_returns: &[f64]) -> f64 {
    if daily_returns.len() < 2 {
        return 0.0;
    }
    let n = daily_returns.len() as f64;
    let mean = daily_returns.iter().sum::<f64>() / n;
    let var = daily_returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let std = var.sqrt();
    if std == 0.0 {
        return 0.0;
    }
    mean / std * TRADING_DAYS_PER_YEAR.sqrt()
}

fn sortino(daily_returns: &[f64]) -> f64 {
    if daily_returns.is_empty() {
        return 0.0;
    }
    let n = daily_returns.len() as f64;
    let mean = daily_returns.iter().sum::<f64>() / n;
    let downside: Vec<f64> = daily_returns.iter().copied().filter(|r| *r < 0.0).collect();
    if downside.is_empty() {
        return 0.0;
    }
    let down_mean = downside.iter().sum::<f64>() / downside.len() as f64;
    let down_var = downside
        .iter()
        .map(|r| (r - down_mean).powi(2))
        .sum::<f64>()
        / downside.len() as f64;
    let down_std = down_var.sqrt();
    if down_std == 0.0 {
        return 0.0;
    }
    mean / down_std * TRADING_DAYS_PER_YEAR.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn curve(values: &[f64]) -> Vec<EquityPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &equity)| EquityPoint {
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                    + chrono::Duration::days(i as i64),
                equity,
            })
            .collect()
    }

    #[test]
    fn drawdown_measures_peak_to_trough() {
        let points = curve(&[100.0, 120.0, 90.0, 110.0]);
        // Peak 120 to trough 90 = 25%.
        assert!((max_drawdown(&points) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn monotonic_curve_has_zero_drawdown() {
        let points = curve(&[100.0, 105.0, 111.0]);
        assert_eq!(max_drawdown(&points), 0.0);
    }

    #[test]
    fn sharpe_zero_for_flat_returns() {
        assert_eq!(sharpe(&[0.0, 0.0, 0.0]), 0.0);
        assert_eq!(sharpe(&[0.01]), 0.0);
    }

    #[test]
    fn sharpe_positive_for_steady_gains() {
        let returns = [0.01, 0.012, 0.009, 0.011, 0.010];
        assert!(sharpe(&returns) > 0.0);
    }

    #[test]
    fn sortino_ignores_upside_volatility() {
        // Large upside swings, tiny downside: Sortino far above Sharpe.
        let returns = [0.05, -0.001, 0.08, -0.002, 0.06, -0.003];
        assert!(sortino(&returns) > sharpe(&returns));
    }

    #[test]
    fn trade_stats_from_log() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let entry = |pnl: f64, status: TradeLogStatus, side: IntentSide| TradeLogEntry {
            date,
            side,
            qty: 1.0,
            price: 10.0,
            fee: 0.0,
            realized_pnl: pnl,
            status,
            reason: String::new(),
        };
        let log = vec![
            entry(0.0, TradeLogStatus::Executed, IntentSide::Buy),
            entry(50.0, TradeLogStatus::Executed, IntentSide::Sell),
            entry(-20.0, TradeLogStatus::Executed, IntentSide::Sell),
            entry(30.0, TradeLogStatus::Executed, IntentSide::Sell),
            entry(0.0, TradeLogStatus::Rejected, IntentSide::Buy),
        ];
        let metrics = PerformanceMetrics::compute(1_000.0, 1_060.0, &curve(&[1_000.0]), &[], &log);
        assert_eq!(metrics.num_trades, 3);
        assert_eq!(metrics.winning_trades, 2);
        assert_eq!(metrics.losing_trades, 1);
        assert_eq!(metrics.rejected_intents, 1);
        assert!((metrics.win_rate - 2.0 / 3.0).abs() < 1e-9);
        assert!((metrics.avg_win - 40.0).abs() < 1e-9);
        assert!((metrics.avg_loss - 20.0).abs() < 1e-9);
        assert!((metrics.profit_factor - 4.0).abs() < 1e-9);
        assert_eq!(metrics.max_consecutive_wins, 1);
        assert_eq!(metrics.max_consecutive_losses, 1);
    }

    #[test]
    fn cagr_annualizes_the_span() {
        // 10% over ~one year.
        let mut points = curve(&[100.0, 100.0]);
        points[1].date = points[0].date + chrono::Duration::days(365);
        points[1].equity = 110.0;
        let metrics = PerformanceMetrics::compute(100.0, 110.0, &points, &[], &[]);
        assert!((metrics.cagr - 0.10).abs() < 1e-9);
        assert!((metrics.total_return - 0.10).abs() < 1e-9);
    }
}
