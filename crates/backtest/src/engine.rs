//! Bar-replay engine with cash and position accounting.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use stocklens_core::{BarSeries, CoreError};
use tracing::debug;

use crate::metrics::PerformanceMetrics;
use crate::strategy::{FeeModel, Intent, IntentSide, Strategy, StrategyContext};

/// One equity-curve sample, taken at the bar close before that bar's
/// intents execute.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeLogStatus {
    Executed,
    /// Intent refused (insufficient cash, nothing to sell). Not an error.
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeLogEntry {
    pub date: NaiveDate,
    pub side: IntentSide,
    pub qty: f64,
    pub price: f64,
    pub fee: f64,
    /// Realized P&L against average cost; zero for buys.
    pub realized_pnl: f64,
    pub status: TradeLogStatus,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub strategy_name: String,
    pub initial_cash: f64,
    pub final_equity: f64,
    pub final_cash: f64,
    pub final_position_qty: f64,
    pub equity_curve: Vec<EquityPoint>,
    pub trade_log: Vec<TradeLogEntry>,
    pub metrics: PerformanceMetrics,
}

/// Deterministic single-symbol replay. Intents execute at the close of
/// the bar that produced them, slippage-free; intents that would drive
/// cash negative are logged as rejected.
pub struct BacktestEngine {
    initial_cash: f64,
    fees: FeeModel,
}

impl BacktestEngine {
    #[must_use]
    pub fn new(initial_cash: f64, fees: FeeModel) -> Self {
        Self { initial_cash, fees }
    }

    /// Runs the strategy over the series.
    ///
    /// # Errors
    /// `InvalidInput` for an empty series or non-positive starting cash.
    pub fn run(
        &self,
        strategy: &mut dyn Strategy,
        series: &BarSeries,
    ) -> Result<BacktestResult, CoreError> {
        if series.is_empty() {
            return Err(CoreError::InvalidInput("empty bar series".to_string()));
        }
        if self.initial_cash <= 0.0 {
            return Err(CoreError::InvalidInput(format!(
                "initial cash must be positive, got {}",
                self.initial_cash
            )));
        }

        let mut cash = self.initial_cash;
        let mut position_qty = 0.0f64;
        let mut avg_cost = 0.0f64;
        let mut equity_curve = Vec::with_capacity(series.len());
        let mut trade_log = Vec::new();
        let mut daily_returns = Vec::with_capacity(series.len());
        let mut prev_equity = self.initial_cash;

        for (index, bar) in series.iter().enumerate() {
            // 1. Mark to close and record the equity point.
            let equity = cash + position_qty * bar.close;
            equity_curve.push(EquityPoint {
                date: bar.date,
                equity,
            });
            if prev_equity > 0.0 {
                daily_returns.push((equity - prev_equity) / prev_equity);
            }
            prev_equity = equity;

            // 2. Let the strategy see the bar.
            let ctx = StrategyContext {
                index,
                cash,
                position_qty,
                avg_cost,
                equity,
            };
            let intents = strategy.on_bar(&ctx, bar);

            // 3. Execute at the same close.
            for intent in intents {
                let entry = self.execute(
                    intent,
                    bar.date,
                    bar.close,
                    &mut cash,
                    &mut position_qty,
                    &mut avg_cost,
                );
                trade_log.push(entry);
            }
            prev_equity = cash + position_qty * bar.close;
        }

        let last_bar = series.last().expect("non-empty series");
        let final_equity = cash + position_qty * last_bar.close;
        let ctx = StrategyContext {
            index: series.len() - 1,
            cash,
            position_qty,
            avg_cost,
            equity: final_equity,
        };
        strategy.on_end(&ctx);

        let metrics = PerformanceMetrics::compute(
            self.initial_cash,
            final_equity,
            &equity_curve,
            &daily_returns,
            &trade_log,
        );

        Ok(BacktestResult {
            strategy_name: strategy.name().to_string(),
            initial_cash: self.initial_cash,
            final_equity,
            final_cash: cash,
            final_position_qty: position_qty,
            equity_curve,
            trade_log,
            metrics,
        })
    }

    fn execute(
        &self,
        intent: Intent,
        date: NaiveDate,
        price: f64,
        cash: &mut f64,
        position_qty: &mut f64,
        avg_cost: &mut f64,
    ) -> TradeLogEntry {
        match intent.side {
            IntentSide::Buy => {
                let fee = self.fees.fee(intent.qty, price);
                let cost = intent.qty * price + fee;
                if intent.qty <= 0.0 || cost > *cash {
                    debug!(qty = intent.qty, cost, cash = *cash, "buy rejected");
                    return TradeLogEntry {
                        date,
                        side: IntentSide::Buy,
                        qty: intent.qty,
                        price,
                        fee: 0.0,
                        realized_pnl: 0.0,
                        status: TradeLogStatus::Rejected,
                        reason: if intent.qty <= 0.0 {
                            "non-positive quantity".to_string()
                        } else {
                            "insufficient cash".to_string()
                        },
                    };
                }
                *cash -= cost;
                let total_cost = *avg_cost * *position_qty + intent.qty * price;
                *position_qty += intent.qty;
                *avg_cost = total_cost / *position_qty;
                TradeLogEntry {
                    date,
                    side: IntentSide::Buy,
                    qty: intent.qty,
                    price,
                    fee,
                    realized_pnl: 0.0,
                    status: TradeLogStatus::Executed,
                    reason: intent.reason,
                }
            }
            IntentSide::Sell => {
                if intent.qty <= 0.0 || *position_qty <= 0.0 {
                    debug!(qty = intent.qty, held = *position_qty, "sell rejected");
                    return TradeLogEntry {
                        date,
                        side: IntentSide::Sell,
                        qty: intent.qty,
                        price,
                        fee: 0.0,
                        realized_pnl: 0.0,
                        status: TradeLogStatus::Rejected,
                        reason: "no position to sell".to_string(),
                    };
                }
                let qty = intent.qty.min(*position_qty);
                let fee = self.fees.fee(qty, price);
                let realized = (price - *avg_cost) * qty - fee;
                *cash += qty * price - fee;
                *position_qty -= qty;
                if *position_qty <= f64::EPSILON {
                    *position_qty = 0.0;
                    *avg_cost = 0.0;
                }
                TradeLogEntry {
                    date,
                    side: IntentSide::Sell,
                    qty,
                    price,
                    fee,
                    realized_pnl: realized,
                    status: TradeLogStatus::Executed,
                    reason: intent.reason,
                }
            }
        }
    }
}
