//! Strategy contract and execution intents.

use serde::{Deserialize, Serialize};
use stocklens_core::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentSide {
    Buy,
    Sell,
}

/// An order intent emitted by a strategy; executed at the same bar's
/// close.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub side: IntentSide,
    pub qty: f64,
    pub reason: String,
}

impl Intent {
    #[must_use]
    pub fn buy(qty: f64, reason: impl Into<String>) -> Self {
        Self {
            side: IntentSide::Buy,
            qty,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn sell(qty: f64, reason: impl Into<String>) -> Self {
        Self {
            side: IntentSide::Sell,
            qty,
            reason: reason.into(),
        }
    }
}

/// Read-only view of engine state handed to strategies.
#[derive(Debug, Clone, Copy)]
pub struct StrategyContext {
    /// Index of the current bar.
    pub index: usize,
    pub cash: f64,
    /// Quantity currently held.
    pub position_qty: f64,
    pub avg_cost: f64,
    /// Cash plus position marked at the current close.
    pub equity: f64,
}

/// Proportional commission on notional, both sides.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FeeModel {
    pub commission_rate: f64,
}

impl FeeModel {
    #[must_use]
    pub fn new(commission_rate: f64) -> Self {
        Self { commission_rate }
    }

    #[must_use]
    pub fn fee(&self, qty: f64, price: f64) -> f64 {
        qty * price * self.commission_rate
    }
}

/// A trading strategy replayed over a bar series. Purely computational;
/// the engine drives it bar by bar.
pub trait Strategy {
    /// Called once per bar after positions are marked. Returned intents
    /// execute at this bar's close.
    fn on_bar(&mut self, ctx: &StrategyContext, bar: &Bar) -> Vec<Intent>;

    /// Called after the last bar.
    fn on_end(&mut self, _ctx: &StrategyContext) {}

    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_is_proportional_to_notional() {
        let fees = FeeModel::new(0.001);
        assert!((fees.fee(100.0, 50.0) - 5.0).abs() < 1e-9);
        assert_eq!(FeeModel::default().fee(100.0, 50.0), 0.0);
    }
}
