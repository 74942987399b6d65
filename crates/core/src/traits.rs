//! Provider interfaces the core consumes.
//!
//! Authentication and transport live outside the core: a `BrokerProvider`
//! is an already-connected session handle, a `QuoteProvider` wraps whatever
//! market-data client the host wires in. Every call takes a cancellation
//! token so an orchestrator shutdown reaches in-flight requests.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::bar::Bar;
use crate::cancel::CancelToken;
use crate::error::CoreError;
use crate::market::{Market, Symbol};

/// Which side a position or fill is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// Sign applied to P&L arithmetic.
    #[must_use]
    pub const fn sign(self) -> f64 {
        match self {
            Self::Long => 1.0,
            Self::Short => -1.0,
        }
    }
}

/// Fill direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

/// Account as reported by the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerAccount {
    pub broker_acc_id: i64,
    pub name: Option<String>,
    pub market: Market,
    pub currency: String,
}

/// One position row as pulled from the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionPull {
    pub market: Market,
    pub code: String,
    pub name: Option<String>,
    pub qty: Decimal,
    pub can_sell_qty: Option<Decimal>,
    pub cost_price: Option<Decimal>,
    pub market_price: Option<Decimal>,
    pub market_value: Option<Decimal>,
    pub pl_value: Option<Decimal>,
    pub pl_ratio: Option<Decimal>,
    pub side: PositionSide,
}

/// One executed fill as pulled from the broker. `deal_id` is the
/// idempotency key within an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillPull {
    pub deal_id: String,
    pub order_id: Option<String>,
    pub trade_time: DateTime<Utc>,
    pub market: Market,
    pub code: String,
    pub name: Option<String>,
    pub side: TradeSide,
    pub qty: Decimal,
    pub price: Decimal,
    pub amount: Option<Decimal>,
    pub fee: Option<Decimal>,
    pub currency: Option<String>,
}

/// Cash/assets snapshot as pulled from the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashPull {
    pub total_assets: Option<Decimal>,
    pub cash: Option<Decimal>,
    pub market_value: Option<Decimal>,
    pub frozen_cash: Option<Decimal>,
    pub buying_power: Option<Decimal>,
    pub currency: Option<String>,
}

/// One watchlist row as pulled from the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistPull {
    pub symbol: Symbol,
    pub name: Option<String>,
    pub group: Option<String>,
    pub sort_order: i32,
}

/// Daily-bar source. Bars come back ascending by date, full calendar days.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Fetches daily bars for one symbol over an inclusive day range.
    ///
    /// # Errors
    /// `NotFound`, `Transient`, `ProviderInvalid`, or `InvalidInput` for a
    /// reversed range.
    async fn fetch_bars(
        &self,
        symbol: &Symbol,
        from: NaiveDate,
        to: NaiveDate,
        cancel: &CancelToken,
    ) -> Result<Vec<Bar>, CoreError>;
}

/// Already-connected brokerage session.
#[async_trait]
pub trait BrokerProvider: Send + Sync {
    async fn list_accounts(
        &self,
        user: &str,
        cancel: &CancelToken,
    ) -> Result<Vec<BrokerAccount>, CoreError>;

    async fn fetch_positions(
        &self,
        broker_acc_id: i64,
        cancel: &CancelToken,
    ) -> Result<Vec<PositionPull>, CoreError>;

    async fn fetch_account_info(
        &self,
        broker_acc_id: i64,
        cancel: &CancelToken,
    ) -> Result<CashPull, CoreError>;

    async fn fetch_today_deals(
        &self,
        broker_acc_id: i64,
        cancel: &CancelToken,
    ) -> Result<Vec<FillPull>, CoreError>;

    async fn fetch_historical_deals(
        &self,
        broker_acc_id: i64,
        from: NaiveDate,
        to: NaiveDate,
        cancel: &CancelToken,
    ) -> Result<Vec<FillPull>, CoreError>;

    async fn fetch_watchlist(
        &self,
        user: &str,
        cancel: &CancelToken,
    ) -> Result<Vec<WatchlistPull>, CoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_sign_drives_pl_arithmetic() {
        assert_eq!(PositionSide::Long.sign(), 1.0);
        assert_eq!(PositionSide::Short.sign(), -1.0);
    }
}
