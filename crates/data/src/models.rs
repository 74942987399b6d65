//! Row models for the relational schema.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

/// `users(id, username UNIQUE, ...)`
#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// `accounts(..., UNIQUE(user_id, broker_acc_id))`
#[derive(Debug, Clone, FromRow)]
pub struct AccountRecord {
    pub id: i64,
    pub user_id: i64,
    pub broker_acc_id: i64,
    pub account_name: Option<String>,
    pub account_type: String,
    pub market: String,
    pub currency: String,
    pub active: bool,
}

/// Daily position snapshot, `UNIQUE(account_id, snapshot_date, market, code)`.
#[derive(Debug, Clone, FromRow)]
pub struct PositionRecord {
    pub id: i64,
    pub account_id: i64,
    pub snapshot_date: NaiveDate,
    pub market: String,
    pub code: String,
    pub stock_name: Option<String>,
    pub qty: Decimal,
    pub can_sell_qty: Option<Decimal>,
    pub cost_price: Option<Decimal>,
    pub market_price: Option<Decimal>,
    pub market_value: Option<Decimal>,
    pub pl_value: Option<Decimal>,
    pub pl_ratio: Option<Decimal>,
    pub position_side: String,
}

/// Executed fill, `UNIQUE(account_id, deal_id)`.
#[derive(Debug, Clone, FromRow)]
pub struct TradeRecord {
    pub id: i64,
    pub account_id: i64,
    pub deal_id: String,
    pub order_id: Option<String>,
    pub trade_time: DateTime<Utc>,
    pub market: String,
    pub code: String,
    pub stock_name: Option<String>,
    pub trd_side: String,
    pub qty: Decimal,
    pub price: Decimal,
    pub amount: Option<Decimal>,
    pub fee: Option<Decimal>,
    pub currency: Option<String>,
}

/// Daily account cash snapshot, `UNIQUE(account_id, snapshot_date)`.
#[derive(Debug, Clone, FromRow)]
pub struct AccountSnapshotRecord {
    pub id: i64,
    pub account_id: i64,
    pub snapshot_date: NaiveDate,
    pub total_assets: Option<Decimal>,
    pub cash: Option<Decimal>,
    pub market_value: Option<Decimal>,
    pub frozen_cash: Option<Decimal>,
    pub buying_power: Option<Decimal>,
    pub currency: Option<String>,
}

/// Daily bar, `UNIQUE(market, code, trade_date)`, shared across users.
#[derive(Debug, Clone, FromRow)]
pub struct KlineRecord {
    pub market: String,
    pub code: String,
    pub trade_date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Option<i64>,
    pub amount: Option<Decimal>,
    pub turnover_rate: Option<Decimal>,
    pub change_pct: Option<Decimal>,
    pub ma5: Option<Decimal>,
    pub ma10: Option<Decimal>,
    pub ma20: Option<Decimal>,
    pub ma60: Option<Decimal>,
    pub obv: Option<i64>,
}

/// Watchlist row, `UNIQUE(user_id, market, code)`.
#[derive(Debug, Clone, FromRow)]
pub struct WatchlistRecord {
    pub id: i64,
    pub user_id: i64,
    pub market: String,
    pub code: String,
    pub stock_name: Option<String>,
    pub group_name: Option<String>,
    pub notes: Option<String>,
    pub sort_order: i32,
    pub active: bool,
}

/// Append-only sync log row.
#[derive(Debug, Clone, FromRow)]
pub struct SyncLogRecord {
    pub id: i64,
    pub user_id: Option<i64>,
    pub sync_type: String,
    pub status: String,
    pub records_count: i64,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Price alert rule.
#[derive(Debug, Clone, FromRow)]
pub struct PriceAlertRecord {
    pub id: i64,
    pub user_id: i64,
    pub market: String,
    pub code: String,
    pub alert_type: String,
    pub target_price: Option<Decimal>,
    pub target_change_pct: Option<Decimal>,
    pub base_price: Option<Decimal>,
    pub active: bool,
    pub triggered_at: Option<DateTime<Utc>>,
    pub triggered_price: Option<Decimal>,
}

impl KlineRecord {
    /// Builds a row from an analytic bar. Prices round through `Decimal`;
    /// volume is stored as whole units.
    #[must_use]
    pub fn from_bar(symbol: &stocklens_core::Symbol, bar: &stocklens_core::Bar) -> Self {
        use rust_decimal::prelude::FromPrimitive;
        let dec = |v: f64| Decimal::from_f64(v).unwrap_or_default();
        Self {
            market: symbol.market.as_str().to_string(),
            code: symbol.code.clone(),
            trade_date: bar.date,
            open: dec(bar.open),
            high: dec(bar.high),
            low: dec(bar.low),
            close: dec(bar.close),
            volume: Some(bar.volume as i64),
            amount: bar.amount.map(dec),
            turnover_rate: bar.turnover_rate.map(dec),
            change_pct: bar.change_pct.map(dec),
            ma5: None,
            ma10: None,
            ma20: None,
            ma60: None,
            obv: None,
        }
    }

    /// Converts back to the analytic bar representation.
    #[must_use]
    pub fn to_bar(&self) -> stocklens_core::Bar {
        use rust_decimal::prelude::ToPrimitive;
        let f = |v: Decimal| v.to_f64().unwrap_or(0.0);
        stocklens_core::Bar {
            date: self.trade_date,
            open: f(self.open),
            high: f(self.high),
            low: f(self.low),
            close: f(self.close),
            volume: self.volume.unwrap_or(0) as f64,
            amount: self.amount.map(f),
            turnover_rate: self.turnover_rate.map(f),
            change_pct: self.change_pct.map(f),
        }
    }
}
