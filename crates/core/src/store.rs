//! Store interfaces over the relational state.
//!
//! The sync orchestrator and monitor talk to these traits only; the `data`
//! crate implements them over PostgreSQL and tests swap in in-memory fakes.
//! Upserts return the number of rows actually written so a re-run with an
//! unchanged upstream reports zero records.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::bar::Bar;
use crate::market::Symbol;
use crate::traits::{CashPull, FillPull, PositionPull, WatchlistPull};

/// What a sync operation ingested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncKind {
    Positions,
    Trades,
    Klines,
    Watchlist,
    All,
}

impl SyncKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Positions => "POSITIONS",
            Self::Trades => "TRADES",
            Self::Klines => "KLINES",
            Self::Watchlist => "WATCHLIST",
            Self::All => "ALL",
        }
    }
}

/// Outcome recorded for a sync operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncStatus {
    Success,
    Failed,
    Partial,
}

impl SyncStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Partial => "PARTIAL",
        }
    }
}

/// Append-only sync log row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncLogRecord {
    pub user_id: Option<i64>,
    pub kind: SyncKind,
    pub status: SyncStatus,
    pub records_count: i64,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Minimal account identity the orchestrator works with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRef {
    pub id: i64,
    pub broker_acc_id: i64,
}

/// Price alert rule kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    Above,
    Below,
    ChangeUp,
    ChangeDown,
}

/// One active price alert rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceAlert {
    pub id: i64,
    pub user_id: i64,
    pub symbol: Symbol,
    pub kind: AlertKind,
    /// Target price for Above/Below, percent change for ChangeUp/ChangeDown.
    pub threshold: Decimal,
    /// Reference price for percent-change alerts.
    pub base_price: Option<Decimal>,
}

/// Daily OHLCV bars keyed by `(market, code, date)`, shared across users.
#[async_trait]
pub trait BarStore: Send + Sync {
    /// Idempotent upsert; returns rows actually inserted.
    async fn upsert_bars(&self, symbol: &Symbol, bars: &[Bar]) -> Result<u64>;

    /// Latest persisted trading date for the symbol.
    async fn latest_date(&self, symbol: &Symbol) -> Result<Option<NaiveDate>>;

    /// Bars in an inclusive range, ascending by date.
    async fn bars_in_range(
        &self,
        symbol: &Symbol,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Bar>>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn active_accounts(&self, user_id: i64) -> Result<Vec<AccountRef>>;
}

#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Inserts one day's position snapshot rows; returns rows inserted.
    async fn insert_snapshots(
        &self,
        account_id: i64,
        snapshot_date: NaiveDate,
        positions: &[PositionPull],
    ) -> Result<u64>;

    /// Distinct symbols held by the user on the given date.
    async fn held_symbols(&self, user_id: i64, snapshot_date: NaiveDate) -> Result<Vec<Symbol>>;
}

#[async_trait]
pub trait TradeStore: Send + Sync {
    /// Inserts fills deduplicated on `(account, deal_id)`; returns rows
    /// inserted.
    async fn insert_fills(&self, account_id: i64, fills: &[FillPull]) -> Result<u64>;
}

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Inserts the day's cash snapshot if absent; returns rows inserted.
    async fn insert_snapshot(
        &self,
        account_id: i64,
        snapshot_date: NaiveDate,
        cash: &CashPull,
    ) -> Result<u64>;
}

#[async_trait]
pub trait WatchlistStore: Send + Sync {
    /// Activates pulled rows and deactivates missing ones without deleting
    /// history; returns rows changed.
    async fn reconcile(&self, user_id: i64, entries: &[WatchlistPull]) -> Result<u64>;

    async fn active_symbols(&self, user_id: i64) -> Result<Vec<Symbol>>;
}

#[async_trait]
pub trait SyncLogStore: Send + Sync {
    async fn append(&self, record: &SyncLogRecord) -> Result<()>;

    async fn last(&self, user_id: i64, kind: SyncKind) -> Result<Option<SyncLogRecord>>;
}

#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn active_alerts(&self, user_id: i64) -> Result<Vec<PriceAlert>>;

    async fn mark_triggered(
        &self,
        alert_id: i64,
        price: Decimal,
        at: DateTime<Utc>,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_and_status_have_stable_wire_names() {
        assert_eq!(SyncKind::Positions.as_str(), "POSITIONS");
        assert_eq!(SyncKind::All.as_str(), "ALL");
        assert_eq!(SyncStatus::Partial.as_str(), "PARTIAL");
    }
}
