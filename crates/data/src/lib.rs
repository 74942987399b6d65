//! PostgreSQL persistence for stocklens.
//!
//! Row models mirror the relational schema; one repository per table
//! wraps idempotent upserts and range queries. Repositories also
//! implement the `stocklens_core::store` traits consumed by the sync
//! orchestrator.

pub mod database;
pub mod models;
pub mod repositories;

pub use database::DatabaseClient;
pub use models::{
    AccountRecord, AccountSnapshotRecord, KlineRecord, PositionRecord, PriceAlertRecord,
    SyncLogRecord, TradeRecord, UserRecord, WatchlistRecord,
};
pub use repositories::{
    AccountRepository, AlertRepository, KlineRepository, PositionRepository, SnapshotRepository,
    SyncLogRepository, TradeRepository, UserRepository, WatchlistRepository,
};
