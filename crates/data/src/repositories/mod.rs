//! One repository per table. Upserts run inside a single short
//! transaction and report `rows_affected`, which is what makes a re-run
//! with an unchanged upstream log zero records.

mod account_repo;
mod alert_repo;
mod kline_repo;
mod position_repo;
mod snapshot_repo;
mod sync_log_repo;
mod trade_repo;
mod user_repo;
mod watchlist_repo;

pub use account_repo::AccountRepository;
pub use alert_repo::AlertRepository;
pub use kline_repo::KlineRepository;
pub use position_repo::PositionRepository;
pub use snapshot_repo::SnapshotRepository;
pub use sync_log_repo::SyncLogRepository;
pub use trade_repo::TradeRepository;
pub use user_repo::UserRepository;
pub use watchlist_repo::WatchlistRepository;
