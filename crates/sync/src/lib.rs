//! Ingest coordination.
//!
//! The orchestrator pulls from the quote and broker providers into the
//! relational stores with idempotent upserts, bounded per-symbol
//! concurrency, per-call deadlines, retry with backoff, and an
//! append-only sync log. The monitor evaluates price alerts against the
//! latest persisted closes.

pub mod monitor;
pub mod orchestrator;
pub mod retry;
pub mod session;

pub use monitor::{AlertMonitor, TriggeredAlert};
pub use orchestrator::{SyncOrchestrator, SyncOutcome, SyncStores, UserRef};
pub use retry::with_retry;
pub use session::{with_broker_session, BrokerSessionFactory};
