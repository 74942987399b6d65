//! Core domain types shared by every stocklens crate.
//!
//! Markets and symbols, daily bars and validated bar series, the error
//! taxonomy, provider/store traits, cancellation, configuration, and the
//! process-local TTL cache.

pub mod bar;
pub mod cache;
pub mod cancel;
pub mod config;
pub mod error;
pub mod market;
pub mod store;
pub mod traits;

pub use bar::{Bar, BarSeries};
pub use cancel::{cancel_pair, CancelHandle, CancelToken};
pub use config::{MultiplierTable, SyncConfig};
pub use error::{CoreError, ErrorKind};
pub use market::{Market, Symbol};
