//! Historical strategy simulation.
//!
//! Single-threaded bar replay with position accounting: strategies emit
//! intents per bar, the engine executes them at the same close, and the
//! run produces an equity curve plus performance statistics.

pub mod engine;
pub mod metrics;
pub mod strategies;
pub mod strategy;

pub use engine::{BacktestEngine, BacktestResult, EquityPoint, TradeLogEntry, TradeLogStatus};
pub use metrics::PerformanceMetrics;
pub use strategies::ma_cross::{MaCrossConfig, MaCrossStrategy, MaKind};
pub use strategies::vcp_breakout::{VcpBreakoutConfig, VcpBreakoutStrategy};
pub use strategy::{FeeModel, Intent, IntentSide, Strategy, StrategyContext};
