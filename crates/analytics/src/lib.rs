//! Portfolio, trade and scoring analytics.
//!
//! Stateless computations over positions, fills and bar series: the
//! portfolio analyzer with its risk metrics, LIFO round-trip pairing,
//! trade statistics, and the per-symbol composite scorer.

pub mod pairing;
pub mod portfolio;
pub mod scoring;
pub mod statistics;

pub use pairing::{Instrument, PairingOutcome, RoundTrip, TradeFill, TradePairer};
pub use portfolio::{
    ConcentrationRisk, MarketAllocation, PortfolioAnalysis, PortfolioAnalyzer, PositionInput,
    PositionMetrics, RiskMetrics,
};
pub use scoring::{CompositeScore, CompositeScorer, Rating, ScoreWeights};
pub use statistics::{MonthlyPnl, RatioBucket, StatisticsCalculator, TradeStatistics};
