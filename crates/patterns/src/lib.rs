//! Geometric pattern detection over daily bar series.
//!
//! Volatility-contraction patterns, support/resistance levels, trend
//! lines, and the classic chart shapes (cup-and-handle,
//! head-and-shoulders, double tops/bottoms, triangles).

pub mod cup_handle;
pub mod double;
pub mod head_shoulders;
pub mod scanner;
pub mod support_resistance;
pub mod swings;
pub mod trendline;
pub mod triangle;
pub mod vcp;

pub use scanner::{PatternBias, PatternDetection, PatternKind, PatternScanner};
pub use support_resistance::{LevelKind, PriceLevel, SupportResistance, SupportResistanceResult};
pub use swings::{swing_points, SwingConfig};
pub use trendline::{TrendDirection, Trendline, TrendlineDetector, TrendlineResult};
pub use vcp::{Contraction, Vcp, VcpConfig, VcpResult, VcpStage};
