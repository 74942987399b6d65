//! Technical indicator engine.
//!
//! Every computation returns values aligned to bar indices; positions
//! before the warm-up window are absent, never zero-filled. Input series
//! come pre-validated from `stocklens_core::BarSeries`, so the functions
//! here take plain slices.

pub mod bollinger;
pub mod divergence;
pub mod ma;
pub mod macd;
pub mod obv;
pub mod rsi;
pub mod series;

pub use bollinger::{BollingerBands, BollingerOutput};
pub use divergence::{detect_divergence, DivergenceConfig};
pub use ma::{Ema, MovingAverages, Sma, Wma};
pub use macd::{Macd, MacdOutput};
pub use obv::{Obv, ObvOutput};
pub use rsi::{Rsi, StochRsi, StochRsiOutput};
pub use series::Series;
