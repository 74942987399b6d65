//! Per-symbol composite scoring.
//!
//! Five subscores in [0, 100] (trend, momentum, volatility, volume,
//! pattern) combine into a weighted composite that maps onto a rating
//! band. Scores are memoized per symbol in a TTL cache.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use stocklens_core::cache::TtlCache;
use stocklens_core::{BarSeries, Symbol};
use stocklens_indicators::{
    detect_divergence, BollingerBands, DivergenceConfig, Macd, MovingAverages, Obv, Rsi,
};
use stocklens_patterns::{PatternBias, PatternScanner, Vcp, VcpStage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rating {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl Rating {
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 75.0 {
            Self::StrongBuy
        } else if score >= 60.0 {
            Self::Buy
        } else if score >= 45.0 {
            Self::Hold
        } else if score >= 25.0 {
            Self::Sell
        } else {
            Self::StrongSell
        }
    }
}

/// Subscore weights; normalized at use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub trend: f64,
    pub momentum: f64,
    pub volatility: f64,
    pub volume: f64,
    pub pattern: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            trend: 30.0,
            momentum: 20.0,
            volatility: 10.0,
            volume: 15.0,
            pattern: 25.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeScore {
    pub trend: f64,
    pub momentum: f64,
    pub volatility: f64,
    pub volume: f64,
    pub pattern: f64,
    pub composite: f64,
    pub rating: Rating,
    pub signals: Vec<String>,
}

pub struct CompositeScorer {
    weights: ScoreWeights,
    /// Bars of history scored.
    window: usize,
    cache: TtlCache<String, CompositeScore>,
}

impl Default for CompositeScorer {
    fn default() -> Self {
        Self::new(ScoreWeights::default(), 120, Duration::from_secs(300))
    }
}

impl CompositeScorer {
    #[must_use]
    pub fn new(weights: ScoreWeights, window: usize, cache_ttl: Duration) -> Self {
        Self {
            weights,
            window,
            cache: TtlCache::new(cache_ttl),
        }
    }

    /// Scores a symbol over the trailing window. Results are cached per
    /// `(symbol, last bar date)`.
    #[must_use]
    pub fn score(&self, symbol: &Symbol, series: &BarSeries) -> CompositeScore {
        let cache_key = match series.last() {
            Some(last) => format!("{symbol}@{}", last.date),
            None => symbol.to_string(),
        };
        if let Some(cached) = self.cache.get(&cache_key) {
            return cached;
        }

        let window = series.tail(self.window);
        let closes = window.closes();
        let volumes = window.volumes();
        let mut signals = Vec::new();

        let trend = Self::trend_score(&closes, &mut signals);
        let momentum = Self::momentum_score(&closes, &mut signals);
        let volatility = Self::volatility_score(&closes, &mut signals);
        let volume = Self::volume_score(&closes, &volumes, &mut signals);
        let pattern = Self::pattern_score(&window, &mut signals);

        let w = &self.weights;
        let weight_sum = w.trend + w.momentum + w.volatility + w.volume + w.pattern;
        let composite = if weight_sum > 0.0 {
            (trend * w.trend
                + momentum * w.momentum
                + volatility * w.volatility
                + volume * w.volume
                + pattern * w.pattern)
                / weight_sum
        } else {
            50.0
        };

        let result = CompositeScore {
            trend,
            momentum,
            volatility,
            volume,
            pattern,
            composite,
            rating: Rating::from_score(composite),
            signals,
        };
        self.cache.insert(cache_key, result.clone());
        result
    }

    /// MA alignment, price vs MA20, MA20 slope.
    fn trend_score(closes: &[f64], signals: &mut Vec<String>) -> f64 {
        let mut score: f64 = 50.0;
        let panel = MovingAverages::compute(closes);
        let last = closes.len().saturating_sub(1);

        if let (Some(ma5), Some(ma10), Some(ma20)) = (
            panel.ma5.get(last),
            panel.ma10.get(last),
            panel.ma20.get(last),
        ) {
            if ma5 > ma10 && ma10 > ma20 {
                score += 20.0;
                signals.push("moving averages stacked bullishly".to_string());
            } else if ma5 < ma10 && ma10 < ma20 {
                score -= 20.0;
                signals.push("moving averages stacked bearishly".to_string());
            }

            let price = closes[last];
            if price > ma20 {
                score += 15.0;
            } else if price < ma20 {
                score -= 15.0;
            }
        }

        if last >= 5 {
            if let (Some(now), Some(then)) = (panel.ma20.get(last), panel.ma20.get(last - 5)) {
                if now > then {
                    score += 15.0;
                } else if now < then {
                    score -= 15.0;
                }
            }
        }

        score.clamp(0.0, 100.0)
    }

    /// RSI band, MACD cross state, MACD vs zero.
    fn momentum_score(closes: &[f64], signals: &mut Vec<String>) -> f64 {
        let mut score: f64 = 50.0;
        let last = closes.len().saturating_sub(1);

        if let Ok(rsi) = Rsi::new(14) {
            if let Some(value) = rsi.compute(closes).get(last) {
                if value < 30.0 {
                    score += 10.0;
                    signals.push(format!("RSI oversold at {value:.0}"));
                } else if value > 70.0 {
                    score -= 10.0;
                    signals.push(format!("RSI overbought at {value:.0}"));
                }
            }
        }

        let macd = Macd::default_params().compute(closes);
        // Count a cross as current if it fired within the last 3 bars.
        let recent_cross = macd
            .crossover
            .iter()
            .rev()
            .take(3)
            .find(|&&c| c != 0)
            .copied()
            .unwrap_or(0);
        if recent_cross > 0 {
            score += 20.0;
            signals.push("MACD bullish cross".to_string());
        } else if recent_cross < 0 {
            score -= 20.0;
            signals.push("MACD bearish cross".to_string());
        }
        if let Some(line) = macd.macd.get(last) {
            if line > 0.0 {
                score += 10.0;
            } else if line < 0.0 {
                score -= 10.0;
            }
        }

        score.clamp(0.0, 100.0)
    }

    /// Bollinger %B position and bandwidth band.
    fn volatility_score(closes: &[f64], signals: &mut Vec<String>) -> f64 {
        let mut score: f64 = 50.0;
        let last = closes.len().saturating_sub(1);
        let bands = BollingerBands::default_params().compute(closes);

        if let Some(percent_b) = bands.percent_b.get(last) {
            if (0.3..=0.7).contains(&percent_b) {
                score += 10.0;
            } else if percent_b > 0.95 {
                score -= 10.0;
                signals.push("pressing the upper band".to_string());
            } else if percent_b < 0.05 {
                score -= 5.0;
                signals.push("pressing the lower band".to_string());
            }
        }

        if let Some(width) = bands.bandwidth.get(last) {
            if width < 0.05 {
                score += 10.0;
                signals.push("volatility squeeze".to_string());
            } else if width > 0.25 {
                score -= 10.0;
            }
        }

        score.clamp(0.0, 100.0)
    }

    /// OBV slope and price/OBV divergence.
    fn volume_score(closes: &[f64], volumes: &[f64], signals: &mut Vec<String>) -> f64 {
        let mut score: f64 = 50.0;
        let out = Obv::new().compute(closes, volumes);
        let last = closes.len().saturating_sub(1);

        let lookback = 20.min(last);
        if lookback > 0 {
            if let (Some(now), Some(then)) = (out.obv.get(last), out.obv.get(last - lookback)) {
                if now > then {
                    score += 20.0;
                } else if now < then {
                    score -= 20.0;
                }
            }
        }

        let markers = detect_divergence(closes, &out.obv, &DivergenceConfig::default());
        match markers.iter().rev().take(10).find(|&&m| m != 0) {
            Some(&1) => {
                score += 15.0;
                signals.push("bullish volume divergence".to_string());
            }
            Some(&-1) => {
                score -= 15.0;
                signals.push("bearish volume divergence".to_string());
            }
            _ => {}
        }

        score.clamp(0.0, 100.0)
    }

    /// VCP score primarily, with contributions from other detections.
    fn pattern_score(window: &BarSeries, signals: &mut Vec<String>) -> f64 {
        let vcp = Vcp::default().detect(window);
        let mut score = 30.0 + vcp.score * 0.6;
        if vcp.is_vcp {
            signals.push(format!(
                "volatility contraction, stage {:?}, score {:.0}",
                vcp.stage, vcp.score
            ));
        }
        if vcp.stage == VcpStage::Breakout {
            score += 10.0;
        }

        for detection in PatternScanner::new().scan(window) {
            let contribution = detection.score / 100.0 * 10.0;
            match detection.bias {
                PatternBias::Bullish => score += contribution,
                PatternBias::Bearish => score -= contribution,
                PatternBias::Neutral => {}
            }
        }

        score.clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use stocklens_core::{Bar, Market};

    fn series(closes: &[f64], volumes: &[f64]) -> BarSeries {
        let bars: Vec<Bar> = closes
            .iter()
            .zip(volumes)
            .enumerate()
            .map(|(i, (&c, &v))| {
                let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                    + chrono::Duration::days(i as i64);
                Bar::new(date, c, c, c, c, v)
            })
            .collect();
        BarSeries::new(bars).unwrap()
    }

    fn symbol() -> Symbol {
        Symbol::new(Market::Hk, "00700")
    }

    #[test]
    fn rating_bands() {
        assert_eq!(Rating::from_score(80.0), Rating::StrongBuy);
        assert_eq!(Rating::from_score(75.0), Rating::StrongBuy);
        assert_eq!(Rating::from_score(67.0), Rating::Buy);
        assert_eq!(Rating::from_score(50.0), Rating::Hold);
        assert_eq!(Rating::from_score(45.0), Rating::Hold);
        assert_eq!(Rating::from_score(30.0), Rating::Sell);
        assert_eq!(Rating::from_score(10.0), Rating::StrongSell);
    }

    #[test]
    fn uptrend_scores_above_downtrend() {
        let n = 120;
        let up: Vec<f64> = (0..n).map(|i| 100.0 + f64::from(i) * 0.8).collect();
        let down: Vec<f64> = (0..n).map(|i| 200.0 - f64::from(i) * 0.8).collect();
        let vols = vec![1_000.0; n as usize];

        let scorer = CompositeScorer::default();
        let bullish = scorer.score(&symbol(), &series(&up, &vols));
        let bearish = scorer.score(&Symbol::new(Market::Us, "NVDA"), &series(&down, &vols));

        assert!(bullish.composite > bearish.composite);
        assert!(bullish.trend > 60.0);
        assert!(bearish.trend < 40.0);
    }

    #[test]
    fn subscores_stay_in_bounds() {
        let n = 120;
        let closes: Vec<f64> = (0..n)
            .map(|i| 100.0 + (f64::from(i) * 0.4).sin() * 15.0)
            .collect();
        let vols: Vec<f64> = (0..n).map(|i| 1_000.0 + f64::from(i % 13) * 50.0).collect();
        let result = CompositeScorer::default().score(&symbol(), &series(&closes, &vols));

        for value in [
            result.trend,
            result.momentum,
            result.volatility,
            result.volume,
            result.pattern,
            result.composite,
        ] {
            assert!((0.0..=100.0).contains(&value), "out of bounds: {value}");
        }
    }

    #[test]
    fn repeated_scoring_hits_the_cache() {
        let n = 120;
        let closes: Vec<f64> = (0..n).map(|i| 100.0 + f64::from(i) * 0.5).collect();
        let vols = vec![1_000.0; n as usize];
        let scorer = CompositeScorer::default();
        let s = series(&closes, &vols);

        let first = scorer.score(&symbol(), &s);
        let second = scorer.score(&symbol(), &s);
        assert_eq!(first.composite, second.composite);
        assert_eq!(first.rating, second.rating);
    }

    #[test]
    fn custom_weights_shift_the_composite() {
        let n = 120;
        let closes: Vec<f64> = (0..n).map(|i| 100.0 + f64::from(i) * 0.8).collect();
        let vols = vec![1_000.0; n as usize];
        let s = series(&closes, &vols);

        let trend_only = CompositeScorer::new(
            ScoreWeights {
                trend: 100.0,
                momentum: 0.0,
                volatility: 0.0,
                volume: 0.0,
                pattern: 0.0,
            },
            120,
            Duration::from_secs(60),
        );
        let result = trend_only.score(&symbol(), &s);
        assert!((result.composite - result.trend).abs() < 1e-9);
    }
}
