//! Triangle consolidation detection: ascending, descending, symmetrical.

use serde::{Deserialize, Serialize};
use stocklens_core::BarSeries;

use crate::scanner::{PatternBias, PatternDetection, PatternKind};
use crate::swings::{swing_points, SwingConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriangleConfig {
    pub min_pattern_length: usize,
    /// Minimum combined swing touches on the two boundary lines.
    pub min_touches: usize,
    /// The boundary lines must close at least this fraction of the
    /// starting width by the last bar.
    pub convergence_threshold: f64,
    /// |slope| below this counts as a flat boundary, in price units per bar.
    pub flat_slope: f64,
    pub swing_window: usize,
}

impl Default for TriangleConfig {
    fn default() -> Self {
        Self {
            min_pattern_length: 15,
            min_touches: 4,
            convergence_threshold: 0.5,
            flat_slope: 0.02,
            swing_window: 3,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrianglePattern {
    config: TriangleConfig,
}

impl TrianglePattern {
    #[must_use]
    pub fn new(config: TriangleConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn detect(&self, series: &BarSeries) -> PatternDetection {
        let cfg = &self.config;
        let mut result = PatternDetection::not_detected(PatternKind::SymmetricalTriangle);

        let n = series.len();
        if n < cfg.min_pattern_length {
            return result;
        }

        let highs = series.highs();
        let lows = series.lows();

        let swing_cfg = SwingConfig {
            window: cfg.swing_window,
            min_spacing: 0,
        };
        let swing_highs = swing_points(&highs, true, &swing_cfg);
        let swing_lows = swing_points(&lows, false, &swing_cfg);
        if swing_highs.len() < 2 || swing_lows.len() < 2 {
            return result;
        }
        if swing_highs.len() + swing_lows.len() < cfg.min_touches {
            return result;
        }

        let (high_slope, high_intercept) = fit_line(&swing_highs, &highs);
        let (low_slope, low_intercept) = fit_line(&swing_lows, &lows);

        let (kind, bias) = if high_slope.abs() < cfg.flat_slope && low_slope > cfg.flat_slope {
            (PatternKind::AscendingTriangle, PatternBias::Bullish)
        } else if high_slope < -cfg.flat_slope && low_slope.abs() < cfg.flat_slope {
            (PatternKind::DescendingTriangle, PatternBias::Bearish)
        } else if high_slope < 0.0 && low_slope > 0.0 {
            (PatternKind::SymmetricalTriangle, PatternBias::Neutral)
        } else {
            return result;
        };

        let first_idx = swing_highs[0].min(swing_lows[0]) as f64;
        let last_idx = (n - 1) as f64;
        let start_width = (high_slope * first_idx + high_intercept)
            - (low_slope * first_idx + low_intercept);
        let end_high = high_slope * last_idx + high_intercept;
        let end_low = low_slope * last_idx + low_intercept;
        let end_width = end_high - end_low;
        if start_width <= 0.0 {
            return result;
        }

        let convergence = 1.0 - end_width / start_width;
        if convergence < cfg.convergence_threshold {
            return result;
        }

        let touches = swing_highs.len() + swing_lows.len();
        let mut score = 50.0;
        score += (touches.min(8) as f64) * 5.0;
        if convergence > 0.8 {
            score += 10.0;
        }
        let last_swing = swing_highs
            .last()
            .copied()
            .unwrap_or(0)
            .max(swing_lows.last().copied().unwrap_or(0));
        if last_swing >= n - 10 {
            score += 10.0;
        }

        result.kind = kind;
        result.detected = true;
        result.score = score.min(100.0);
        result.bias = bias;
        result.start_idx = first_idx as usize;
        result.end_idx = n - 1;
        match kind {
            PatternKind::AscendingTriangle => {
                result.breakout_price = Some(end_high);
                result.projected_target = Some(end_high + start_width);
                result.stop_price = Some(end_low * 0.98);
            }
            PatternKind::DescendingTriangle => {
                result.breakout_price = Some(end_low);
                result.projected_target = Some(end_low - start_width);
                result.stop_price = Some(end_high * 1.02);
            }
            _ => {
                // A symmetrical triangle can break either way.
                result.breakout_price = Some((end_high + end_low) / 2.0);
            }
        }
        result.key_points = vec![
            ("upper_slope".to_string(), high_slope),
            ("lower_slope".to_string(), low_slope),
            ("convergence".to_string(), convergence),
        ];

        result
    }
}

/// Least-squares line through `(index, price)` swing points.
fn fit_line(points: &[usize], prices: &[f64]) -> (f64, f64) {
    let n = points.len() as f64;
    let xs: Vec<f64> = points.iter().map(|&i| i as f64).collect();
    let ys: Vec<f64> = points.iter().map(|&i| prices[i]).collect();
    let mx = xs.iter().sum::<f64>() / n;
    let my = ys.iter().sum::<f64>() / n;
    let mut num = 0.0;
    let mut den = 0.0;
    for i in 0..points.len() {
        num += (xs[i] - mx) * (ys[i] - my);
        den += (xs[i] - mx).powi(2);
    }
    if den == 0.0 {
        return (0.0, my);
    }
    let slope = num / den;
    (slope, my - slope * mx)
}
