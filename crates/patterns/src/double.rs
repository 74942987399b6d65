//! Double top / double bottom detection.

use serde::{Deserialize, Serialize};
use stocklens_core::BarSeries;

use crate::scanner::{PatternBias, PatternDetection, PatternKind};
use crate::swings::{swing_points, SwingConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoubleTopBottomConfig {
    pub min_pattern_length: usize,
    pub max_pattern_length: usize,
    /// Relative mismatch tolerated between the two peaks/troughs.
    pub peak_tolerance: f64,
    /// The valley (or peak, for bottoms) must retrace at least this
    /// fraction from the extremes.
    pub min_valley_depth: f64,
    pub swing_window: usize,
}

impl Default for DoubleTopBottomConfig {
    fn default() -> Self {
        Self {
            min_pattern_length: 15,
            max_pattern_length: 60,
            peak_tolerance: 0.03,
            min_valley_depth: 0.05,
            swing_window: 5,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DoubleTopBottom {
    config: DoubleTopBottomConfig,
}

impl DoubleTopBottom {
    #[must_use]
    pub fn new(config: DoubleTopBottomConfig) -> Self {
        Self { config }
    }

    /// Tries the bearish double top first, then the double bottom.
    #[must_use]
    pub fn detect(&self, series: &BarSeries) -> PatternDetection {
        let result = self.detect_oriented(series, true);
        if result.detected {
            return result;
        }
        self.detect_oriented(series, false)
    }

    fn detect_oriented(&self, series: &BarSeries, is_top: bool) -> PatternDetection {
        let cfg = &self.config;
        let kind = if is_top {
            PatternKind::DoubleTop
        } else {
            PatternKind::DoubleBottom
        };
        let mut result = PatternDetection::not_detected(kind);

        let n = series.len();
        if n < cfg.min_pattern_length {
            return result;
        }

        let highs = series.highs();
        let lows = series.lows();
        let prices: &[f64] = if is_top { &highs } else { &lows };

        let swing_cfg = SwingConfig {
            window: cfg.swing_window,
            min_spacing: 0,
        };
        let extremes = swing_points(prices, is_top, &swing_cfg);
        if extremes.len() < 2 {
            return result;
        }

        for pair in extremes.windows(2) {
            let (first_idx, second_idx) = (pair[0], pair[1]);
            let (first, second) = (prices[first_idx], prices[second_idx]);

            let pattern_len = second_idx - first_idx;
            if pattern_len < cfg.min_pattern_length || pattern_len > cfg.max_pattern_length {
                continue;
            }

            let peak_diff = (first - second).abs() / first.max(second);
            if peak_diff > cfg.peak_tolerance {
                continue;
            }

            let between: &[f64] = if is_top {
                &lows[first_idx..second_idx]
            } else {
                &highs[first_idx..second_idx]
            };
            let (valley, valley_depth) = if is_top {
                let v = between.iter().copied().fold(f64::MAX, f64::min);
                (v, (first - v) / first)
            } else {
                let v = between.iter().copied().fold(f64::MIN, f64::max);
                (v, (v - first) / first)
            };
            if valley_depth < cfg.min_valley_depth {
                continue;
            }

            let avg_peak = (first + second) / 2.0;
            let height = (avg_peak - valley).abs();

            let mut score: f64 = 60.0;
            if peak_diff < 0.01 {
                score += 20.0;
            }
            if valley_depth > 0.08 {
                score += 10.0;
            }
            if second_idx >= n - 10 {
                score += 10.0;
            }

            result.detected = true;
            result.score = score.min(100.0);
            result.bias = if is_top {
                PatternBias::Bearish
            } else {
                PatternBias::Bullish
            };
            result.start_idx = first_idx;
            result.end_idx = second_idx;
            result.breakout_price = Some(valley);
            result.projected_target = Some(if is_top {
                valley - height
            } else {
                valley + height
            });
            result.stop_price = Some(if is_top {
                avg_peak * 1.02
            } else {
                avg_peak * 0.98
            });
            result.key_points = vec![
                ("first_extreme".to_string(), first),
                ("second_extreme".to_string(), second),
                ("valley".to_string(), valley),
            ];
            return result;
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use stocklens_core::Bar;

    fn series_from_path(path: &[f64]) -> BarSeries {
        let bars: Vec<Bar> = path
            .iter()
            .enumerate()
            .map(|(i, &p)| {
                let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                    + chrono::Duration::days(i as i64);
                Bar::new(date, p, p, p, p, 1_000.0)
            })
            .collect();
        BarSeries::new(bars).unwrap()
    }

    fn leg(path: &mut Vec<f64>, to: f64, bars: usize) {
        let from = *path.last().unwrap();
        for i in 1..=bars {
            path.push(from + (to - from) * i as f64 / bars as f64);
        }
    }

    /// Two peaks at 118/117.5 with a valley near 100.
    fn double_top_path() -> Vec<f64> {
        let mut path = vec![95.0];
        leg(&mut path, 118.0, 9);
        leg(&mut path, 100.0, 9);
        leg(&mut path, 117.5, 9);
        leg(&mut path, 98.0, 9);
        path
    }

    #[test]
    fn detects_double_top() {
        let detection = DoubleTopBottom::default().detect(&series_from_path(&double_top_path()));
        assert!(detection.detected);
        assert_eq!(detection.kind, PatternKind::DoubleTop);
        assert_eq!(detection.bias, PatternBias::Bearish);
        let valley = detection.breakout_price.unwrap();
        assert!((valley - 100.0).abs() < 1e-9);
        // Measured move projects the pattern height below the valley.
        assert!((detection.projected_target.unwrap() - (100.0 - 17.75)).abs() < 1e-9);
    }

    #[test]
    fn detects_double_bottom() {
        let path: Vec<f64> = double_top_path().into_iter().map(|p| 220.0 - p).collect();
        let detection = DoubleTopBottom::default().detect(&series_from_path(&path));
        assert!(detection.detected);
        assert_eq!(detection.kind, PatternKind::DoubleBottom);
        assert_eq!(detection.bias, PatternBias::Bullish);
        assert!(detection.projected_target.unwrap() > detection.breakout_price.unwrap());
    }

    #[test]
    fn mismatched_peaks_are_rejected() {
        let mut path = vec![95.0];
        leg(&mut path, 118.0, 9);
        leg(&mut path, 100.0, 9);
        leg(&mut path, 108.0, 9); // second peak 8.5% lower
        leg(&mut path, 98.0, 9);
        let detection = DoubleTopBottom::default().detect(&series_from_path(&path));
        assert!(!detection.detected);
    }

    #[test]
    fn shallow_valley_is_rejected() {
        let mut path = vec![110.0];
        leg(&mut path, 118.0, 9);
        leg(&mut path, 115.0, 9); // only a 2.5% dip
        leg(&mut path, 118.0, 9);
        leg(&mut path, 112.0, 9);
        let detection = DoubleTopBottom::default().detect(&series_from_path(&path));
        assert!(!detection.detected);
    }
}
