//! Head-and-shoulders detection, regular and inverse.

use serde::{Deserialize, Serialize};
use stocklens_core::BarSeries;

use crate::scanner::{PatternBias, PatternDetection, PatternKind};
use crate::swings::{swing_points, SwingConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadShouldersConfig {
    pub min_pattern_length: usize,
    pub max_pattern_length: usize,
    /// Relative height mismatch tolerated between the shoulders.
    pub shoulder_tolerance: f64,
    /// The head must exceed the shoulders by at least this fraction.
    pub head_min_diff: f64,
    /// Relative neckline slope tolerated.
    pub neckline_tolerance: f64,
    pub swing_window: usize,
}

impl Default for HeadShouldersConfig {
    fn default() -> Self {
        Self {
            min_pattern_length: 30,
            max_pattern_length: 100,
            shoulder_tolerance: 0.05,
            head_min_diff: 0.03,
            neckline_tolerance: 0.05,
            swing_window: 5,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeadAndShoulders {
    config: HeadShouldersConfig,
}

impl HeadAndShoulders {
    #[must_use]
    pub fn new(config: HeadShouldersConfig) -> Self {
        Self { config }
    }

    /// Tries the bearish top formation first, then the inverse.
    #[must_use]
    pub fn detect(&self, series: &BarSeries) -> PatternDetection {
        let result = self.detect_oriented(series, false);
        if result.detected {
            return result;
        }
        self.detect_oriented(series, true)
    }

    fn detect_oriented(&self, series: &BarSeries, inverse: bool) -> PatternDetection {
        let cfg = &self.config;
        let kind = if inverse {
            PatternKind::InverseHeadAndShoulders
        } else {
            PatternKind::HeadAndShoulders
        };
        let mut result = PatternDetection::not_detected(kind);

        let n = series.len();
        if n < cfg.min_pattern_length {
            return result;
        }

        let highs = series.highs();
        let lows = series.lows();
        let prices: &[f64] = if inverse { &lows } else { &highs };

        let swing_cfg = SwingConfig {
            window: cfg.swing_window,
            min_spacing: 0,
        };
        let extremes = swing_points(prices, !inverse, &swing_cfg);
        if extremes.len() < 3 {
            return result;
        }

        for triple in extremes.windows(3) {
            let (ls_idx, head_idx, rs_idx) = (triple[0], triple[1], triple[2]);
            let (ls, head, rs) = (prices[ls_idx], prices[head_idx], prices[rs_idx]);

            let pattern_len = rs_idx - ls_idx;
            if pattern_len < cfg.min_pattern_length || pattern_len > cfg.max_pattern_length {
                continue;
            }

            let shoulder_diff = (ls - rs).abs() / ls.max(rs);
            if shoulder_diff > cfg.shoulder_tolerance {
                continue;
            }

            let head_diff = if inverse {
                (ls.min(rs) - head) / head
            } else {
                (head - ls.max(rs)) / ls.max(rs)
            };
            if head_diff < cfg.head_min_diff {
                continue;
            }

            // Neckline connects the retracements on either side of the head.
            let (left_neck, right_neck) = if inverse {
                (
                    max_of(&highs[ls_idx..head_idx]),
                    max_of(&highs[head_idx..rs_idx]),
                )
            } else {
                (
                    min_of(&lows[ls_idx..head_idx]),
                    min_of(&lows[head_idx..rs_idx]),
                )
            };
            let neckline_slope = (right_neck - left_neck) / left_neck;
            if neckline_slope.abs() > cfg.neckline_tolerance {
                continue;
            }

            let neckline = (left_neck + right_neck) / 2.0;
            let height = (head - neckline).abs();

            let mut score: f64 = 60.0;
            if shoulder_diff < 0.02 {
                score += 15.0;
            }
            if head_diff > 0.05 {
                score += 10.0;
            }
            if neckline_slope.abs() < 0.02 {
                score += 10.0;
            }
            if rs_idx >= n - 10 {
                score += 5.0;
            }

            result.detected = true;
            result.score = score.min(100.0);
            result.bias = if inverse {
                PatternBias::Bullish
            } else {
                PatternBias::Bearish
            };
            result.start_idx = ls_idx;
            result.end_idx = rs_idx;
            result.breakout_price = Some(neckline);
            result.projected_target = Some(if inverse {
                neckline + height
            } else {
                neckline - height
            });
            result.stop_price = Some(if inverse { head * 0.98 } else { head * 1.02 });
            result.key_points = vec![
                ("left_shoulder".to_string(), ls),
                ("head".to_string(), head),
                ("right_shoulder".to_string(), rs),
                ("neckline".to_string(), neckline),
            ];
            return result;
        }

        result
    }
}

fn min_of(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::MAX, f64::min)
}

fn max_of(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::MIN, f64::max)
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

    /// Shoulders at ~105, head at 115, neckline near 95.
    fn top_path() -> Vec<f64> {
        let mut path = vec![90.0];
        leg(&mut path, 105.0, 8); // left shoulder
        leg(&mut path, 95.0, 8);
        leg(&mut path, 115.0, 9); // head
        leg(&mut path, 95.5, 9);
        leg(&mut path, 104.5, 8); // right shoulder
        leg(&mut path, 93.0, 8);
        path
    }

    #[test]
    fn detects_bearish_top_formation() {
        let detection = HeadAndShoulders::default().detect(&series_from_path(&top_path()));
        assert!(detection.detected);
        assert_eq!(detection.kind, PatternKind::HeadAndShoulders);
        assert_eq!(detection.bias, PatternBias::Bearish);
        let neckline = detection.breakout_price.unwrap();
        assert!((neckline - 95.25).abs() < 0.5, "neckline {neckline}");
        // Target projects the head height below the neckline.
        assert!(detection.projected_target.unwrap() < neckline);
    }

    #[test]
    fn detects_inverse_formation() {
        let path: Vec<f64> = top_path().into_iter().map(|p| 200.0 - p).collect();
        let detection = HeadAndShoulders::default().detect(&series_from_path(&path));
        assert!(detection.detected);
        assert_eq!(detection.kind, PatternKind::InverseHeadAndShoulders);
        assert_eq!(detection.bias, PatternBias::Bullish);
        assert!(detection.projected_target.unwrap() > detection.breakout_price.unwrap());
    }

    #[test]
    fn lopsided_shoulders_are_rejected() {
        let mut path = vec![90.0];
        leg(&mut path, 100.0, 8); // left shoulder well below
        leg(&mut path, 95.0, 8);
        leg(&mut path, 115.0, 9);
        leg(&mut path, 95.0, 9);
        leg(&mut path, 110.0, 8); // right shoulder 10% higher
        leg(&mut path, 93.0, 8);
        let detection = HeadAndShoulders::default().detect(&series_from_path(&path));
        assert!(!detection.detected);
    }

    #[test]
    fn short_series_is_quiet() {
        let detection = HeadAndShoulders::default().detect(&series_from_path(&[100.0; 20]));
        assert!(!detection.detected);
    }
}
