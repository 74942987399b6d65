//! Cup-and-handle detection.
//!
//! A bullish continuation: a rounded base between two rims of similar
//! height, followed by a shallow handle pullback near the right rim.

use serde::{Deserialize, Serialize};
use stocklens_core::BarSeries;

use crate::scanner::{PatternBias, PatternDetection, PatternKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CupHandleConfig {
    /// Cup depth bounds as fractions of the left rim.
    pub min_cup_depth: f64,
    pub max_cup_depth: f64,
    pub min_cup_length: usize,
    pub max_cup_length: usize,
    /// The handle must stay under this fraction of the cup depth.
    pub handle_depth_ratio: f64,
    pub min_handle_length: usize,
    pub max_handle_length: usize,
    /// Relative rim mismatch tolerated.
    pub rim_tolerance: f64,
}

impl Default for CupHandleConfig {
    fn default() -> Self {
        Self {
            min_cup_depth: 0.12,
            max_cup_depth: 0.35,
            min_cup_length: 20,
            max_cup_length: 60,
            handle_depth_ratio: 0.5,
            min_handle_length: 5,
            max_handle_length: 20,
            rim_tolerance: 0.05,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CupAndHandle {
    config: CupHandleConfig,
}

impl CupAndHandle {
    #[must_use]
    pub fn new(config: CupHandleConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn detect(&self, series: &BarSeries) -> PatternDetection {
        let cfg = &self.config;
        let mut result = PatternDetection::not_detected(PatternKind::CupAndHandle);
        let n = series.len();
        if n < cfg.min_cup_length + cfg.min_handle_length {
            return result;
        }

        let highs = series.highs();
        let lows = series.lows();

        // Scan left rims newest-first so the most recent completed pattern
        // wins.
        let latest_rim = n.saturating_sub(cfg.min_cup_length + cfg.min_handle_length);
        for left_rim_idx in (0..latest_rim).rev() {
            let left_rim = highs[left_rim_idx];
            if left_rim <= 0.0 {
                continue;
            }

            let longest_cup = cfg.max_cup_length.min(n - left_rim_idx - cfg.min_handle_length);
            for cup_length in cfg.min_cup_length..longest_cup {
                let cup_end_idx = left_rim_idx + cup_length;

                let cup_lows = &lows[left_rim_idx..=cup_end_idx];
                let (bottom_offset, cup_bottom) = argmin(cup_lows);
                let cup_depth = (left_rim - cup_bottom) / left_rim;
                if cup_depth < cfg.min_cup_depth || cup_depth > cfg.max_cup_depth {
                    continue;
                }

                // A rounded base keeps its bottom in the middle third.
                let third = cup_length / 3;
                if bottom_offset < third || bottom_offset > cup_length - third {
                    continue;
                }

                let right_rim = highs[cup_end_idx];
                let rim_diff = (right_rim - left_rim).abs() / left_rim;
                if rim_diff > cfg.rim_tolerance {
                    continue;
                }

                for handle_length in cfg.min_handle_length
                    ..=cfg.max_handle_length.min(n - cup_end_idx - 1)
                {
                    let handle_end_idx = cup_end_idx + handle_length;
                    let handle_low = lows[cup_end_idx..=handle_end_idx]
                        .iter()
                        .copied()
                        .fold(f64::MAX, f64::min);
                    let handle_depth = (right_rim - handle_low) / right_rim;
                    if handle_depth > cup_depth * cfg.handle_depth_ratio {
                        continue;
                    }

                    let mut score: f64 = 60.0;
                    if rim_diff < 0.02 {
                        score += 10.0;
                    }
                    if (0.15..=0.30).contains(&cup_depth) {
                        score += 10.0;
                    }
                    if handle_depth < cup_depth * 0.3 {
                        score += 10.0;
                    }
                    if handle_end_idx >= n - 5 {
                        score += 10.0;
                    }

                    let breakout = left_rim.max(right_rim);
                    result.detected = true;
                    result.score = score.min(100.0);
                    result.bias = PatternBias::Bullish;
                    result.start_idx = left_rim_idx;
                    result.end_idx = handle_end_idx;
                    result.breakout_price = Some(breakout);
                    result.projected_target = Some(breakout + (breakout - cup_bottom));
                    result.stop_price = Some(handle_low * 0.98);
                    result.key_points = vec![
                        ("left_rim".to_string(), left_rim),
                        ("cup_bottom".to_string(), cup_bottom),
                        ("right_rim".to_string(), right_rim),
                        ("handle_low".to_string(), handle_low),
                    ];
                    return result;
                }
            }
        }

        result
    }
}

fn argmin(values: &[f64]) -> (usize, f64) {
    let mut best = (0, f64::MAX);
    for (i, &v) in values.iter().enumerate() {
        if v < best.1 {
            best = (i, v);
        }
    }
    best
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

    /// Rim 100, rounded 20% cup over 30 bars, 6% handle.
    fn cup_path() -> Vec<f64> {
        let mut path = vec![100.0];
        for i in 1..=15 {
            path.push(100.0 - 20.0 * f64::from(i) / 15.0); // down to 80
        }
        for i in 1..=15 {
            path.push(80.0 + 20.0 * f64::from(i) / 15.0); // back to 100
        }
        for i in 1..=4 {
            path.push(100.0 - 6.0 * f64::from(i) / 4.0); // handle to 94
        }
        for i in 1..=4 {
            path.push(94.0 + 4.0 * f64::from(i) / 4.0); // drift to 98
        }
        path
    }

    #[test]
    fn detects_rounded_cup_with_shallow_handle() {
        let detection = CupAndHandle::default().detect(&series_from_path(&cup_path()));
        assert!(detection.detected);
        assert_eq!(detection.bias, PatternBias::Bullish);
        let breakout = detection.breakout_price.unwrap();
        assert!(breakout > 95.0 && breakout <= 100.0, "breakout {breakout}");
        // Measured move: rim plus cup depth above the 80 bottom.
        let target = detection.projected_target.unwrap();
        assert!((target - (2.0 * breakout - 80.0)).abs() < 1e-9);
        assert!(detection.score >= 60.0);
    }

    #[test]
    fn v_bottom_is_rejected() {
        // Sharp V: bottom at the first third boundary.
        let mut path = vec![100.0];
        for i in 1..=5 {
            path.push(100.0 - 20.0 * f64::from(i) / 5.0);
        }
        for i in 1..=25 {
            path.push(80.0 + 20.0 * f64::from(i) / 25.0);
        }
        for _ in 0..8 {
            path.push(97.0);
        }
        let detection = CupAndHandle::default().detect(&series_from_path(&path));
        assert!(!detection.detected);
    }

    #[test]
    fn steady_decline_has_no_cup() {
        let path: Vec<f64> = (0..50).map(|i| 100.0 - f64::from(i)).collect();
        let detection = CupAndHandle::default().detect(&series_from_path(&path));
        assert!(!detection.detected);
    }

    #[test]
    fn short_series_is_quiet() {
        let detection = CupAndHandle::default().detect(&series_from_path(&[100.0; 10]));
        assert!(!detection.detected);
    }
}
