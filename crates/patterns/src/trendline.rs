//! Automatic trend line detection.
//!
//! Fits lines through pairs of confirmed swing points, counts touches,
//! tolerates a bounded number of breaches, and scores by touches, span,
//! recency and fit quality.

use serde::{Deserialize, Serialize};
use stocklens_core::BarSeries;

use crate::swings::{swing_points, SwingConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrendDirection {
    Up,
    Down,
    #[default]
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendlineKind {
    /// Connects lows.
    Support,
    /// Connects highs.
    Resistance,
}

/// A fitted trend line `price = slope * index + intercept`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trendline {
    pub kind: TrendlineKind,
    pub direction: TrendDirection,
    pub slope: f64,
    pub intercept: f64,
    pub start_idx: usize,
    pub end_idx: usize,
    pub touches: usize,
    pub touch_indices: Vec<usize>,
    pub breaches: usize,
    /// Coefficient of determination of the touch points against the line.
    pub r_squared: f64,
    /// Line value at the last bar.
    pub current_price: f64,
    pub broken: bool,
    /// Score in [0, 100].
    pub strength: f64,
}

impl Trendline {
    #[must_use]
    pub fn price_at(&self, idx: usize) -> f64 {
        self.slope * idx as f64 + self.intercept
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendlineConfig {
    pub window: usize,
    pub min_touches: usize,
    /// Relative deviation counting as a touch.
    pub max_deviation: f64,
    /// Breaches beyond this many disqualify the line.
    pub max_breaches: usize,
    pub lookback: usize,
    /// |slope| below this reads as flat, in price units per bar.
    pub min_slope: f64,
    pub max_trendlines: usize,
}

impl Default for TrendlineConfig {
    fn default() -> Self {
        Self {
            window: 5,
            min_touches: 2,
            max_deviation: 0.02,
            max_breaches: 1,
            lookback: 60,
            min_slope: 0.0001,
            max_trendlines: 4,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrendlineResult {
    pub trendlines: Vec<Trendline>,
    pub primary_support: Option<Trendline>,
    pub primary_resistance: Option<Trendline>,
    pub overall_trend: TrendDirection,
}

#[derive(Debug, Clone, Default)]
pub struct TrendlineDetector {
    config: TrendlineConfig,
}

impl TrendlineDetector {
    #[must_use]
    pub fn new(config: TrendlineConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn detect(&self, series: &BarSeries) -> TrendlineResult {
        let cfg = &self.config;
        if series.len() < cfg.lookback.min(2 * cfg.window + 1) {
            return TrendlineResult::default();
        }

        let window = series.tail(cfg.lookback);
        let highs = window.highs();
        let lows = window.lows();
        let last_close = window.last().expect("non-empty").close;

        let swing_cfg = SwingConfig {
            window: cfg.window,
            min_spacing: 0,
        };
        let swing_highs = swing_points(&highs, true, &swing_cfg);
        let swing_lows = swing_points(&lows, false, &swing_cfg);

        let mut lines = self.fit_lines(&swing_highs, &highs, TrendlineKind::Resistance);
        lines.extend(self.fit_lines(&swing_lows, &lows, TrendlineKind::Support));

        let last_idx = window.len() - 1;
        for line in &mut lines {
            line.current_price = line.price_at(last_idx);
            line.broken = match line.kind {
                TrendlineKind::Resistance => last_close > line.current_price * 1.01,
                TrendlineKind::Support => last_close < line.current_price * 0.99,
            };
        }

        lines.sort_by(|a, b| b.strength.total_cmp(&a.strength));

        let primary_support = lines
            .iter()
            .find(|l| l.kind == TrendlineKind::Support && !l.broken)
            .cloned();
        let primary_resistance = lines
            .iter()
            .find(|l| l.kind == TrendlineKind::Resistance && !l.broken)
            .cloned();

        let overall_trend = if lines.is_empty() {
            TrendDirection::Flat
        } else {
            let avg_slope: f64 =
                lines.iter().map(|l| l.slope).sum::<f64>() / lines.len() as f64;
            slope_direction(avg_slope, cfg.min_slope)
        };

        lines.truncate(cfg.max_trendlines);

        TrendlineResult {
            trendlines: lines,
            primary_support,
            primary_resistance,
            overall_trend,
        }
    }

    fn fit_lines(&self, points: &[usize], prices: &[f64], kind: TrendlineKind) -> Vec<Trendline> {
        let cfg = &self.config;
        let mut lines: Vec<Trendline> = Vec::new();
        if points.len() < 2 {
            return lines;
        }

        for i in 0..points.len() {
            for j in i + 1..points.len() {
                let (i1, i2) = (points[i], points[j]);
                if i2 - i1 < 5 {
                    continue;
                }
                let (p1, p2) = (prices[i1], prices[i2]);
                let slope = (p2 - p1) / (i2 - i1) as f64;
                let intercept = p1 - slope * i1 as f64;

                let mut touches = Vec::new();
                let mut breaches = 0usize;
                let mut valid = true;
                for (k, &price) in prices.iter().enumerate() {
                    let line_price = slope * k as f64 + intercept;
                    if line_price == 0.0 {
                        continue;
                    }
                    let deviation = (price - line_price) / line_price;
                    if deviation.abs() < cfg.max_deviation {
                        touches.push(k);
                    }
                    let breached = match kind {
                        TrendlineKind::Support => deviation < -cfg.max_deviation * 2.0,
                        TrendlineKind::Resistance => deviation > cfg.max_deviation * 2.0,
                    };
                    if breached {
                        breaches += 1;
                        if breaches > cfg.max_breaches {
                            valid = false;
                            break;
                        }
                    }
                }

                if !valid || touches.len() < cfg.min_touches {
                    continue;
                }

                let r_squared = fit_quality(&touches, prices, slope, intercept);
                let strength = score(&touches, breaches, r_squared, prices.len());

                let candidate = Trendline {
                    kind,
                    direction: slope_direction(slope, cfg.min_slope),
                    slope,
                    intercept,
                    start_idx: i1,
                    end_idx: i2,
                    touches: touches.len(),
                    touch_indices: touches,
                    breaches,
                    r_squared,
                    current_price: 0.0,
                    broken: false,
                    strength,
                };

                upsert_deduped(&mut lines, candidate);
            }
        }

        lines
    }
}

fn slope_direction(slope: f64, min_slope: f64) -> TrendDirection {
    if slope > min_slope {
        TrendDirection::Up
    } else if slope < -min_slope {
        TrendDirection::Down
    } else {
        TrendDirection::Flat
    }
}

/// R² of the touched prices against the fitted line.
fn fit_quality(touches: &[usize], prices: &[f64], slope: f64, intercept: f64) -> f64 {
    if touches.len() < 2 {
        return 0.0;
    }
    let ys: Vec<f64> = touches.iter().map(|&i| prices[i]).collect();
    let mean_y = ys.iter().sum::<f64>() / ys.len() as f64;
    let ss_tot: f64 = ys.iter().map(|y| (y - mean_y).powi(2)).sum();
    let ss_res: f64 = touches
        .iter()
        .map(|&i| {
            let fitted = slope * i as f64 + intercept;
            (prices[i] - fitted).powi(2)
        })
        .sum();
    if ss_tot == 0.0 {
        // Perfectly flat touch set that the line reproduces exactly.
        return if ss_res < f64::EPSILON { 1.0 } else { 0.0 };
    }
    (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
}

fn score(touches: &[usize], breaches: usize, r_squared: f64, data_len: usize) -> f64 {
    let mut strength = 20.0;

    strength += (touches.len().saturating_sub(1).min(7) as f64) * 5.0;

    if let Some(&last) = touches.iter().max() {
        let recency = (data_len - last) as f64 / data_len as f64;
        strength += if recency < 0.1 {
            20.0
        } else if recency < 0.2 {
            15.0
        } else if recency < 0.3 {
            10.0
        } else if recency < 0.5 {
            5.0
        } else {
            0.0
        };
    }

    if touches.len() >= 2 {
        let span = (touches.iter().max().unwrap() - touches.iter().min().unwrap()) as f64;
        let span_ratio = span / data_len as f64;
        strength += if span_ratio > 0.7 {
            15.0
        } else if span_ratio > 0.5 {
            10.0
        } else if span_ratio > 0.3 {
            5.0
        } else {
            0.0
        };
    }

    strength += r_squared * 10.0;
    strength -= breaches as f64 * 5.0;

    strength.clamp(0.0, 100.0)
}

/// Drops near-identical lines, keeping the stronger fit.
fn upsert_deduped(lines: &mut Vec<Trendline>, candidate: Trendline) {
    for existing in lines.iter_mut() {
        if (candidate.slope - existing.slope).abs() < 0.001
            && (candidate.intercept - existing.intercept).abs() < 1.0
        {
            if candidate.strength > existing.strength {
                *existing = candidate;
            }
            return;
        }
    }
    lines.push(candidate);
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

    /// Rising channel: higher lows on a clean line with oscillation above.
    fn rising_channel() -> Vec<f64> {
        (0..60)
            .map(|i| {
                let base = 100.0 + f64::from(i) * 0.5;
                let wave = ((f64::from(i) / 8.0) * std::f64::consts::PI).sin().abs() * 4.0;
                base + wave
            })
            .collect()
    }

    #[test]
    fn uptrend_produces_rising_support_line() {
        let result = TrendlineDetector::default().detect(&series_from_path(&rising_channel()));
        assert_eq!(result.overall_trend, TrendDirection::Up);
        let support = result.primary_support.expect("support line");
        assert!(support.slope > 0.0);
        assert!(support.touches >= 2);
    }

    #[test]
    fn downtrend_produces_falling_resistance_line() {
        let path: Vec<f64> = rising_channel().into_iter().map(|p| 250.0 - p).collect();
        let result = TrendlineDetector::default().detect(&series_from_path(&path));
        assert_eq!(result.overall_trend, TrendDirection::Down);
        let resistance = result.primary_resistance.expect("resistance line");
        assert!(resistance.slope < 0.0);
    }

    #[test]
    fn lines_carry_fit_quality() {
        let result = TrendlineDetector::default().detect(&series_from_path(&rising_channel()));
        for line in &result.trendlines {
            assert!((0.0..=1.0).contains(&line.r_squared));
            assert!(line.breaches <= TrendlineConfig::default().max_breaches);
        }
    }

    #[test]
    fn flat_short_series_detects_nothing() {
        let result = TrendlineDetector::default().detect(&series_from_path(&[1.0; 8]));
        assert!(result.trendlines.is_empty());
        assert_eq!(result.overall_trend, TrendDirection::Flat);
    }

    #[test]
    fn line_count_is_bounded() {
        let cfg = TrendlineConfig {
            max_trendlines: 2,
            ..TrendlineConfig::default()
        };
        let result = TrendlineDetector::new(cfg).detect(&series_from_path(&rising_channel()));
        assert!(result.trendlines.len() <= 2);
    }
}
