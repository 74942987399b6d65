//! Support and resistance level identification.
//!
//! Clusters swing extremes by price proximity; a level's strength grows
//! with touch count and recency of the last touch.

use serde::{Deserialize, Serialize};
use stocklens_core::BarSeries;

use crate::swings::{swing_points, SwingConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelKind {
    Support,
    Resistance,
}

/// A clustered price level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: f64,
    pub kind: LevelKind,
    pub touches: usize,
    pub first_touch_idx: usize,
    pub last_touch_idx: usize,
    pub avg_volume: f64,
    /// Strength in [0, 100]: touches weighted by recency.
    pub strength: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportResistanceConfig {
    /// Swing-point half window.
    pub window: usize,
    /// Relative price tolerance for grouping extremes into one level.
    pub tolerance: f64,
    /// Minimum touches for a level to qualify.
    pub min_touches: usize,
    /// Trailing bars analysed.
    pub lookback: usize,
    /// Levels returned per side.
    pub top_k: usize,
}

impl Default for SupportResistanceConfig {
    fn default() -> Self {
        Self {
            window: 5,
            tolerance: 0.02,
            min_touches: 2,
            lookback: 120,
            top_k: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupportResistanceResult {
    /// Qualifying levels, strongest first.
    pub levels: Vec<PriceLevel>,
    /// Nearest qualifying support below the last close.
    pub nearest_support: Option<f64>,
    /// Nearest qualifying resistance above the last close.
    pub nearest_resistance: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct SupportResistance {
    config: SupportResistanceConfig,
}

impl SupportResistance {
    #[must_use]
    pub fn new(config: SupportResistanceConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn detect(&self, series: &BarSeries) -> SupportResistanceResult {
        let cfg = &self.config;
        if series.is_empty() {
            return SupportResistanceResult::default();
        }

        let window = series.tail(cfg.lookback);
        let highs = window.highs();
        let lows = window.lows();
        let volumes = window.volumes();
        let last_close = window.last().expect("non-empty").close;

        let swing_cfg = SwingConfig {
            window: cfg.window,
            min_spacing: 0,
        };
        let high_points = swing_points(&highs, true, &swing_cfg);
        let low_points = swing_points(&lows, false, &swing_cfg);

        let mut levels = self.cluster(&high_points, &highs, &volumes, LevelKind::Resistance);
        levels.extend(self.cluster(&low_points, &lows, &volumes, LevelKind::Support));

        levels.retain(|l| l.touches >= cfg.min_touches);
        for level in &mut levels {
            level.strength = strength(level, window.len());
        }
        levels.sort_by(|a, b| b.strength.total_cmp(&a.strength));

        let nearest_support = levels
            .iter()
            .filter(|l| l.kind == LevelKind::Support && l.price < last_close)
            .map(|l| l.price)
            .fold(None, |acc: Option<f64>, p| {
                Some(acc.map_or(p, |a| a.max(p)))
            });
        let nearest_resistance = levels
            .iter()
            .filter(|l| l.kind == LevelKind::Resistance && l.price > last_close)
            .map(|l| l.price)
            .fold(None, |acc: Option<f64>, p| {
                Some(acc.map_or(p, |a| a.min(p)))
            });

        let per_side = cfg.top_k;
        let mut kept: Vec<PriceLevel> = Vec::new();
        let mut supports = 0;
        let mut resistances = 0;
        for level in levels {
            match level.kind {
                LevelKind::Support if supports < per_side => {
                    supports += 1;
                    kept.push(level);
                }
                LevelKind::Resistance if resistances < per_side => {
                    resistances += 1;
                    kept.push(level);
                }
                _ => {}
            }
        }

        SupportResistanceResult {
            levels: kept,
            nearest_support,
            nearest_resistance,
        }
    }

    fn cluster(
        &self,
        points: &[usize],
        prices: &[f64],
        volumes: &[f64],
        kind: LevelKind,
    ) -> Vec<PriceLevel> {
        let tolerance = self.config.tolerance;
        let mut used = vec![false; points.len()];
        let mut levels = Vec::new();

        for (i, &idx) in points.iter().enumerate() {
            if used[i] {
                continue;
            }
            used[i] = true;
            let anchor = prices[idx];
            let mut member_idxs = vec![idx];
            let mut member_prices = vec![anchor];
            let mut member_volumes = vec![volumes[idx]];

            for (j, &other) in points.iter().enumerate() {
                if used[j] {
                    continue;
                }
                let price = prices[other];
                if (price - anchor).abs() / anchor < tolerance {
                    used[j] = true;
                    member_idxs.push(other);
                    member_prices.push(price);
                    member_volumes.push(volumes[other]);
                }
            }

            levels.push(PriceLevel {
                price: mean(&member_prices),
                kind,
                touches: member_idxs.len(),
                first_touch_idx: *member_idxs.iter().min().expect("non-empty"),
                last_touch_idx: *member_idxs.iter().max().expect("non-empty"),
                avg_volume: mean(&member_volumes),
                strength: 0.0,
            });
        }

        levels
    }
}

/// Touches weighted by how recently the level was last tested.
fn strength(level: &PriceLevel, data_len: usize) -> f64 {
    let base = 40.0 + (level.touches.saturating_sub(1).min(6) as f64) * 5.0;
    let recency = (data_len - level.last_touch_idx) as f64 / data_len as f64;
    let recency_bonus = if recency < 0.1 {
        15.0
    } else if recency < 0.2 {
        10.0
    } else if recency < 0.3 {
        5.0
    } else {
        0.0
    };
    let touch_bonus = if level.touches >= 4 {
        10.0
    } else if level.touches >= 3 {
        5.0
    } else {
        0.0
    };
    (base + recency_bonus + touch_bonus).min(100.0)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
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

    /// Oscillates between a floor near 90 and a ceiling near 110, ending
    /// mid-range.
    fn ranging_path() -> Vec<f64> {
        let mut path = Vec::new();
        for cycle in 0..4 {
            let jitter = f64::from(cycle) * 0.4;
            for i in 0..8 {
                path.push(110.0 - jitter - f64::from(i) * 2.5); // down to ~90
            }
            for i in 0..8 {
                path.push(90.0 + jitter + f64::from(i) * 2.5); // back to ~110
            }
        }
        path.push(100.0);
        path
    }

    #[test]
    fn finds_floor_and_ceiling_of_a_range() {
        let result = SupportResistance::default().detect(&series_from_path(&ranging_path()));
        let support = result.nearest_support.expect("support below close");
        let resistance = result.nearest_resistance.expect("resistance above close");
        assert!(support < 100.0 && support > 85.0, "support {support}");
        assert!(resistance > 100.0 && resistance < 115.0, "resistance {resistance}");
    }

    #[test]
    fn levels_require_minimum_touches() {
        let cfg = SupportResistanceConfig {
            min_touches: 3,
            ..SupportResistanceConfig::default()
        };
        let result = SupportResistance::new(cfg).detect(&series_from_path(&ranging_path()));
        for level in &result.levels {
            assert!(level.touches >= 3);
        }
    }

    #[test]
    fn repeated_touches_outrank_single_touches() {
        let result = SupportResistance::default().detect(&series_from_path(&ranging_path()));
        assert!(!result.levels.is_empty());
        for pair in result.levels.windows(2) {
            assert!(pair[0].strength >= pair[1].strength);
        }
    }

    #[test]
    fn empty_series_yields_no_levels() {
        let result = SupportResistance::default().detect(&series_from_path(&[]));
        assert!(result.levels.is_empty());
        assert!(result.nearest_support.is_none());
    }
}
