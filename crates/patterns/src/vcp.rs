//! Volatility contraction pattern detection.
//!
//! A VCP is a run of pullbacks that narrow over time while volume dries
//! up, finishing with price parked just under a pivot (breakout) level.

use serde::{Deserialize, Serialize};
use stocklens_core::BarSeries;

use crate::swings::{swing_points, SwingConfig};

/// One (high, low) pullback inside the sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contraction {
    pub start_idx: usize,
    pub end_idx: usize,
    pub high_price: f64,
    pub low_price: f64,
    /// Depth in percent: `(high - low) / high * 100`.
    pub depth_pct: f64,
    pub duration: usize,
    pub avg_volume: f64,
}

/// Where the pattern currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VcpStage {
    /// No contraction structure at all.
    None,
    /// Too few contractions to qualify yet.
    Forming,
    /// Valid pattern, price still under the pivot.
    Mature,
    /// Price at or above the pivot.
    Breakout,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VcpConfig {
    pub min_contractions: usize,
    pub max_contractions: usize,
    /// Pullbacks shallower than this are noise, in percent.
    pub min_depth_pct: f64,
    /// The first contraction must not be deeper than this, in percent.
    pub max_first_depth_pct: f64,
    /// Each depth must be at most this fraction of its predecessor.
    pub depth_decrease_ratio: f64,
    /// The final contraction should be tighter than this, in percent.
    pub max_final_depth_pct: f64,
    pub swing_window: usize,
    pub min_swing_spacing: usize,
    /// Bars of history considered when anchoring the pattern.
    pub lookback: usize,
    /// Minimum bars required before detection is attempted.
    pub min_bars: usize,
    /// Volume-vs-sequence correlation below this counts as full dry-up.
    pub volume_dry_up_threshold: f64,
    /// Maximum |distance| from close to pivot, in percent.
    pub pivot_distance_threshold: f64,
    pub weight_count: f64,
    pub weight_depth: f64,
    pub weight_volume: f64,
    pub weight_pivot: f64,
}

impl Default for VcpConfig {
    fn default() -> Self {
        Self {
            min_contractions: 2,
            max_contractions: 5,
            min_depth_pct: 3.0,
            max_first_depth_pct: 35.0,
            depth_decrease_ratio: 0.7,
            max_final_depth_pct: 10.0,
            swing_window: 5,
            min_swing_spacing: 3,
            lookback: 120,
            min_bars: 50,
            volume_dry_up_threshold: -0.2,
            pivot_distance_threshold: 5.0,
            weight_count: 30.0,
            weight_depth: 30.0,
            weight_volume: 25.0,
            weight_pivot: 15.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VcpResult {
    pub is_vcp: bool,
    /// Quality score in [0, 100].
    pub score: f64,
    pub contractions: Vec<Contraction>,
    pub depth_sequence: Vec<f64>,
    /// Correlation of contraction volumes against sequence position;
    /// negative means volume is drying up.
    pub volume_trend: f64,
    pub pivot_price: Option<f64>,
    /// Percent from the last close up to the pivot (negative when above).
    pub pivot_distance_pct: f64,
    pub stage: VcpStage,
    pub signals: Vec<String>,
}

impl VcpResult {
    fn empty(signal: impl Into<String>) -> Self {
        Self {
            is_vcp: false,
            score: 0.0,
            contractions: Vec::new(),
            depth_sequence: Vec::new(),
            volume_trend: 0.0,
            pivot_price: None,
            pivot_distance_pct: 0.0,
            stage: VcpStage::None,
            signals: vec![signal.into()],
        }
    }

    #[must_use]
    pub fn contraction_count(&self) -> usize {
        self.contractions.len()
    }
}

/// Volatility contraction pattern detector.
#[derive(Debug, Clone, Default)]
pub struct Vcp {
    config: VcpConfig,
}

impl Vcp {
    #[must_use]
    pub fn new(config: VcpConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn detect(&self, series: &BarSeries) -> VcpResult {
        let cfg = &self.config;
        if series.len() < cfg.min_bars {
            return VcpResult::empty("insufficient data for contraction analysis");
        }

        let highs = series.highs();
        let lows = series.lows();
        let closes = series.closes();
        let volumes = series.volumes();

        let swing_cfg = SwingConfig {
            window: cfg.swing_window,
            min_spacing: cfg.min_swing_spacing,
        };
        let swing_highs = swing_points(&highs, true, &swing_cfg);
        let swing_lows = swing_points(&lows, false, &swing_cfg);

        if swing_highs.len() < 2 || swing_lows.is_empty() {
            return VcpResult::empty("not enough swing points");
        }

        let contractions = self.build_contractions(&highs, &lows, &volumes, &swing_highs, &swing_lows);
        if contractions.is_empty() {
            return VcpResult::empty("no qualifying contractions");
        }

        let depth_sequence: Vec<f64> = contractions.iter().map(|c| c.depth_pct).collect();
        let volume_trend = volume_correlation(&contractions);

        // The pivot is the most recent contraction's high.
        let pivot_price = contractions.last().map(|c| c.high_price);
        let last_close = *closes.last().expect("series is non-empty");
        let pivot_distance_pct = pivot_price
            .map(|p| (p - last_close) / last_close * 100.0)
            .unwrap_or(0.0);

        let mut result = VcpResult {
            is_vcp: false,
            score: 0.0,
            contractions,
            depth_sequence,
            volume_trend,
            pivot_price,
            pivot_distance_pct,
            stage: VcpStage::Forming,
            signals: Vec::new(),
        };

        result.is_vcp = self.validate(&result);
        result.score = self.score(&result);
        result.stage = self.stage(&result, last_close);
        self.annotate(&mut result);
        result
    }

    /// Walks swing lows after the anchoring high, pairing each with the
    /// prevailing swing high. A contraction deeper than its predecessor
    /// restarts the sequence from that point.
    fn build_contractions(
        &self,
        highs: &[f64],
        lows: &[f64],
        volumes: &[f64],
        swing_highs: &[usize],
        swing_lows: &[usize],
    ) -> Vec<Contraction> {
        let cfg = &self.config;
        let lookback_start = highs.len().saturating_sub(cfg.lookback);
        let relevant: Vec<usize> = swing_highs
            .iter()
            .copied()
            .filter(|&i| i >= lookback_start)
            .collect();
        let Some(&base_idx) = relevant
            .iter()
            .max_by(|&&a, &&b| highs[a].total_cmp(&highs[b]))
        else {
            return Vec::new();
        };

        let mut contractions: Vec<Contraction> = Vec::new();
        let mut current_high_idx = base_idx;
        let mut current_high = highs[base_idx];

        for &low_idx in swing_lows {
            if low_idx <= current_high_idx {
                continue;
            }
            let low = lows[low_idx];
            let depth_pct = (current_high - low) / current_high * 100.0;
            if depth_pct >= cfg.min_depth_pct {
                let avg_volume = mean(&volumes[current_high_idx..=low_idx]);
                let next = Contraction {
                    start_idx: current_high_idx,
                    end_idx: low_idx,
                    high_price: current_high,
                    low_price: low,
                    depth_pct,
                    duration: low_idx - current_high_idx,
                    avg_volume,
                };
                if let Some(prev) = contractions.last() {
                    // A widening pullback breaks the narrowing run.
                    if depth_pct > prev.depth_pct {
                        contractions.clear();
                    }
                }
                contractions.push(next);

                // Move to the first later swing high that clears this low.
                for &h in swing_highs.iter().filter(|&&h| h > low_idx) {
                    if highs[h] > low {
                        current_high_idx = h;
                        current_high = highs[h];
                        break;
                    }
                }

                if contractions.len() >= cfg.max_contractions {
                    break;
                }
            }
        }

        contractions
    }

    fn validate(&self, result: &VcpResult) -> bool {
        let cfg = &self.config;
        let depths = &result.depth_sequence;
        if depths.len() < cfg.min_contractions {
            return false;
        }
        if depths[0] > cfg.max_first_depth_pct {
            return false;
        }
        for pair in depths.windows(2) {
            if pair[1] > pair[0] * cfg.depth_decrease_ratio {
                return false;
            }
        }
        if *depths.last().expect("non-empty") >= cfg.max_final_depth_pct {
            return false;
        }
        // Volume must dry up contraction over contraction.
        for pair in result.contractions.windows(2) {
            if pair[1].avg_volume >= pair[0].avg_volume {
                return false;
            }
        }
        result.pivot_distance_pct.abs() <= cfg.pivot_distance_threshold
    }

    fn score(&self, result: &VcpResult) -> f64 {
        let cfg = &self.config;
        let depths = &result.depth_sequence;
        if depths.len() < cfg.min_contractions {
            return 0.0;
        }

        let count_score =
            (depths.len().min(4) as f64 / 4.0) * cfg.weight_count;

        let depth_score = if depths.len() >= 2 {
            let steps = depths.len() - 1;
            let satisfied = depths
                .windows(2)
                .filter(|pair| pair[1] <= pair[0] * cfg.depth_decrease_ratio)
                .count();
            let tight_final = depths.last().copied().unwrap_or(f64::MAX) < cfg.max_final_depth_pct;
            (satisfied as f64 / steps as f64)
                * cfg.weight_depth
                * if tight_final { 1.0 } else { 0.7 }
        } else {
            0.0
        };

        let trend = result.volume_trend;
        let volume_score = if trend <= cfg.volume_dry_up_threshold {
            cfg.weight_volume
        } else if trend < 0.0 {
            trend.abs() * cfg.weight_volume
        } else {
            (cfg.weight_volume - trend * 10.0).max(0.0)
        };

        let distance = result.pivot_distance_pct.abs();
        let pivot_score = if distance <= cfg.pivot_distance_threshold {
            (1.0 - distance / cfg.pivot_distance_threshold) * cfg.weight_pivot
        } else {
            0.0
        };

        (count_score + depth_score + volume_score + pivot_score).clamp(0.0, 100.0)
    }

    fn stage(&self, result: &VcpResult, last_close: f64) -> VcpStage {
        if result.contractions.is_empty() {
            return VcpStage::None;
        }
        if result.contractions.len() < self.config.min_contractions {
            return VcpStage::Forming;
        }
        if let Some(pivot) = result.pivot_price {
            if last_close >= pivot {
                return VcpStage::Breakout;
            }
        }
        if result.is_vcp {
            return VcpStage::Mature;
        }
        VcpStage::Forming
    }

    fn annotate(&self, result: &mut VcpResult) {
        if result.is_vcp {
            result
                .signals
                .push(format!("{} contractions narrowing", result.contraction_count()));
            if result.score >= 80.0 {
                result.signals.push("strong setup".to_string());
            }
            if result.volume_trend < -0.3 {
                result.signals.push("volume drying up".to_string());
            }
            if let Some(pivot) = result.pivot_price {
                if result.pivot_distance_pct.abs() < 3.0 {
                    result.signals.push(format!("near pivot {pivot:.2}"));
                }
            }
        } else {
            if result.contraction_count() < self.config.min_contractions {
                result.signals.push(format!(
                    "only {} contractions (need {})",
                    result.contraction_count(),
                    self.config.min_contractions
                ));
            }
            if result.volume_trend > 0.3 {
                result.signals.push("volume increasing".to_string());
            }
            if result.pivot_distance_pct > self.config.pivot_distance_threshold {
                result.signals.push(format!(
                    "price {:.1}% below pivot",
                    result.pivot_distance_pct
                ));
            }
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Pearson correlation of contraction volumes against sequence position.
fn volume_correlation(contractions: &[Contraction]) -> f64 {
    let n = contractions.len();
    if n < 2 {
        return 0.0;
    }
    let xs: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let ys: Vec<f64> = contractions.iter().map(|c| c.avg_volume).collect();
    let mx = mean(&xs);
    let my = mean(&ys);
    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for i in 0..n {
        cov += (xs[i] - mx) * (ys[i] - my);
        vx += (xs[i] - mx).powi(2);
        vy += (ys[i] - my).powi(2);
    }
    if vx == 0.0 || vy == 0.0 {
        return 0.0;
    }
    cov / (vx.sqrt() * vy.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use stocklens_core::Bar;

    /// Flat bars along a piecewise-linear price path with linearly
    /// decaying volume.
    fn series_from_path(path: &[f64], start_volume: f64, end_volume: f64) -> BarSeries {
        let n = path.len();
        let bars: Vec<Bar> = path
            .iter()
            .enumerate()
            .map(|(i, &p)| {
                let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                    + chrono::Duration::days(i as i64);
                let volume =
                    start_volume + (end_volume - start_volume) * i as f64 / (n - 1) as f64;
                Bar::new(date, p, p, p, p, volume)
            })
            .collect();
        BarSeries::new(bars).unwrap()
    }

    fn linspace(from: f64, to: f64, points: usize) -> Vec<f64> {
        (0..points)
            .map(|i| from + (to - from) * i as f64 / (points - 1) as f64)
            .collect()
    }

    fn extend_path(path: &mut Vec<f64>, to: f64, points: usize) {
        let from = *path.last().unwrap();
        path.extend(linspace(from, to, points + 1).into_iter().skip(1));
    }

    /// Three contractions of 20%, 12% and 5% with drying volume, last
    /// close 1.6% under the final high.
    fn vcp_path() -> Vec<f64> {
        let mut path = linspace(60.0, 100.0, 25);
        extend_path(&mut path, 80.0, 8); // -20%
        extend_path(&mut path, 97.0, 8);
        extend_path(&mut path, 85.36, 6); // -12%
        extend_path(&mut path, 95.0, 6);
        extend_path(&mut path, 90.25, 5); // -5%
        extend_path(&mut path, 93.5, 6);
        path
    }

    #[test]
    fn detects_textbook_contraction_sequence() {
        let series = series_from_path(&vcp_path(), 1000.0, 300.0);
        let result = Vcp::default().detect(&series);

        assert!(result.is_vcp, "signals: {:?}", result.signals);
        assert_eq!(result.contraction_count(), 3);
        assert_eq!(result.stage, VcpStage::Mature);
        assert!(result.score >= 70.0, "score was {}", result.score);
        assert!((result.depth_sequence[0] - 20.0).abs() < 0.5);
        assert!((result.depth_sequence[1] - 12.0).abs() < 0.5);
        assert!((result.depth_sequence[2] - 5.0).abs() < 0.5);
        assert!((result.pivot_price.unwrap() - 95.0).abs() < 1e-9);
        assert!(result.volume_trend < -0.9);
    }

    #[test]
    fn depth_sequence_is_non_increasing_when_detected() {
        let series = series_from_path(&vcp_path(), 1000.0, 300.0);
        let result = Vcp::default().detect(&series);
        assert_eq!(result.depth_sequence.len(), result.contraction_count());
        for pair in result.depth_sequence.windows(2) {
            assert!(pair[1] <= pair[0]);
        }
    }

    #[test]
    fn close_at_pivot_reads_breakout() {
        let mut path = vcp_path();
        extend_path(&mut path, 96.5, 3); // pop through the 95 pivot
        let series = series_from_path(&path, 1000.0, 300.0);
        let result = Vcp::default().detect(&series);
        assert_eq!(result.stage, VcpStage::Breakout);
    }

    #[test]
    fn widening_pullback_resets_the_sequence() {
        // 8% pullback, then a wider 16% one: only the trailing run counts.
        let mut path = linspace(60.0, 100.0, 25);
        extend_path(&mut path, 92.0, 8); // -8%
        extend_path(&mut path, 99.0, 8);
        extend_path(&mut path, 83.16, 8); // -16%, wider
        extend_path(&mut path, 94.0, 8);
        extend_path(&mut path, 89.3, 6); // -5%
        extend_path(&mut path, 93.0, 6);
        let series = series_from_path(&path, 1000.0, 400.0);
        let result = Vcp::default().detect(&series);
        assert!(result.depth_sequence.first().copied().unwrap_or(0.0) > 10.0);
        for pair in result.depth_sequence.windows(2) {
            assert!(pair[1] <= pair[0]);
        }
    }

    #[test]
    fn trend_without_pullbacks_is_not_a_vcp() {
        let path = linspace(50.0, 150.0, 80);
        let series = series_from_path(&path, 1000.0, 900.0);
        let result = Vcp::default().detect(&series);
        assert!(!result.is_vcp);
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn short_history_yields_empty_result() {
        let path = linspace(50.0, 60.0, 20);
        let series = series_from_path(&path, 100.0, 100.0);
        let result = Vcp::default().detect(&series);
        assert!(!result.is_vcp);
        assert_eq!(result.stage, VcpStage::None);
        assert_eq!(result.score, 0.0);
    }
}
