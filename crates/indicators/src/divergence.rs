//! Price/indicator divergence detection.
//!
//! One local-extremum pass serves the RSI, MACD-histogram and OBV
//! detectors: successive price pivots are compared against the indicator
//! value at the same bars, and a marker fires when they disagree in
//! direction by more than the configured magnitude.

use crate::series::Series;

#[derive(Debug, Clone, Copy)]
pub struct DivergenceConfig {
    /// Half-window for the pivot test: a bar is a pivot low/high when it is
    /// the extreme of `window` bars on each side.
    pub window: usize,
    /// Only pivots within this many trailing bars are considered.
    pub lookback: usize,
    /// Minimum relative price move between successive pivots, as a
    /// fraction (0.01 = 1%).
    pub min_price_move: f64,
}

impl Default for DivergenceConfig {
    fn default() -> Self {
        Self {
            window: 3,
            lookback: 60,
            min_price_move: 0.01,
        }
    }
}

/// Marker series aligned to bars: `+1` bullish divergence (price lower low,
/// indicator higher low), `-1` bearish (price higher high, indicator lower
/// high), `0` otherwise. Markers land on the later pivot.
#[must_use]
pub fn detect_divergence(prices: &[f64], indicator: &Series, config: &DivergenceConfig) -> Vec<i8> {
    let n = prices.len().min(indicator.len());
    let mut out = vec![0i8; n];
    if n == 0 || config.window == 0 {
        return out;
    }

    let start = n.saturating_sub(config.lookback);
    let lows = pivots(prices, config.window, start, false);
    let highs = pivots(prices, config.window, start, true);

    for pair in lows.windows(2) {
        let (i1, i2) = (pair[0], pair[1]);
        let (p1, p2) = (prices[i1], prices[i2]);
        let (Some(v1), Some(v2)) = (indicator.get(i1), indicator.get(i2)) else {
            continue;
        };
        if p2 < p1 * (1.0 - config.min_price_move) && v2 > v1 {
            out[i2] = 1;
        }
    }

    for pair in highs.windows(2) {
        let (i1, i2) = (pair[0], pair[1]);
        let (p1, p2) = (prices[i1], prices[i2]);
        let (Some(v1), Some(v2)) = (indicator.get(i1), indicator.get(i2)) else {
            continue;
        };
        if p2 > p1 * (1.0 + config.min_price_move) && v2 < v1 {
            out[i2] = -1;
        }
    }

    out
}

fn pivots(prices: &[f64], window: usize, start: usize, is_high: bool) -> Vec<usize> {
    let n = prices.len();
    let mut found = Vec::new();
    if n < 2 * window + 1 {
        return found;
    }
    for i in start.max(window)..n - window {
        let slice = &prices[i - window..=i + window];
        let extreme = if is_high {
            slice.iter().copied().fold(f64::MIN, f64::max)
        } else {
            slice.iter().copied().fold(f64::MAX, f64::min)
        };
        if prices[i] == extreme {
            found.push(i);
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v_shape(center: f64, depth: f64, width: usize) -> Vec<f64> {
        // Symmetric V centered on `center - depth`.
        let mut out = Vec::new();
        for i in 0..width {
            out.push(center - depth * f64::from(i as u32) / f64::from(width as u32 - 1));
        }
        for i in 1..width {
            out.push(center - depth + depth * f64::from(i as u32) / f64::from(width as u32 - 1));
        }
        out
    }

    #[test]
    fn bullish_divergence_on_lower_low_with_stronger_indicator() {
        // Two price troughs, the second deeper; indicator troughs rising.
        let mut prices = v_shape(100.0, 10.0, 8);
        prices.extend(v_shape(100.0, 16.0, 8));
        let indicator = Series::from(
            prices
                .iter()
                .enumerate()
                .map(|(i, _)| 40.0 + f64::from(i as u32))
                .collect::<Vec<f64>>(),
        );
        let markers = detect_divergence(&prices, &indicator, &DivergenceConfig::default());
        assert!(markers.contains(&1));
        assert!(!markers.contains(&-1));
    }

    #[test]
    fn bearish_divergence_on_higher_high_with_weaker_indicator() {
        let mut prices: Vec<f64> = v_shape(100.0, 10.0, 8).iter().map(|p| 200.0 - p).collect();
        let second: Vec<f64> = v_shape(100.0, 16.0, 8).iter().map(|p| 216.0 - p).collect();
        prices.extend(second);
        let indicator = Series::from(
            prices
                .iter()
                .enumerate()
                .map(|(i, _)| 80.0 - f64::from(i as u32))
                .collect::<Vec<f64>>(),
        );
        let markers = detect_divergence(&prices, &indicator, &DivergenceConfig::default());
        assert!(markers.contains(&-1));
        assert!(!markers.contains(&1));
    }

    #[test]
    fn agreeing_extremes_produce_no_marker() {
        // Price and indicator both making lower lows.
        let mut prices = v_shape(100.0, 10.0, 8);
        prices.extend(v_shape(100.0, 16.0, 8));
        let indicator = Series::from(prices.clone());
        let markers = detect_divergence(&prices, &indicator, &DivergenceConfig::default());
        assert!(markers.iter().all(|&m| m == 0));
    }

    #[test]
    fn short_input_is_quiet() {
        let prices = [1.0, 2.0];
        let indicator = Series::from(vec![1.0, 2.0]);
        let markers = detect_divergence(&prices, &indicator, &DivergenceConfig::default());
        assert_eq!(markers, vec![0, 0]);
    }
}
