//! Bollinger Bands and the low-volatility squeeze flag.

use stocklens_core::CoreError;

use crate::ma::sma_with_offset;
use crate::series::Series;

/// Band output. `bandwidth = (upper - lower) / middle`; `percent_b` is the
/// price position within the bands, absent when the bands collapse.
#[derive(Debug, Clone)]
pub struct BollingerOutput {
    pub upper: Series,
    pub middle: Series,
    pub lower: Series,
    pub bandwidth: Series,
    pub percent_b: Series,
}

impl BollingerOutput {
    /// Squeeze flags: true where the bands are tighter than `threshold`
    /// (a bandwidth ratio, default 0.05), false elsewhere including warm-up.
    #[must_use]
    pub fn squeeze(&self, threshold: f64) -> Vec<bool> {
        self.bandwidth
            .iter()
            .map(|b| b.is_some_and(|w| w < threshold))
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BollingerBands {
    period: usize,
    std_dev: f64,
}

impl BollingerBands {
    /// # Errors
    /// `InvalidInput` for a zero period or non-positive deviation multiple.
    pub fn new(period: usize, std_dev: f64) -> Result<Self, CoreError> {
        if period == 0 {
            return Err(CoreError::InvalidInput("period must be at least 1".to_string()));
        }
        if std_dev <= 0.0 {
            return Err(CoreError::InvalidInput(format!(
                "std_dev must be positive, got {std_dev}"
            )));
        }
        Ok(Self { period, std_dev })
    }

    #[must_use]
    pub fn default_params() -> Self {
        Self {
            period: 20,
            std_dev: 2.0,
        }
    }

    #[must_use]
    pub fn compute(&self, closes: &[f64]) -> BollingerOutput {
        let n = closes.len();
        let p = self.period;
        let middle = sma_with_offset(closes, p, 0, n);

        let mut upper = vec![None; n];
        let mut lower = vec![None; n];
        let mut bandwidth = vec![None; n];
        let mut percent_b = vec![None; n];

        for i in 0..n {
            let Some(mid) = middle.get(i) else { continue };
            let window = &closes[i + 1 - p..=i];
            let std = sample_std(window, mid);
            let up = mid + self.std_dev * std;
            let lo = mid - self.std_dev * std;
            upper[i] = Some(up);
            lower[i] = Some(lo);
            if mid != 0.0 {
                bandwidth[i] = Some((up - lo) / mid);
            }
            if up > lo {
                percent_b[i] = Some((closes[i] - lo) / (up - lo));
            }
        }

        BollingerOutput {
            upper: Series::new(upper),
            middle,
            lower: Series::new(lower),
            bandwidth: Series::new(bandwidth),
            percent_b: Series::new(percent_b),
        }
    }
}

/// Sample standard deviation (n - 1 denominator) around a precomputed mean.
fn sample_std(window: &[f64], mean: f64) -> f64 {
    if window.len() < 2 {
        return 0.0;
    }
    let var = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (window.len() - 1) as f64;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_bracket_the_middle() {
        let closes: Vec<f64> = (0..60)
            .map(|i| 100.0 + (f64::from(i) * 0.5).sin() * 4.0)
            .collect();
        let out = BollingerBands::default_params().compute(&closes);
        for i in 0..closes.len() {
            if let (Some(u), Some(m), Some(l)) =
                (out.upper.get(i), out.middle.get(i), out.lower.get(i))
            {
                assert!(u >= m && m >= l, "index {i}");
            }
        }
        assert_eq!(out.middle.first_defined(), Some(19));
    }

    #[test]
    fn constant_series_collapses_bands() {
        let closes = vec![50.0; 40];
        let out = BollingerBands::default_params().compute(&closes);
        let i = 30;
        assert!((out.upper.get(i).unwrap() - 50.0).abs() < 1e-9);
        assert!((out.lower.get(i).unwrap() - 50.0).abs() < 1e-9);
        // Collapsed bands leave %B undefined rather than dividing by zero.
        assert_eq!(out.percent_b.get(i), None);
        assert!(out.squeeze(0.05)[i]);
    }

    #[test]
    fn squeeze_detects_tightening() {
        // Wide swings then a flat tail.
        let mut closes: Vec<f64> = (0..40)
            .map(|i| 100.0 + if i % 2 == 0 { 10.0 } else { -10.0 })
            .collect();
        closes.extend(std::iter::repeat(100.0).take(40));
        let out = BollingerBands::default_params().compute(&closes);
        let squeeze = out.squeeze(0.05);
        assert!(!squeeze[39], "volatile region must not read as a squeeze");
        assert!(squeeze[79], "flat tail should squeeze");
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(BollingerBands::new(0, 2.0).is_err());
        assert!(BollingerBands::new(20, 0.0).is_err());
        assert!(BollingerBands::new(20, -1.0).is_err());
    }
}
