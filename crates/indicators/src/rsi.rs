//! Relative Strength Index with Wilder smoothing, plus Stochastic RSI.

use stocklens_core::CoreError;

use crate::series::Series;

/// RSI over closes. `RSI = 100 - 100 / (1 + RS)` with
/// `RS = avg_gain / avg_loss`, both sides smoothed with factor `1/period`.
#[derive(Debug, Clone, Copy)]
pub struct Rsi {
    period: usize,
}

impl Rsi {
    /// # Errors
    /// `InvalidInput` for a zero period.
    pub fn new(period: usize) -> Result<Self, CoreError> {
        if period == 0 {
            return Err(CoreError::InvalidInput("period must be at least 1".to_string()));
        }
        Ok(Self { period })
    }

    #[must_use]
    pub fn compute(&self, closes: &[f64]) -> Series {
        let p = self.period;
        let n = closes.len();
        let mut out = vec![None; n];
        if n <= p {
            return Series::new(out);
        }

        let mut gains = vec![0.0; n];
        let mut losses = vec![0.0; n];
        for i in 1..n {
            let delta = closes[i] - closes[i - 1];
            if delta > 0.0 {
                gains[i] = delta;
            } else {
                losses[i] = -delta;
            }
        }

        // Seed with the plain average of the first `p` moves, then Wilder
        // recursion: avg = (prev * (p - 1) + current) / p.
        let mut avg_gain: f64 = gains[1..=p].iter().sum::<f64>() / p as f64;
        let mut avg_loss: f64 = losses[1..=p].iter().sum::<f64>() / p as f64;
        out[p] = Some(rsi_value(avg_gain, avg_loss));

        for i in p + 1..n {
            avg_gain = (avg_gain * (p as f64 - 1.0) + gains[i]) / p as f64;
            avg_loss = (avg_loss * (p as f64 - 1.0) + losses[i]) / p as f64;
            out[i] = Some(rsi_value(avg_gain, avg_loss));
        }

        Series::new(out)
    }
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        // A flat series has neither gains nor losses and reads neutral.
        if avg_gain == 0.0 {
            return 50.0;
        }
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// Stochastic RSI output: the raw oscillator plus %K/%D smoothings, all in
/// [0, 100].
#[derive(Debug, Clone)]
pub struct StochRsiOutput {
    pub stoch_rsi: Series,
    pub k: Series,
    pub d: Series,
}

/// Stochastic oscillator applied to RSI values.
#[derive(Debug, Clone, Copy)]
pub struct StochRsi {
    rsi_period: usize,
    stoch_period: usize,
    k_period: usize,
    d_period: usize,
}

impl StochRsi {
    /// # Errors
    /// `InvalidInput` for any zero period.
    pub fn new(
        rsi_period: usize,
        stoch_period: usize,
        k_period: usize,
        d_period: usize,
    ) -> Result<Self, CoreError> {
        for p in [rsi_period, stoch_period, k_period, d_period] {
            if p == 0 {
                return Err(CoreError::InvalidInput(
                    "period must be at least 1".to_string(),
                ));
            }
        }
        Ok(Self {
            rsi_period,
            stoch_period,
            k_period,
            d_period,
        })
    }

    #[must_use]
    pub fn default_params() -> Self {
        Self {
            rsi_period: 14,
            stoch_period: 14,
            k_period: 3,
            d_period: 3,
        }
    }

    #[must_use]
    pub fn compute(&self, closes: &[f64]) -> StochRsiOutput {
        let n = closes.len();
        let rsi = Rsi { period: self.rsi_period }.compute(closes);

        let mut stoch = vec![None; n];
        for i in 0..n {
            let (Some(lo), Some(hi)) = (
                rsi.window_min(i, self.stoch_period),
                rsi.window_max(i, self.stoch_period),
            ) else {
                continue;
            };
            if hi > lo {
                stoch[i] = rsi.get(i).map(|v| (v - lo) / (hi - lo) * 100.0);
            }
            // A degenerate window (hi == lo) stays absent.
        }
        let stoch_rsi = Series::new(stoch);

        let k = smooth(&stoch_rsi, self.k_period);
        let d = smooth(&k, self.d_period);
        StochRsiOutput { stoch_rsi, k, d }
    }
}

/// Rolling mean over defined values only.
fn smooth(input: &Series, period: usize) -> Series {
    let n = input.len();
    let mut out = vec![None; n];
    for i in 0..n {
        if i + 1 < period {
            continue;
        }
        let mut sum = 0.0;
        let mut complete = true;
        for j in i + 1 - period..=i {
            match input.get(j) {
                Some(v) => sum += v,
                None => {
                    complete = false;
                    break;
                }
            }
        }
        if complete {
            out[i] = Some(sum / period as f64);
        }
    }
    Series::new(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_series_reads_neutral() {
        let closes = vec![42.0; 30];
        let rsi = Rsi::new(14).unwrap().compute(&closes);
        assert_eq!(rsi.first_defined(), Some(14));
        assert!((rsi.last().unwrap() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn monotonic_rise_saturates_at_100() {
        let closes: Vec<f64> = (1..=30).map(f64::from).collect();
        let rsi = Rsi::new(14).unwrap().compute(&closes);
        assert!((rsi.last().unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn monotonic_fall_reads_zero() {
        let closes: Vec<f64> = (1..=30).rev().map(f64::from).collect();
        let rsi = Rsi::new(14).unwrap().compute(&closes);
        assert!(rsi.last().unwrap() < 1e-9);
    }

    #[test]
    fn warm_up_region_is_absent() {
        let closes: Vec<f64> = (1..=20).map(f64::from).collect();
        let rsi = Rsi::new(14).unwrap().compute(&closes);
        for i in 0..14 {
            assert_eq!(rsi.get(i), None, "index {i} should be warm-up");
        }
        assert!(rsi.get(14).is_some());
    }

    #[test]
    fn rsi_stays_within_bounds() {
        let closes: Vec<f64> = (0..60)
            .map(|i| 100.0 + 10.0 * f64::from(i % 7) - 3.0 * f64::from(i % 3))
            .collect();
        let rsi = Rsi::new(14).unwrap().compute(&closes);
        for v in rsi.iter().flatten() {
            assert!((0.0..=100.0).contains(&v));
        }
    }

    #[test]
    fn stoch_rsi_bounded_and_gapped() {
        let closes: Vec<f64> = (0..80)
            .map(|i| 50.0 + (f64::from(i) * 0.7).sin() * 5.0 + f64::from(i % 5))
            .collect();
        let out = StochRsi::default_params().compute(&closes);
        assert_eq!(out.stoch_rsi.len(), closes.len());
        for v in out.k.iter().flatten() {
            assert!((0.0..=100.0).contains(&v));
        }
        // %D warms up after %K.
        let k_start = out.k.first_defined().unwrap();
        let d_start = out.d.first_defined().unwrap();
        assert!(d_start >= k_start);
    }

    #[test]
    fn insufficient_data_is_all_absent() {
        let rsi = Rsi::new(14).unwrap().compute(&[1.0, 2.0, 3.0]);
        assert_eq!(rsi.first_defined(), None);
    }
}
