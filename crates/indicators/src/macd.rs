//! MACD: fast/slow EMA spread, signal line, histogram, crossover marker.

use stocklens_core::CoreError;

use crate::ma::Ema;
use crate::series::Series;

/// MACD output. `hist = macd - signal` wherever both are defined; the
/// crossover marker is `+1` when the MACD line crosses above the signal,
/// `-1` when it crosses below, `0` otherwise.
#[derive(Debug, Clone)]
pub struct MacdOutput {
    pub macd: Series,
    pub signal: Series,
    pub hist: Series,
    pub crossover: Vec<i8>,
}

#[derive(Debug, Clone, Copy)]
pub struct Macd {
    fast: Ema,
    slow: Ema,
    signal: Ema,
}

impl Macd {
    /// # Errors
    /// `InvalidInput` for zero periods or `fast >= slow`.
    pub fn new(fast: usize, slow: usize, signal: usize) -> Result<Self, CoreError> {
        if fast >= slow {
            return Err(CoreError::InvalidInput(format!(
                "fast period {fast} must be less than slow period {slow}"
            )));
        }
        Ok(Self {
            fast: Ema::new(fast)?,
            slow: Ema::new(slow)?,
            signal: Ema::new(signal)?,
        })
    }

    #[must_use]
    pub fn default_params() -> Self {
        Self::new(12, 26, 9).expect("default MACD parameters are valid")
    }

    #[must_use]
    pub fn compute(&self, closes: &[f64]) -> MacdOutput {
        let n = closes.len();
        let fast = self.fast.compute(closes);
        let slow = self.slow.compute(closes);

        let macd = Series::new(
            (0..n)
                .map(|i| match (fast.get(i), slow.get(i)) {
                    (Some(f), Some(s)) => Some(f - s),
                    _ => None,
                })
                .collect(),
        );
        let signal = self.signal.compute_series(&macd);
        let hist = Series::new(
            (0..n)
                .map(|i| match (macd.get(i), signal.get(i)) {
                    (Some(m), Some(s)) => Some(m - s),
                    _ => None,
                })
                .collect(),
        );

        let mut crossover = vec![0i8; n];
        for i in 1..n {
            let (Some(curr), Some(prev)) = (hist.get(i), hist.get(i - 1)) else {
                continue;
            };
            if curr > 0.0 && prev <= 0.0 {
                crossover[i] = 1;
            } else if curr < 0.0 && prev >= 0.0 {
                crossover[i] = -1;
            }
        }

        MacdOutput {
            macd,
            signal,
            hist,
            crossover,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hist_is_macd_minus_signal_everywhere() {
        let closes: Vec<f64> = (0..120)
            .map(|i| 100.0 + (f64::from(i) * 0.3).sin() * 8.0 + f64::from(i) * 0.1)
            .collect();
        let out = Macd::default_params().compute(&closes);
        for i in 0..closes.len() {
            if let (Some(m), Some(s), Some(h)) =
                (out.macd.get(i), out.signal.get(i), out.hist.get(i))
            {
                assert!((h - (m - s)).abs() < 1e-9, "index {i}");
            }
        }
    }

    #[test]
    fn constant_series_has_zero_hist() {
        let closes = vec![55.0; 120];
        let out = Macd::default_params().compute(&closes);
        assert!(out.hist.last().unwrap().abs() < 1e-9);
        assert!(out.macd.last().unwrap().abs() < 1e-9);
    }

    #[test]
    fn signal_warms_up_after_macd() {
        let closes: Vec<f64> = (0..60).map(f64::from).collect();
        let out = Macd::default_params().compute(&closes);
        // MACD defined from the slow warm-up, signal 8 bars later.
        assert_eq!(out.macd.first_defined(), Some(25));
        assert_eq!(out.signal.first_defined(), Some(33));
    }

    #[test]
    fn crossover_fires_on_direction_change() {
        // Downtrend then sharp uptrend forces a bullish crossover.
        let mut closes: Vec<f64> = (0..60).map(|i| 200.0 - f64::from(i)).collect();
        closes.extend((0..60).map(|i| 140.0 + 3.0 * f64::from(i)));
        let out = Macd::default_params().compute(&closes);
        assert!(out.crossover.contains(&1));
        let up_at = out.crossover.iter().position(|&c| c == 1).unwrap();
        assert!(up_at > 60, "cross should happen after the trend flip");
    }

    #[test]
    fn fast_must_be_below_slow() {
        assert!(Macd::new(26, 12, 9).is_err());
        assert!(Macd::new(12, 12, 9).is_err());
    }
}
