//! On-Balance Volume.

use stocklens_core::CoreError;

use crate::ma::Ema;
use crate::series::Series;

/// OBV output with an optional EMA signal line.
#[derive(Debug, Clone)]
pub struct ObvOutput {
    pub obv: Series,
    pub signal: Option<Series>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Obv {
    signal_period: Option<usize>,
}

impl Obv {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// `InvalidInput` for a zero signal period.
    pub fn with_signal(signal_period: usize) -> Result<Self, CoreError> {
        if signal_period == 0 {
            return Err(CoreError::InvalidInput(
                "signal period must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            signal_period: Some(signal_period),
        })
    }

    /// Cumulative signed volume, seeded at zero: volume is added on
    /// up-closes, subtracted on down-closes, carried on flat closes.
    #[must_use]
    pub fn compute(&self, closes: &[f64], volumes: &[f64]) -> ObvOutput {
        let n = closes.len().min(volumes.len());
        let mut values = Vec::with_capacity(n);
        let mut obv = 0.0;
        for i in 0..n {
            if i > 0 {
                if closes[i] > closes[i - 1] {
                    obv += volumes[i];
                } else if closes[i] < closes[i - 1] {
                    obv -= volumes[i];
                }
            }
            values.push(Some(obv));
        }
        let obv_series = Series::new(values);

        let signal = self.signal_period.map(|p| {
            Ema::new(p)
                .expect("signal period validated at construction")
                .compute_series(&obv_series)
        });

        ObvOutput {
            obv: obv_series,
            signal,
        }
    }
}

/// Convenience wrapper returning just the OBV series.
#[must_use]
pub fn obv(closes: &[f64], volumes: &[f64]) -> Series {
    Obv::new().compute(closes, volumes).obv
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directional_accumulation() {
        // Closes [10, 11, 11, 10, 12], volumes [100, 200, 150, 300, 400]
        // -> OBV [0, 200, 200, -100, 300].
        let closes = [10.0, 11.0, 11.0, 10.0, 12.0];
        let volumes = [100.0, 200.0, 150.0, 300.0, 400.0];
        let series = obv(&closes, &volumes);
        let expected = [0.0, 200.0, 200.0, -100.0, 300.0];
        for (i, want) in expected.iter().enumerate() {
            assert!((series.get(i).unwrap() - want).abs() < 1e-9, "index {i}");
        }
    }

    #[test]
    fn step_is_signed_volume_or_zero() {
        let closes = [5.0, 6.0, 6.0, 4.0, 4.5, 4.5];
        let volumes = [10.0, 20.0, 30.0, 40.0, 50.0, 60.0];
        let series = obv(&closes, &volumes);
        for i in 1..closes.len() {
            let step = series.get(i).unwrap() - series.get(i - 1).unwrap();
            let expected = match closes[i].partial_cmp(&closes[i - 1]).unwrap() {
                std::cmp::Ordering::Greater => volumes[i],
                std::cmp::Ordering::Less => -volumes[i],
                std::cmp::Ordering::Equal => 0.0,
            };
            assert!((step - expected).abs() < 1e-9, "index {i}");
        }
    }

    #[test]
    fn signal_line_warms_up() {
        let closes: Vec<f64> = (0..30).map(|i| f64::from(i % 4) + 10.0).collect();
        let volumes = vec![100.0; 30];
        let out = Obv::with_signal(5).unwrap().compute(&closes, &volumes);
        let signal = out.signal.unwrap();
        assert_eq!(signal.first_defined(), Some(4));
        assert_eq!(out.obv.first_defined(), Some(0));
    }

    #[test]
    fn empty_input_is_empty() {
        let series = obv(&[], &[]);
        assert!(series.is_empty());
    }
}
