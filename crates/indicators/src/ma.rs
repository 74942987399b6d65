//! Moving averages: simple, exponential, weighted.

use stocklens_core::CoreError;

use crate::series::Series;

fn validate_period(period: usize) -> Result<(), CoreError> {
    if period == 0 {
        return Err(CoreError::InvalidInput("period must be at least 1".to_string()));
    }
    Ok(())
}

/// Simple moving average over a trailing window.
#[derive(Debug, Clone, Copy)]
pub struct Sma {
    period: usize,
}

impl Sma {
    /// # Errors
    /// `InvalidInput` for a zero period.
    pub fn new(period: usize) -> Result<Self, CoreError> {
        validate_period(period)?;
        Ok(Self { period })
    }

    #[must_use]
    pub fn compute(&self, values: &[f64]) -> Series {
        sma_with_offset(values, self.period, 0, values.len())
    }
}

/// Exponential moving average, seeded with the SMA of the first `period`
/// values, then `ema[i] = alpha * x[i] + (1 - alpha) * ema[i-1]` with
/// `alpha = 2 / (period + 1)`.
#[derive(Debug, Clone, Copy)]
pub struct Ema {
    period: usize,
}

impl Ema {
    /// # Errors
    /// `InvalidInput` for a zero period.
    pub fn new(period: usize) -> Result<Self, CoreError> {
        validate_period(period)?;
        Ok(Self { period })
    }

    #[must_use]
    pub fn compute(&self, values: &[f64]) -> Series {
        ema_with_offset(values, self.period, 0, values.len())
    }

    /// EMA over an already-gapped series (used for MACD signal lines).
    /// The leading absent region is preserved and warm-up extends past it.
    #[must_use]
    pub fn compute_series(&self, input: &Series) -> Series {
        let Some(start) = input.first_defined() else {
            return Series::absent(input.len());
        };
        let defined: Vec<f64> = input.values()[start..]
            .iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect();
        ema_with_offset(&defined, self.period, start, input.len())
    }
}

/// Weighted moving average with linearly increasing weights, most recent
/// value heaviest.
#[derive(Debug, Clone, Copy)]
pub struct Wma {
    period: usize,
}

impl Wma {
    /// # Errors
    /// `InvalidInput` for a zero period.
    pub fn new(period: usize) -> Result<Self, CoreError> {
        validate_period(period)?;
        Ok(Self { period })
    }

    #[must_use]
    pub fn compute(&self, values: &[f64]) -> Series {
        let p = self.period;
        let weight_sum = (p * (p + 1)) as f64 / 2.0;
        let mut out = vec![None; values.len()];
        for i in (p - 1)..values.len() {
            let mut acc = 0.0;
            for (k, value) in values[i + 1 - p..=i].iter().enumerate() {
                acc += value * (k + 1) as f64;
            }
            out[i] = Some(acc / weight_sum);
        }
        Series::new(out)
    }
}

/// The standard MA panel persisted alongside bars.
#[derive(Debug, Clone, Default)]
pub struct MovingAverages {
    pub ma5: Series,
    pub ma10: Series,
    pub ma20: Series,
    pub ma60: Series,
}

impl MovingAverages {
    #[must_use]
    pub fn compute(closes: &[f64]) -> Self {
        let sma = |p: usize| sma_with_offset(closes, p, 0, closes.len());
        Self {
            ma5: sma(5),
            ma10: sma(10),
            ma20: sma(20),
            ma60: sma(60),
        }
    }
}

pub(crate) fn sma_with_offset(
    values: &[f64],
    period: usize,
    offset: usize,
    total_len: usize,
) -> Series {
    let mut out = vec![None; total_len];
    if period == 0 || values.len() < period {
        return Series::new(out);
    }
    let mut window_sum: f64 = values[..period].iter().sum();
    out[offset + period - 1] = Some(window_sum / period as f64);
    for i in period..values.len() {
        window_sum += values[i] - values[i - period];
        out[offset + i] = Some(window_sum / period as f64);
    }
    Series::new(out)
}

pub(crate) fn ema_with_offset(
    values: &[f64],
    period: usize,
    offset: usize,
    total_len: usize,
) -> Series {
    let mut out = vec![None; total_len];
    if period == 0 || values.len() < period {
        return Series::new(out);
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut ema: f64 = values[..period].iter().sum::<f64>() / period as f64;
    out[offset + period - 1] = Some(ema);
    for i in period..values.len() {
        ema = alpha * values[i] + (1.0 - alpha) * ema;
        out[offset + i] = Some(ema);
    }
    Series::new(out)
}
