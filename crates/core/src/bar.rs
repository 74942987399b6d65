//! Daily OHLCV bars and the ordered series the analytics engine consumes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A single daily observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub amount: Option<f64>,
    pub turnover_rate: Option<f64>,
    pub change_pct: Option<f64>,
}

impl Bar {
    #[must_use]
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
            amount: None,
            turnover_rate: None,
            change_pct: None,
        }
    }

    /// Checks the OHLCV invariants.
    ///
    /// # Errors
    /// Returns `Internal` on breach; a bar violating these aborts the run
    /// rather than being silently persisted.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.low > self.high {
            return Err(CoreError::Internal(format!(
                "bar {}: low {} above high {}",
                self.date, self.low, self.high
            )));
        }
        if self.low > self.open.min(self.close) {
            return Err(CoreError::Internal(format!(
                "bar {}: low {} above open/close",
                self.date, self.low
            )));
        }
        if self.high < self.open.max(self.close) {
            return Err(CoreError::Internal(format!(
                "bar {}: high {} below open/close",
                self.date, self.high
            )));
        }
        if self.volume < 0.0 {
            return Err(CoreError::Internal(format!(
                "bar {}: negative volume {}",
                self.date, self.volume
            )));
        }
        Ok(())
    }

    /// True when the bar closed above its open.
    #[must_use]
    pub fn is_up(&self) -> bool {
        self.close > self.open
    }
}

/// An ordered daily bar series, guaranteed strictly ascending by date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BarSeries {
    bars: Vec<Bar>,
}

impl BarSeries {
    /// Wraps a bar vector, rejecting unsorted or duplicate dates.
    ///
    /// # Errors
    /// Returns `InvalidInput` when dates are not strictly ascending.
    pub fn new(bars: Vec<Bar>) -> Result<Self, CoreError> {
        for pair in bars.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(CoreError::InvalidInput(format!(
                    "bars not sorted ascending by date at {}",
                    pair[1].date
                )));
            }
        }
        Ok(Self { bars })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    #[must_use]
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    #[must_use]
    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    #[must_use]
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    #[must_use]
    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    #[must_use]
    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    #[must_use]
    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }

    /// The trailing `n` bars as a new series.
    #[must_use]
    pub fn tail(&self, n: usize) -> Self {
        let start = self.bars.len().saturating_sub(n);
        Self {
            bars: self.bars[start..].to_vec(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bar> {
        self.bars.iter()
    }
}
