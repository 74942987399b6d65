//! Index-aligned value series with explicit warm-up gaps.

use serde::{Deserialize, Serialize};

/// A value series aligned to bar indices. `None` marks warm-up positions
/// or degenerate windows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    values: Vec<Option<f64>>,
}

impl Series {
    #[must_use]
    pub fn new(values: Vec<Option<f64>>) -> Self {
        Self { values }
    }

    /// An all-absent series of the given length.
    #[must_use]
    pub fn absent(len: usize) -> Self {
        Self {
            values: vec![None; len],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied().flatten()
    }

    #[must_use]
    pub fn last(&self) -> Option<f64> {
        self.values.last().copied().flatten()
    }

    /// Index of the first defined value, i.e. the warm-up length.
    #[must_use]
    pub fn first_defined(&self) -> Option<usize> {
        self.values.iter().position(Option::is_some)
    }

    #[must_use]
    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    /// Minimum over the trailing window ending at `end` (inclusive);
    /// `None` if any value in the window is absent.
    #[must_use]
    pub fn window_min(&self, end: usize, window: usize) -> Option<f64> {
        self.window_fold(end, window, f64::min)
    }

    /// Maximum over the trailing window ending at `end` (inclusive).
    #[must_use]
    pub fn window_max(&self, end: usize, window: usize) -> Option<f64> {
        self.window_fold(end, window, f64::max)
    }

    fn window_fold(&self, end: usize, window: usize, f: fn(f64, f64) -> f64) -> Option<f64> {
        if window == 0 || end + 1 < window || end >= self.values.len() {
            return None;
        }
        let mut acc: Option<f64> = None;
        for i in end + 1 - window..=end {
            let v = self.values[i]?;
            acc = Some(match acc {
                Some(a) => f(a, v),
                None => v,
            });
        }
        acc
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<f64>> + '_ {
        self.values.iter().copied()
    }
}

impl From<Vec<f64>> for Series {
    fn from(values: Vec<f64>) -> Self {
        Self {
            values: values.into_iter().map(Some).collect(),
        }
    }
}
