//! Swing high/low extraction shared by every pattern detector.

/// Local-extremum test parameters.
#[derive(Debug, Clone, Copy)]
pub struct SwingConfig {
    /// A bar is a swing point when it is the extreme of `window` bars on
    /// each side.
    pub window: usize,
    /// Minimum bars between accepted swing points.
    pub min_spacing: usize,
}

impl Default for SwingConfig {
    fn default() -> Self {
        Self {
            window: 5,
            min_spacing: 3,
        }
    }
}

impl SwingConfig {
    #[must_use]
    pub fn with_window(window: usize) -> Self {
        Self {
            window,
            min_spacing: 0,
        }
    }
}

/// Indices of swing highs (`is_high`) or lows in `prices`.
///
/// A point qualifies when it equals the extreme of its `window`-bar
/// neighborhood on both sides and lies at least `min_spacing` bars past the
/// previously accepted point.
#[must_use]
pub fn swing_points(prices: &[f64], is_high: bool, config: &SwingConfig) -> Vec<usize> {
    let n = prices.len();
    let w = config.window;
    let mut points: Vec<usize> = Vec::new();
    if w == 0 || n < 2 * w + 1 {
        return points;
    }

    for i in w..n - w {
        let slice = &prices[i - w..=i + w];
        let extreme = if is_high {
            slice.iter().copied().fold(f64::MIN, f64::max)
        } else {
            slice.iter().copied().fold(f64::MAX, f64::min)
        };
        if prices[i] != extreme {
            continue;
        }
        if let Some(&last) = points.last() {
            if i - last < config.min_spacing {
                continue;
            }
        }
        points.push(i);
    }

    points
}
