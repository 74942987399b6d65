//! Chart pattern scanner: shared detection types and the all-patterns
//! sweep.

use serde::{Deserialize, Serialize};
use stocklens_core::BarSeries;

use crate::cup_handle::CupAndHandle;
use crate::double::DoubleTopBottom;
use crate::head_shoulders::HeadAndShoulders;
use crate::triangle::TrianglePattern;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatternKind {
    CupAndHandle,
    HeadAndShoulders,
    InverseHeadAndShoulders,
    DoubleTop,
    DoubleBottom,
    AscendingTriangle,
    DescendingTriangle,
    SymmetricalTriangle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatternBias {
    Bullish,
    Bearish,
    Neutral,
}

/// Typed detection descriptor shared by every chart-pattern detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternDetection {
    pub kind: PatternKind,
    pub detected: bool,
    /// Confidence score in [0, 100].
    pub score: f64,
    pub bias: PatternBias,
    pub start_idx: usize,
    pub end_idx: usize,
    /// Level whose break confirms the pattern.
    pub breakout_price: Option<f64>,
    /// Measured-move projection from the pattern height.
    pub projected_target: Option<f64>,
    pub stop_price: Option<f64>,
    /// Named anchor prices (rims, shoulders, valleys, ...).
    pub key_points: Vec<(String, f64)>,
}

impl PatternDetection {
    #[must_use]
    pub fn not_detected(kind: PatternKind) -> Self {
        Self {
            kind,
            detected: false,
            score: 0.0,
            bias: PatternBias::Neutral,
            start_idx: 0,
            end_idx: 0,
            breakout_price: None,
            projected_target: None,
            stop_price: None,
            key_points: Vec::new(),
        }
    }
}

/// Runs every chart-pattern detector and returns detections sorted by
/// score, strongest first.
#[derive(Debug, Clone, Default)]
pub struct PatternScanner {
    cup_handle: CupAndHandle,
    head_shoulders: HeadAndShoulders,
    double: DoubleTopBottom,
    triangle: TrianglePattern,
}

impl PatternScanner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn scan(&self, series: &BarSeries) -> Vec<PatternDetection> {
        let mut detections: Vec<PatternDetection> = [
            self.cup_handle.detect(series),
            self.head_shoulders.detect(series),
            self.double.detect(series),
            self.triangle.detect(series),
        ]
        .into_iter()
        .filter(|d| d.detected)
        .collect();

        detections.sort_by(|a, b| b.score.total_cmp(&a.score));
        detections
    }
}
