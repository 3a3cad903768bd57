use serde::{Deserialize, Serialize};

use crate::vectorize::Segment;

const MIN_PX_PER_FT: f64 = 1e-6;
const CONFIDENCE_FLOOR: f64 = 0.2;
const LINES_PER_UNIT_CONFIDENCE: f64 = 250.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub walls_len_ft: f64,
    pub line_count: usize,
}

pub fn compute(segments: &[Segment], px_per_ft: f64) -> Metrics {
    let total_len_px: f64 = segments.iter().map(Segment::length).sum();
    Metrics {
        walls_len_ft: round_tenths(total_len_px / effective_scale(px_per_ft)),
        line_count: segments.len(),
    }
}

/// Linear ramp from 0.2 with no lines to 1.0 at 200 lines and beyond.
pub fn confidence(line_count: usize) -> f64 {
    (CONFIDENCE_FLOOR + line_count as f64 / LINES_PER_UNIT_CONFIDENCE).min(1.0)
}

fn effective_scale(px_per_ft: f64) -> f64 {
    if px_per_ft.is_nan() {
        return MIN_PX_PER_FT;
    }
    px_per_ft.max(MIN_PX_PER_FT)
}

// Ties go to the even tenth.
fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}
