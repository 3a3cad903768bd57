mod blur;
mod canny;
mod gray;
mod hough;

use image::{GrayImage, RgbImage};
use tracing::{debug, info};

use crate::document::{StrokeStyle, VectorDocument};
use crate::metrics::{self, Metrics};

pub use blur::gaussian_3x3;
pub use canny::{count_edges, detect_edges};
pub use gray::to_luma;
pub use hough::{detect_segments, SegmentOptions};

pub const DEFAULT_PX_PER_FT: f64 = 12.0;

/// A straight stroke between two pixel positions, in detection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Segment {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Segment {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn length(&self) -> f64 {
        let dx = (self.x2 - self.x1) as f64;
        let dy = (self.y2 - self.y1) as f64;
        dx.hypot(dy)
    }
}

/// Tuned constants of the extraction pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionParams {
    pub canny_low: f32,
    pub canny_high: f32,
    pub segments: SegmentOptions,
    pub stroke: StrokeStyle,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            canny_low: 60.0,
            canny_high: 180.0,
            segments: SegmentOptions::default(),
            stroke: StrokeStyle::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vectorization {
    pub document: VectorDocument,
    pub metrics: Metrics,
    pub confidence: f64,
}

/// Runs the full raster-to-vector pipeline with the default parameters.
pub fn vectorize(raster: &RgbImage, px_per_ft: f64) -> Vectorization {
    vectorize_with(raster, px_per_ft, &DetectionParams::default())
}

pub fn vectorize_with(raster: &RgbImage, px_per_ft: f64, params: &DetectionParams) -> Vectorization {
    let (width, height) = raster.dimensions();
    let edges = edge_map(raster, params);
    debug!("edge pixels: {}", count_edges(&edges));

    let segments = detect_segments(&edges, &params.segments);
    let metrics = metrics::compute(&segments, px_per_ft);
    let confidence = metrics::confidence(metrics.line_count);
    info!(
        "vectorized {}x{}: {} lines, {} ft",
        width, height, metrics.line_count, metrics.walls_len_ft
    );

    Vectorization {
        document: VectorDocument::new(width, height, segments, params.stroke.clone()),
        metrics,
        confidence,
    }
}

/// Grayscale, blur and Canny stages; exposed for previews and tests.
pub fn edge_map(raster: &RgbImage, params: &DetectionParams) -> GrayImage {
    let luma = to_luma(raster);
    let blurred = gaussian_3x3(&luma);
    detect_edges(&blurred, params.canny_low, params.canny_high)
}
