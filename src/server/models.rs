use serde::{Deserialize, Serialize};

use crate::metrics::Metrics;
use crate::vectorize::Vectorization;

/// JSON envelope returned by both vectorize endpoints and printed by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorizeResponse {
    /// Base64 of the UTF-8 SVG document.
    pub svg: String,
    pub metrics: Metrics,
    pub confidence: f64,
}

impl From<&Vectorization> for VectorizeResponse {
    fn from(result: &Vectorization) -> Self {
        Self {
            svg: result.document.to_svg_base64(),
            metrics: result.metrics,
            confidence: result.confidence,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct UrlForm {
    pub(crate) image_url: Option<String>,
    pub(crate) px_per_ft: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}
