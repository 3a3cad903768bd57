use image::{DynamicImage, RgbImage};
use tracing::debug;

use crate::error::VectorizeError;

/// Decodes encoded image bytes into an RGB raster.
///
/// Every supported input (palette, grayscale, 16-bit, with or without alpha)
/// is normalized to 8-bit RGB so the grayscale stage can rely on a single
/// channel order. Alpha is dropped rather than composited.
pub fn decode_raster(bytes: &[u8]) -> Result<RgbImage, VectorizeError> {
    if bytes.is_empty() {
        return Err(VectorizeError::Decode("input is empty".to_string()));
    }
    let image = image::load_from_memory(bytes).map_err(|err| {
        match sniffed_non_image_mime(bytes) {
            Some(mime) => VectorizeError::Decode(format!("unsupported content type {}", mime)),
            None => VectorizeError::Decode(err.to_string()),
        }
    })?;
    let raster = to_rgb(image);
    debug!(
        "decoded raster {}x{}",
        raster.width(),
        raster.height()
    );
    Ok(raster)
}

fn to_rgb(image: DynamicImage) -> RgbImage {
    match image {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => other.to_rgb8(),
    }
}

fn sniffed_non_image_mime(bytes: &[u8]) -> Option<&'static str> {
    let kind = infer::get(bytes)?;
    if kind.matcher_type() == infer::MatcherType::Image {
        return None;
    }
    Some(kind.mime_type())
}
