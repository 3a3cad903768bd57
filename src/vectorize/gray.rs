use image::{GrayImage, Luma, RgbImage};

// BT.601 luma weights in Q14 fixed point (0.299, 0.587, 0.114).
const WEIGHT_R: u32 = 4899;
const WEIGHT_G: u32 = 9617;
const WEIGHT_B: u32 = 1868;
const SHIFT: u32 = 14;

/// Reduces an RGB raster to a single luminance channel.
pub fn to_luma(raster: &RgbImage) -> GrayImage {
    let (width, height) = raster.dimensions();
    let mut luma = GrayImage::new(width, height);
    for (x, y, pixel) in raster.enumerate_pixels() {
        luma.put_pixel(x, y, Luma([luminance(pixel.0)]));
    }
    luma
}

#[inline]
fn luminance([r, g, b]: [u8; 3]) -> u8 {
    let weighted = WEIGHT_R * r as u32 + WEIGHT_G * g as u32 + WEIGHT_B * b as u32;
    ((weighted + (1 << (SHIFT - 1))) >> SHIFT) as u8
}
