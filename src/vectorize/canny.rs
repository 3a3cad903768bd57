use image::{GrayImage, Luma};
use imageproc::gradients::{horizontal_sobel, vertical_sobel};

/// `tan(22.5°)` in Q15.
const TG22_Q15: i64 = 13573;
const Q15: u32 = 15;

pub const EDGE: u8 = 255;

const NOT_EDGE: u8 = 0;
const WEAK: u8 = 1;
const STRONG: u8 = 2;

struct Gradients {
    w: usize,
    h: usize,
    gx: Vec<i32>,
    gy: Vec<i32>,
    mag: Vec<i32>,
}

impl Gradients {
    fn compute(src: &GrayImage) -> Self {
        let (width, height) = src.dimensions();
        let gx_img = horizontal_sobel(src);
        let gy_img = vertical_sobel(src);
        let gx: Vec<i32> = gx_img.pixels().map(|p| p.0[0] as i32).collect();
        let gy: Vec<i32> = gy_img.pixels().map(|p| p.0[0] as i32).collect();
        let mag = gx
            .iter()
            .zip(gy.iter())
            .map(|(dx, dy)| dx.abs() + dy.abs())
            .collect();
        Self {
            w: width as usize,
            h: height as usize,
            gx,
            gy,
            mag,
        }
    }

    #[inline]
    fn mag_at(&self, x: isize, y: isize) -> i32 {
        if x < 0 || y < 0 || x >= self.w as isize || y >= self.h as isize {
            return 0;
        }
        self.mag[y as usize * self.w + x as usize]
    }

    fn is_local_maximum(&self, x: usize, y: usize) -> bool {
        let idx = y * self.w + x;
        let m = self.mag[idx];
        let dx = self.gx[idx];
        let dy = self.gy[idx];
        let (xi, yi) = (x as isize, y as isize);

        let ax = dx.unsigned_abs() as i64;
        let ay = (dy.unsigned_abs() as i64) << Q15;
        let tg22x = ax * TG22_Q15;
        if ay < tg22x {
            return m > self.mag_at(xi - 1, yi) && m >= self.mag_at(xi + 1, yi);
        }
        let tg67x = tg22x + (ax << (Q15 + 1));
        if ay > tg67x {
            return m > self.mag_at(xi, yi - 1) && m >= self.mag_at(xi, yi + 1);
        }
        let s: isize = if (dx ^ dy) < 0 { -1 } else { 1 };
        m > self.mag_at(xi - s, yi - 1) && m > self.mag_at(xi + s, yi + 1)
    }
}

/// Canny edge map (0 / 255) of an already smoothed grayscale field.
///
/// - Sobel 3×3 gradients with replicated borders.
/// - L1 magnitude `|gx| + |gy|`.
/// - Non-maximum suppression against the two neighbours along the gradient
///   direction quantized to 0°, 45°, 90° or 135°. Magnitudes outside the
///   image count as zero.
/// - Hysteresis: magnitudes above `high` seed edges, magnitudes above `low`
///   that survive suppression join an edge when 8-connected to a seed.
pub fn detect_edges(src: &GrayImage, low: f32, high: f32) -> GrayImage {
    let (width, height) = src.dimensions();
    if width == 0 || height == 0 {
        return GrayImage::new(width, height);
    }
    let (low, high) = ordered_thresholds(low, high);
    let grad = Gradients::compute(src);
    let (w, h) = (grad.w, grad.h);

    let mut labels = vec![NOT_EDGE; w * h];
    let mut seeds = Vec::new();
    for y in 0..h {
        for x in 0..w {
            let m = grad.mag[y * w + x];
            if m <= low || !grad.is_local_maximum(x, y) {
                continue;
            }
            if m > high {
                labels[y * w + x] = STRONG;
                seeds.push((x, y));
            } else {
                labels[y * w + x] = WEAK;
            }
        }
    }

    link_weak_edges(&mut labels, w, h, seeds);

    let mut edges = GrayImage::new(width, height);
    for (idx, label) in labels.iter().enumerate() {
        if *label == STRONG {
            edges.put_pixel((idx % w) as u32, (idx / w) as u32, Luma([EDGE]));
        }
    }
    edges
}

/// Promotes every weak label reachable from a seed through 8-neighbours.
fn link_weak_edges(labels: &mut [u8], w: usize, h: usize, mut stack: Vec<(usize, usize)>) {
    while let Some((x, y)) = stack.pop() {
        let y0 = y.saturating_sub(1);
        let y1 = (y + 1).min(h - 1);
        let x0 = x.saturating_sub(1);
        let x1 = (x + 1).min(w - 1);
        for ny in y0..=y1 {
            for nx in x0..=x1 {
                let idx = ny * w + nx;
                if labels[idx] == WEAK {
                    labels[idx] = STRONG;
                    stack.push((nx, ny));
                }
            }
        }
    }
}

fn ordered_thresholds(low: f32, high: f32) -> (i32, i32) {
    let (low, high) = if low > high { (high, low) } else { (low, high) };
    (low.floor() as i32, high.floor() as i32)
}

pub fn count_edges(edges: &GrayImage) -> usize {
    edges.pixels().filter(|p| p.0[0] == EDGE).count()
}
