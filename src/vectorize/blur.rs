use image::GrayImage;

const TAPS: [u32; 3] = [1, 2, 1];
const NORM_SHIFT: u32 = 4;

/// 3×3 Gaussian smoothing.
///
/// The kernel is the binomial `[1, 2, 1] ⊗ [1, 2, 1] / 16`, applied as a row
/// pass followed by a column pass on integer sums so the output is exact and
/// reproducible. Borders mirror without repeating the edge sample
/// (`gfedcb|abcdefgh|gfedcba`).
pub fn gaussian_3x3(src: &GrayImage) -> GrayImage {
    let (width, height) = src.dimensions();
    let (w, h) = (width as usize, height as usize);
    let mut out = GrayImage::new(width, height);
    if w == 0 || h == 0 {
        return out;
    }

    let input = src.as_raw();
    let mut rows = vec![0u32; w * h];
    for y in 0..h {
        let row = &input[y * w..(y + 1) * w];
        let dst = &mut rows[y * w..(y + 1) * w];
        for (x, value) in dst.iter_mut().enumerate() {
            let left = row[reflect101(x as isize - 1, w)] as u32;
            let right = row[reflect101(x as isize + 1, w)] as u32;
            *value = TAPS[0] * left + TAPS[1] * row[x] as u32 + TAPS[2] * right;
        }
    }

    let output: &mut [u8] = &mut out;
    for y in 0..h {
        let above = reflect101(y as isize - 1, h) * w;
        let below = reflect101(y as isize + 1, h) * w;
        let center = y * w;
        for x in 0..w {
            let sum = TAPS[0] * rows[above + x]
                + TAPS[1] * rows[center + x]
                + TAPS[2] * rows[below + x];
            output[center + x] = ((sum + (1 << (NORM_SHIFT - 1))) >> NORM_SHIFT) as u8;
        }
    }
    out
}

#[inline]
fn reflect101(index: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let last = len as isize - 1;
    let mirrored = if index < 0 {
        -index
    } else if index > last {
        2 * last - index
    } else {
        index
    };
    mirrored as usize
}
