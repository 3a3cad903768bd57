use image::GrayImage;

use super::Segment;

const FIXED_SHIFT: u32 = 16;
const MWC_MULTIPLIER: u64 = 4_164_903_690;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentOptions {
    /// Distance resolution of the accumulator in pixels.
    pub rho: f32,
    /// Angle resolution of the accumulator in radians.
    pub theta: f32,
    /// Votes a cell needs before a segment is traced through it.
    pub threshold: i32,
    /// Segments shorter than this along both axes are discarded.
    pub min_line_length: i32,
    /// Longest run of missing pixels bridged while tracing.
    pub max_line_gap: i32,
    pub seed: u64,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            rho: 1.0,
            theta: std::f32::consts::PI / 180.0,
            threshold: 120,
            min_line_length: 50,
            max_line_gap: 8,
            seed: u64::MAX,
        }
    }
}

struct MwcRng {
    state: u64,
}

impl MwcRng {
    fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { u64::MAX } else { seed },
        }
    }

    fn next_u32(&mut self) -> u32 {
        self.state = (self.state as u32 as u64)
            .wrapping_mul(MWC_MULTIPLIER)
            .wrapping_add(self.state >> 32);
        self.state as u32
    }

    fn below(&mut self, bound: usize) -> usize {
        (self.next_u32() % bound as u32) as usize
    }
}

struct Accumulator {
    trig: Vec<(f32, f32)>,
    num_rho: usize,
    rho_offset: i32,
    votes: Vec<i32>,
}

impl Accumulator {
    fn new(width: i32, height: i32, rho: f32, theta: f32) -> Self {
        let irho = 1.0 / rho as f64;
        let num_angle = ((std::f32::consts::PI / theta).round_ties_even() as usize).max(1);
        let num_rho = ((((width + height) * 2 + 1) as f32 / rho).round_ties_even() as usize).max(1);
        let trig = (0..num_angle)
            .map(|n| {
                let angle = n as f64 * theta as f64;
                ((angle.cos() * irho) as f32, (angle.sin() * irho) as f32)
            })
            .collect::<Vec<_>>();
        Self {
            votes: vec![0; num_angle * num_rho],
            trig,
            num_rho,
            rho_offset: (num_rho as i32 - 1) / 2,
        }
    }

    #[inline]
    fn cell(&self, n: usize, x: i32, y: i32) -> usize {
        let (cos, sin) = self.trig[n];
        let r = (x as f32 * cos + y as f32 * sin).round_ties_even() as i32 + self.rho_offset;
        n * self.num_rho + r.clamp(0, self.num_rho as i32 - 1) as usize
    }

    /// Adds the votes of `(x, y)` and returns the strongest angle index with its count.
    fn vote(&mut self, x: i32, y: i32, floor: i32) -> (usize, i32) {
        let mut best = (0, floor);
        for n in 0..self.trig.len() {
            let cell = self.cell(n, x, y);
            self.votes[cell] += 1;
            if self.votes[cell] > best.1 {
                best = (n, self.votes[cell]);
            }
        }
        best
    }

    fn withdraw(&mut self, x: i32, y: i32) {
        for n in 0..self.trig.len() {
            let cell = self.cell(n, x, y);
            self.votes[cell] -= 1;
        }
    }
}

/// Fixed-point stepping along a Hough line, one pixel per step on the major axis.
#[derive(Clone, Copy)]
struct Walk {
    x0: i64,
    y0: i64,
    dx0: i64,
    dy0: i64,
    x_major: bool,
}

impl Walk {
    fn new(px: i32, py: i32, cos: f32, sin: f32) -> Self {
        let a = -sin;
        let b = cos;
        let one = (1i64 << FIXED_SHIFT) as f32;
        let half = 1i64 << (FIXED_SHIFT - 1);
        if a.abs() > b.abs() {
            Walk {
                x0: px as i64,
                y0: ((py as i64) << FIXED_SHIFT) + half,
                dx0: if a > 0.0 { 1 } else { -1 },
                dy0: (b * one / a.abs()).round_ties_even() as i64,
                x_major: true,
            }
        } else {
            Walk {
                x0: ((px as i64) << FIXED_SHIFT) + half,
                y0: py as i64,
                dx0: (a * one / b.abs()).round_ties_even() as i64,
                dy0: if b > 0.0 { 1 } else { -1 },
                x_major: false,
            }
        }
    }

    fn step(&self, forward: bool) -> (i64, i64) {
        if forward {
            (self.dx0, self.dy0)
        } else {
            (-self.dx0, -self.dy0)
        }
    }

    #[inline]
    fn pixel(&self, x: i64, y: i64) -> (i32, i32) {
        if self.x_major {
            (x as i32, (y >> FIXED_SHIFT) as i32)
        } else {
            ((x >> FIXED_SHIFT) as i32, y as i32)
        }
    }
}

/// Progressive probabilistic Hough transform.
///
/// Edge pixels are visited in pseudo-random order. Each visited pixel votes
/// for every `(θ, ρ)` cell it lies on; as soon as one of its cells reaches
/// the vote threshold the line through that cell is walked in both
/// directions from the pixel, tolerating up to `max_line_gap` empty steps.
/// The walked pixels are removed from further consideration, and when the
/// resulting segment is long enough their votes are withdrawn and the
/// segment is emitted.
///
/// The visiting order comes from a fixed-seed multiply-with-carry generator,
/// so a given edge map always yields the same segments in the same order.
pub fn detect_segments(edges: &GrayImage, options: &SegmentOptions) -> Vec<Segment> {
    let (width, height) = edges.dimensions();
    let (w, h) = (width as i32, height as i32);
    let mut segments = Vec::new();
    if w == 0 || h == 0 || options.rho <= 0.0 || options.theta <= 0.0 {
        return segments;
    }

    let mut mask = vec![false; (w * h) as usize];
    let mut points = Vec::new();
    for (x, y, pixel) in edges.enumerate_pixels() {
        if pixel.0[0] != 0 {
            mask[(y * width + x) as usize] = true;
            points.push((x as i32, y as i32));
        }
    }

    let mut accum = Accumulator::new(w, h, options.rho, options.theta);
    let mut rng = MwcRng::new(options.seed);
    let inside = |x: i32, y: i32| x >= 0 && y >= 0 && x < w && y < h;

    let mut count = points.len();
    while count > 0 {
        let idx = rng.below(count);
        let (px, py) = points[idx];
        points[idx] = points[count - 1];
        count -= 1;

        if !mask[(py * w + px) as usize] {
            continue;
        }

        let (best_n, best_votes) = accum.vote(px, py, options.threshold - 1);
        if best_votes < options.threshold {
            continue;
        }

        let (cos, sin) = accum.trig[best_n];
        let walk = Walk::new(px, py, cos, sin);
        let mut ends = [(px, py); 2];

        for (k, forward) in [true, false].into_iter().enumerate() {
            let (dx, dy) = walk.step(forward);
            let (mut x, mut y) = (walk.x0, walk.y0);
            let mut gap = 0;
            loop {
                let (jx, iy) = walk.pixel(x, y);
                if !inside(jx, iy) {
                    break;
                }
                if mask[(iy * w + jx) as usize] {
                    gap = 0;
                    ends[k] = (jx, iy);
                } else {
                    gap += 1;
                    if gap > options.max_line_gap {
                        break;
                    }
                }
                x += dx;
                y += dy;
            }
        }

        let good_line = (ends[1].0 - ends[0].0).abs() >= options.min_line_length
            || (ends[1].1 - ends[0].1).abs() >= options.min_line_length;

        for (k, forward) in [true, false].into_iter().enumerate() {
            let (dx, dy) = walk.step(forward);
            let (mut x, mut y) = (walk.x0, walk.y0);
            loop {
                let (jx, iy) = walk.pixel(x, y);
                if !inside(jx, iy) {
                    break;
                }
                let slot = (iy * w + jx) as usize;
                if mask[slot] {
                    if good_line {
                        accum.withdraw(jx, iy);
                    }
                    mask[slot] = false;
                }
                if (jx, iy) == ends[k] {
                    break;
                }
                x += dx;
                y += dy;
            }
        }

        if good_line {
            segments.push(Segment::new(ends[0].0, ends[0].1, ends[1].0, ends[1].1));
        }
    }

    segments
}
