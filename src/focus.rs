//! Focus scoring and best-frame selection.
//!
//! The score is the variance of a 3x3 Laplacian response over the luma plane.
//! Edges produce large responses of both signs, so a crisp frame has a wide
//! spread and a blurred one collapses toward zero.

use crate::frame::Image;

/// Frames must score strictly above this to be kept.
pub const DEFAULT_SHARPNESS_THRESHOLD: f64 = 2000.0;

/// A focus score together with the threshold it was judged against.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SharpnessScore {
    pub value: f64,
    pub threshold: f64,
}

impl SharpnessScore {
    pub fn new(value: f64, threshold: f64) -> Self {
        Self { value, threshold }
    }

    pub fn passes(&self) -> bool {
        self.value > self.threshold
    }
}

/// Scores a frame for focus. Higher means sharper.
pub trait FocusMetric {
    fn name(&self) -> &'static str;

    fn score(&self, image: &Image) -> f64;
}

/// Variance of the 4-neighbour Laplacian over BT.601 luma.
#[derive(Clone, Copy, Debug, Default)]
pub struct LaplacianVariance;

impl FocusMetric for LaplacianVariance {
    fn name(&self) -> &'static str {
        "laplacian-variance"
    }

    fn score(&self, image: &Image) -> f64 {
        laplacian_variance(image)
    }
}

pub fn laplacian_variance(image: &Image) -> f64 {
    let luma = image.to_luma();
    laplacian_variance_luma(&luma, image.width as usize, image.height as usize)
}

/// Laplacian variance of a `width` x `height` luma plane.
///
/// Kernel `[0 1 0; 1 -4 1; 0 1 0]`, borders mirrored without repeating the
/// edge pixel (`dcb|abcd|cba`), population variance over every pixel.
pub fn laplacian_variance_luma(luma: &[u8], width: usize, height: usize) -> f64 {
    debug_assert_eq!(luma.len(), width * height);
    if width == 0 || height == 0 {
        return 0.0;
    }
    let at = |x: isize, y: isize| -> f64 {
        let x = reflect101(x, width);
        let y = reflect101(y, height);
        luma[y * width + x] as f64
    };

    let mut response = Vec::with_capacity(width * height);
    for y in 0..height as isize {
        for x in 0..width as isize {
            let lap = at(x - 1, y) + at(x + 1, y) + at(x, y - 1) + at(x, y + 1) - 4.0 * at(x, y);
            response.push(lap);
        }
    }

    let n = response.len() as f64;
    let mean = response.iter().sum::<f64>() / n;
    response.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n
}

fn reflect101(i: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let last = len as isize - 1;
    let mut i = i;
    // Planes narrower than the kernel can need more than one bounce.
    while i < 0 || i > last {
        if i < 0 {
            i = -i;
        }
        if i > last {
            i = 2 * last - i;
        }
    }
    i as usize
}

/// The frame chosen from a burst.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Selection {
    pub index: usize,
    pub score: f64,
}

/// Pick the highest score. Ties keep the earliest index; later frames only
/// replace the current best when strictly greater.
pub fn select_max(scores: &[f64]) -> Option<Selection> {
    let mut best: Option<Selection> = None;
    for (index, &score) in scores.iter().enumerate() {
        match best {
            Some(current) if score <= current.score => {}
            _ => best = Some(Selection { index, score }),
        }
    }
    best
}

/// Score every candidate with `metric` and pick the sharpest.
pub fn select_sharpest(metric: &dyn FocusMetric, candidates: &[Image]) -> Option<Selection> {
    let scores: Vec<f64> = candidates.iter().map(|image| metric.score(image)).collect();
    select_max(&scores)
}
