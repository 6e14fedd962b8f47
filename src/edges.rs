//! Canny edge detection and the edge-change score.

use image::GrayImage;

/// Gradient magnitude below which a pixel is never an edge.
pub const LOW_THRESHOLD: f32 = 50.0;
/// Gradient magnitude above which a pixel is always an edge.
pub const HIGH_THRESHOLD: f32 = 150.0;

/// Binary edge map (0 or 255) with hysteresis between `low` and `high`.
pub fn canny(image: &GrayImage, low: f32, high: f32) -> GrayImage {
    if image.width() == 0 || image.height() == 0 {
        return GrayImage::new(image.width(), image.height());
    }
    imageproc::edges::canny(image, low, high)
}

/// Edge score: sum of absolute differences between the two edge maps,
/// divided by the pixel count and scaled by 100.
pub fn edge_score(previous: &GrayImage, current: &GrayImage) -> Option<f64> {
    if previous.dimensions() != current.dimensions() {
        return None;
    }
    let pixels = previous.as_raw().len();
    if pixels == 0 {
        return None;
    }
    let a = canny(previous, LOW_THRESHOLD, HIGH_THRESHOLD);
    let b = canny(current, LOW_THRESHOLD, HIGH_THRESHOLD);
    let total: u64 = a
        .as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(&p, &q)| u64::from(p.abs_diff(q)))
        .sum();
    Some(total as f64 / pixels as f64 * 100.0)
}
