//! Structural similarity (SSIM) between grayscale frames.

use image::GrayImage;
use image_compare::Algorithm;

use crate::imaging;

/// Mean SSIM of two same-sized images, or `None` when the comparison cannot
/// be made (for example, mismatched dimensions).
pub fn structural_similarity(a: &GrayImage, b: &GrayImage) -> Option<f64> {
    image_compare::gray_similarity_structure(&Algorithm::MSSIMSimple, a, b)
        .ok()
        .map(|similarity| similarity.score)
}

/// Similarity of two analysis frames in `[-1, 1]`.
///
/// Frames of different sizes are both resized to the larger width and the
/// larger height first. Any failure scores 0, so it can never cause two
/// frames to be merged.
pub fn frame_similarity(a: &GrayImage, b: &GrayImage) -> f64 {
    let score = if a.dimensions() == b.dimensions() {
        structural_similarity(a, b)
    } else {
        let width = a.width().max(b.width());
        let height = a.height().max(b.height());
        structural_similarity(
            &imaging::resize_gray(a, width, height),
            &imaging::resize_gray(b, width, height),
        )
    };
    match score {
        Some(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn gradient(width: u32, height: u32, offset: u8) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            Luma([((x * 7 + y * 3) % 200) as u8 + offset])
        })
    }

    fn checkerboard(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            Luma([if (x / 4 + y / 4) % 2 == 0 { 0 } else { 255 }])
        })
    }

    #[test]
    fn identical_images_score_one() {
        let image = gradient(32, 24, 0);
        let score = structural_similarity(&image, &image).unwrap();
        assert!((score - 1.0).abs() < 1e-9, "score = {score}");
    }

    #[test]
    fn different_images_score_lower() {
        let score = structural_similarity(&gradient(32, 24, 0), &checkerboard(32, 24)).unwrap();
        assert!(score < 0.5, "score = {score}");
    }

    #[test]
    fn mismatched_sizes_fail_the_direct_comparison() {
        let a = gradient(32, 24, 0);
        let b = gradient(24, 32, 0);
        assert!(structural_similarity(&a, &b).is_none());
    }

    #[test]
    fn mismatched_sizes_are_resized() {
        let a = GrayImage::from_pixel(20, 10, Luma([100]));
        let b = GrayImage::from_pixel(10, 20, Luma([100]));
        let score = frame_similarity(&a, &b);
        assert!((score - 1.0).abs() < 1e-9, "score = {score}");
    }
}
