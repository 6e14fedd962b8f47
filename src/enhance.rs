//! Clarity measurement and the optional enhancement chain for output frames.
//!
//! [`ClarityReport::measure`] classifies a frame by focus (Laplacian
//! variance), edge strength, contrast and brightness. [`enhance_frame`]
//! then applies, in order:
//!
//! 1. gamma correction for dark or bright frames,
//! 2. contrast-limited adaptive histogram equalisation (CLAHE) of the
//!    lightness channel for flat frames,
//! 3. a sharpening kernel chosen by how blurry the frame is,
//! 4. an edge-preserving bilateral blur for very dark frames,
//! 5. a chroma shift toward neutral for frames outside a comfortable
//!    brightness band.
//!
//! Colour conversions follow the 8-bit CIE L\*a\*b\* encoding
//! (`L × 255 / 100`, `a + 128`, `b + 128`) with a D65 white point.

use image::{GrayImage, ImageBuffer, Luma, RgbImage};
use imageproc::{
    filter::{self, Kernel},
    gradients,
};
use serde::Serialize;

use crate::{
    error::KeyframeError,
    imaging::{self, Border},
};

/// Laplacian variance above which a frame is considered in focus.
const CLEAR_THRESHOLD: f64 = 100.0;
/// Mean intensity below which a frame is dark.
const DARK_THRESHOLD: f64 = 50.0;
/// Mean intensity above which a frame is bright.
const BRIGHT_THRESHOLD: f64 = 200.0;
/// Intensity standard deviation below which a frame is low-contrast.
const LOW_CONTRAST_THRESHOLD: f64 = 30.0;

const DARK_GAMMA: f64 = 0.7;
const BRIGHT_GAMMA: f64 = 1.3;

const CLAHE_CLIP_LIMIT: f64 = 2.5;
const CLAHE_TILES: usize = 8;
const CLAHE_CONTRAST_BELOW: f64 = 40.0;

const SHARPEN_CLARITY_BELOW: f64 = 150.0;

const LAPLACIAN: [f32; 9] = [0.0, 1.0, 0.0, 1.0, -4.0, 1.0, 0.0, 1.0, 0.0];

/// Distance from the centre of the bilateral window to its edge.
const BILATERAL_RADIUS: u32 = 4;
const BILATERAL_SIGMA_COLOR: f32 = 75.0;
const BILATERAL_SIGMA_SPACE: f32 = 75.0;
const DENOISE_BRIGHTNESS_BELOW: f64 = 40.0;

const CAST_BRIGHTNESS_LOW: f64 = 60.0;
const CAST_BRIGHTNESS_HIGH: f64 = 180.0;
const CAST_CORRECTION: f64 = 0.3;

/// Focus, edge, contrast and exposure measurements of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClarityReport {
    /// Variance of the Laplacian of the grayscale frame.
    pub clarity_score: f64,
    /// Mean Sobel gradient magnitude.
    pub edge_strength: f64,
    /// Standard deviation of intensity.
    pub contrast: f64,
    /// Mean intensity.
    pub brightness: f64,
    pub is_clear: bool,
    pub is_dark: bool,
    pub is_bright: bool,
    pub is_low_contrast: bool,
}

impl ClarityReport {
    pub fn measure(image: &RgbImage) -> Self {
        let gray = imaging::to_grayscale(image);
        if gray.is_empty() {
            return Self::from_measurements(0.0, 0.0, 0.0, 0.0);
        }

        let laplacian: ImageBuffer<Luma<f32>, Vec<f32>> = Kernel::new(&LAPLACIAN, 3, 3)
            .filter(&gray, |out: &mut f32, response: f32| *out = response);
        let (_, clarity_score) = mean_and_variance(laplacian.iter().map(|&v| f64::from(v)));

        let dx = gradients::horizontal_sobel(&gray);
        let dy = gradients::vertical_sobel(&gray);
        let magnitudes: Vec<f64> = dx
            .iter()
            .zip(dy.iter())
            .map(|(&x, &y)| f64::from(x).hypot(f64::from(y)))
            .collect();
        let edge_strength = if magnitudes.is_empty() {
            0.0
        } else {
            magnitudes.iter().sum::<f64>() / magnitudes.len() as f64
        };

        let (brightness, variance) = mean_and_variance(gray.iter().map(|&v| f64::from(v)));
        Self::from_measurements(clarity_score, edge_strength, variance.sqrt(), brightness)
    }

    fn from_measurements(
        clarity_score: f64,
        edge_strength: f64,
        contrast: f64,
        brightness: f64,
    ) -> Self {
        Self {
            clarity_score,
            edge_strength,
            contrast,
            brightness,
            is_clear: clarity_score > CLEAR_THRESHOLD,
            is_dark: brightness < DARK_THRESHOLD,
            is_bright: brightness > BRIGHT_THRESHOLD,
            is_low_contrast: contrast < LOW_CONTRAST_THRESHOLD,
        }
    }
}

/// Mean and population variance; both 0 for an empty sequence.
fn mean_and_variance(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (mut count, mut sum, mut squares) = (0_usize, 0.0, 0.0);
    for value in values {
        count += 1;
        sum += value;
        squares += value * value;
    }
    if count == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / count as f64;
    (mean, (squares / count as f64 - mean * mean).max(0.0))
}

/// Enhance a frame for output. Returns the input unchanged if any step
/// fails.
pub fn enhance_frame(image: &RgbImage) -> RgbImage {
    let report = ClarityReport::measure(image);
    log::debug!(
        "Frame clarity {:.1}, contrast {:.1}, brightness {:.1}",
        report.clarity_score,
        report.contrast,
        report.brightness
    );
    match apply_enhancements(image, &report) {
        Ok(enhanced) => enhanced,
        Err(error) => {
            log::warn!("Image enhancement failed, keeping original frame: {error}");
            image.clone()
        }
    }
}

fn apply_enhancements(image: &RgbImage, report: &ClarityReport) -> Result<RgbImage, KeyframeError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(KeyframeError::VideoDecodeError(
            "cannot enhance an empty frame".to_string(),
        ));
    }
    let mut enhanced = image.clone();

    if report.is_dark {
        apply_lookup(&mut enhanced, &gamma_table(DARK_GAMMA));
    } else if report.is_bright {
        apply_lookup(&mut enhanced, &gamma_table(BRIGHT_GAMMA));
    }

    if report.is_low_contrast || report.contrast < CLAHE_CONTRAST_BELOW {
        enhanced = equalize_lightness(&enhanced)?;
    }

    if !report.is_clear || report.clarity_score < SHARPEN_CLARITY_BELOW {
        enhanced = sharpen(&enhanced, report.clarity_score)?;
    }

    if report.is_dark && report.brightness < DENOISE_BRIGHTNESS_BELOW {
        enhanced = denoise(&enhanced)?;
    }

    if report.brightness < CAST_BRIGHTNESS_LOW || report.brightness > CAST_BRIGHTNESS_HIGH {
        enhanced = neutralize_color_cast(&enhanced)?;
    }

    Ok(enhanced)
}

// ── Exposure ───────────────────────────────────────────────────────

/// `table[i] = (i / 255)^(1 / gamma) × 255`, truncated.
pub(crate) fn gamma_table(gamma: f64) -> [u8; 256] {
    let inverse = 1.0 / gamma;
    let mut table = [0_u8; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        *entry = ((i as f64 / 255.0).powf(inverse) * 255.0).clamp(0.0, 255.0) as u8;
    }
    table
}

fn apply_lookup(image: &mut RgbImage, table: &[u8; 256]) {
    for value in image.iter_mut() {
        *value = table[usize::from(*value)];
    }
}

// ── Lab colour space ───────────────────────────────────────────────

const WHITE_X: f64 = 0.950_456;
const WHITE_Z: f64 = 1.088_754;
const LAB_EPSILON: f64 = 0.008_856;
const LAB_KAPPA: f64 = 903.3;

fn srgb_to_linear(channel: u8) -> f64 {
    let c = f64::from(channel) / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(value: f64) -> u8 {
    let c = if value <= 0.003_130_8 {
        12.92 * value
    } else {
        1.055 * value.max(0.0).powf(1.0 / 2.4) - 0.055
    };
    imaging::saturate_u8(c * 255.0)
}

fn lab_f(t: f64) -> f64 {
    if t > LAB_EPSILON {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

/// 8-bit L\*a\*b\* of one sRGB pixel.
pub(crate) fn rgb_to_lab(rgb: [u8; 3]) -> [u8; 3] {
    let (r, g, b) = (
        srgb_to_linear(rgb[0]),
        srgb_to_linear(rgb[1]),
        srgb_to_linear(rgb[2]),
    );
    let x = (0.412_453 * r + 0.357_580 * g + 0.180_423 * b) / WHITE_X;
    let y = 0.212_671 * r + 0.715_160 * g + 0.072_169 * b;
    let z = (0.019_334 * r + 0.119_193 * g + 0.950_227 * b) / WHITE_Z;

    let lightness = if y > LAB_EPSILON {
        116.0 * y.cbrt() - 16.0
    } else {
        LAB_KAPPA * y
    };
    let (fx, fy, fz) = (lab_f(x), lab_f(y), lab_f(z));
    [
        imaging::saturate_u8(lightness * 255.0 / 100.0),
        imaging::saturate_u8(500.0 * (fx - fy) + 128.0),
        imaging::saturate_u8(200.0 * (fy - fz) + 128.0),
    ]
}

/// sRGB of one 8-bit L\*a\*b\* pixel.
pub(crate) fn lab_to_rgb(lab: [u8; 3]) -> [u8; 3] {
    let lightness = f64::from(lab[0]) * 100.0 / 255.0;
    let a = f64::from(lab[1]) - 128.0;
    let b = f64::from(lab[2]) - 128.0;

    let (y, fy) = if lightness > LAB_KAPPA * LAB_EPSILON {
        let fy = (lightness + 16.0) / 116.0;
        (fy * fy * fy, fy)
    } else {
        let y = lightness / LAB_KAPPA;
        (y, 7.787 * y + 16.0 / 116.0)
    };
    let inverse_f = |f: f64| {
        let cube = f * f * f;
        if cube > LAB_EPSILON {
            cube
        } else {
            (f - 16.0 / 116.0) / 7.787
        }
    };
    let x = inverse_f(a / 500.0 + fy) * WHITE_X;
    let z = inverse_f(fy - b / 200.0) * WHITE_Z;

    [
        linear_to_srgb(3.240_479 * x - 1.537_150 * y - 0.498_535 * z),
        linear_to_srgb(-0.969_256 * x + 1.875_991 * y + 0.041_556 * z),
        linear_to_srgb(0.055_648 * x - 0.204_043 * y + 1.057_311 * z),
    ]
}

fn image_to_lab(image: &RgbImage) -> Vec<[u8; 3]> {
    image.pixels().map(|pixel| rgb_to_lab(pixel.0)).collect()
}

fn lab_to_image(width: u32, height: u32, lab: &[[u8; 3]]) -> Result<RgbImage, KeyframeError> {
    let data: Vec<u8> = lab.iter().flat_map(|&pixel| lab_to_rgb(pixel)).collect();
    RgbImage::from_raw(width, height, data).ok_or_else(|| {
        KeyframeError::VideoDecodeError("Lab buffer does not match frame size".to_string())
    })
}

// ── Local contrast ─────────────────────────────────────────────────

/// CLAHE on the lightness channel of an RGB image.
fn equalize_lightness(image: &RgbImage) -> Result<RgbImage, KeyframeError> {
    let (width, height) = (image.width() as usize, image.height() as usize);
    let mut lab = image_to_lab(image);
    let lightness: Vec<u8> = lab.iter().map(|pixel| pixel[0]).collect();
    let equalized = clahe(&lightness, width, height, CLAHE_CLIP_LIMIT, CLAHE_TILES);
    for (pixel, value) in lab.iter_mut().zip(equalized) {
        pixel[0] = value;
    }
    lab_to_image(image.width(), image.height(), &lab)
}

/// Contrast-limited adaptive histogram equalisation of an 8-bit plane.
///
/// The plane is divided into `tiles × tiles` regions (padded by mirroring
/// when the size is not a multiple). Each region's histogram is clipped at
/// `clip_limit × area / 256`, the excess spread evenly, and the resulting
/// mappings are blended bilinearly between region centres.
pub(crate) fn clahe(
    plane: &[u8],
    width: usize,
    height: usize,
    clip_limit: f64,
    tiles: usize,
) -> Vec<u8> {
    if width == 0 || height == 0 || tiles == 0 {
        return plane.to_vec();
    }
    let tile_width = width.div_ceil(tiles);
    let tile_height = height.div_ceil(tiles);
    let area = tile_width * tile_height;
    let clip = ((clip_limit * area as f64 / 256.0) as usize).max(1);
    let scale = 255.0 / area as f64;

    let mut lookups = vec![[0_u8; 256]; tiles * tiles];
    for ty in 0..tiles {
        for tx in 0..tiles {
            let mut histogram = [0_usize; 256];
            for y in ty * tile_height..(ty + 1) * tile_height {
                let sy = Border::Reflect101.resolve(y as isize, height);
                for x in tx * tile_width..(tx + 1) * tile_width {
                    let sx = Border::Reflect101.resolve(x as isize, width);
                    histogram[usize::from(plane[sy * width + sx])] += 1;
                }
            }

            let mut clipped = 0;
            for bin in histogram.iter_mut() {
                if *bin > clip {
                    clipped += *bin - clip;
                    *bin = clip;
                }
            }
            let batch = clipped / 256;
            let residual = clipped % 256;
            for bin in histogram.iter_mut() {
                *bin += batch;
            }
            if residual > 0 {
                let step = (256 / residual).max(1);
                for bin in histogram.iter_mut().step_by(step).take(residual) {
                    *bin += 1;
                }
            }

            let lookup = &mut lookups[ty * tiles + tx];
            let mut sum = 0;
            for (value, &count) in lookup.iter_mut().zip(histogram.iter()) {
                sum += count;
                *value = imaging::saturate_u8(sum as f64 * scale);
            }
        }
    }

    let mut output = vec![0_u8; plane.len()];
    for y in 0..height {
        let fy = y as f64 / tile_height as f64 - 0.5;
        let ty1 = fy.floor();
        let wy = fy - ty1;
        let ty2 = ((ty1 + 1.0) as usize).min(tiles - 1);
        let ty1 = ty1.max(0.0) as usize;
        for x in 0..width {
            let fx = x as f64 / tile_width as f64 - 0.5;
            let tx1 = fx.floor();
            let wx = fx - tx1;
            let tx2 = ((tx1 + 1.0) as usize).min(tiles - 1);
            let tx1 = tx1.max(0.0) as usize;

            let value = usize::from(plane[y * width + x]);
            let lookup = |tx: usize, ty: usize| f64::from(lookups[ty * tiles + tx][value]);
            let top = lookup(tx1, ty1) * (1.0 - wx) + lookup(tx2, ty1) * wx;
            let bottom = lookup(tx1, ty2) * (1.0 - wx) + lookup(tx2, ty2) * wx;
            output[y * width + x] = imaging::saturate_u8(top * (1.0 - wy) + bottom * wy);
        }
    }
    output
}

// ── Sharpening ─────────────────────────────────────────────────────

/// Sharpening kernel, its side length and blend strength for a clarity
/// score.
fn sharpening_kernel(clarity_score: f64) -> (Vec<f32>, u32, f32) {
    if clarity_score < 50.0 {
        let kernel: [f32; 25] = [
            -1.0, -1.0, -1.0, -1.0, -1.0, //
            -1.0, 2.0, 2.0, 2.0, -1.0, //
            -1.0, 2.0, 8.0, 2.0, -1.0, //
            -1.0, 2.0, 2.0, 2.0, -1.0, //
            -1.0, -1.0, -1.0, -1.0, -1.0,
        ];
        (kernel.iter().map(|v| v / 8.0).collect(), 5, 0.8)
    } else if clarity_score < 100.0 {
        let kernel: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 9.0, -1.0, -1.0, -1.0, -1.0];
        (kernel.to_vec(), 3, 0.6)
    } else {
        let kernel: [f32; 9] = [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0];
        (kernel.to_vec(), 3, 0.4)
    }
}

fn sharpen(image: &RgbImage, clarity_score: f64) -> Result<RgbImage, KeyframeError> {
    let (kernel, size, strength) = sharpening_kernel(clarity_score);
    let sharpened: RgbImage = Kernel::new(&kernel, size, size)
        .filter(image, |out: &mut u8, response: f32| {
            *out = clamp_u8(response)
        });

    let data: Vec<u8> = image
        .as_raw()
        .iter()
        .zip(sharpened.as_raw())
        .map(|(&original, &sharp)| {
            clamp_u8(f32::from(original) * (1.0 - strength) + f32::from(sharp) * strength)
        })
        .collect();
    RgbImage::from_raw(image.width(), image.height(), data).ok_or_else(|| {
        KeyframeError::VideoDecodeError("sharpened buffer does not match frame size".to_string())
    })
}

fn clamp_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

// ── Denoising ──────────────────────────────────────────────────────

/// Edge-preserving bilateral blur, applied to each channel.
fn denoise(image: &RgbImage) -> Result<RgbImage, KeyframeError> {
    let (width, height) = image.dimensions();
    let channels: Vec<GrayImage> = (0..3)
        .map(|channel| {
            let plane = GrayImage::from_fn(width, height, |x, y| {
                Luma([image.get_pixel(x, y).0[channel]])
            });
            filter::bilateral_filter(
                &plane,
                BILATERAL_RADIUS,
                BILATERAL_SIGMA_COLOR,
                BILATERAL_SIGMA_SPACE,
            )
        })
        .collect();

    let data: Vec<u8> = (0..(width as usize * height as usize))
        .flat_map(|i| channels.iter().map(move |plane| plane.as_raw()[i]))
        .collect();
    RgbImage::from_raw(width, height, data).ok_or_else(|| {
        KeyframeError::VideoDecodeError("denoised buffer does not match frame size".to_string())
    })
}

// ── Colour cast ────────────────────────────────────────────────────

/// Shift the a\* and b\* channels 30 % of the way toward neutral.
fn neutralize_color_cast(image: &RgbImage) -> Result<RgbImage, KeyframeError> {
    let mut lab = image_to_lab(image);
    let count = lab.len() as f64;
    let average_a = lab.iter().map(|p| f64::from(p[1])).sum::<f64>() / count;
    let average_b = lab.iter().map(|p| f64::from(p[2])).sum::<f64>() / count;
    let shift_a = (average_a - 128.0) * CAST_CORRECTION;
    let shift_b = (average_b - 128.0) * CAST_CORRECTION;
    for pixel in &mut lab {
        pixel[1] = imaging::saturate_u8(f64::from(pixel[1]) - shift_a);
        pixel[2] = imaging::saturate_u8(f64::from(pixel[2]) - shift_b);
    }
    lab_to_image(image.width(), image.height(), &lab)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn checkerboard(size: u32, cell: u32, dark: u8, light: u8) -> RgbImage {
        RgbImage::from_fn(size, size, |x, y| {
            let v = if (x / cell + y / cell) % 2 == 0 { dark } else { light };
            Rgb([v, v, v])
        })
    }

    fn mean(image: &RgbImage) -> f64 {
        image.as_raw().iter().map(|&v| f64::from(v)).sum::<f64>() / image.as_raw().len() as f64
    }

    #[test]
    fn flat_frame_is_blurry_and_low_contrast() {
        let report = ClarityReport::measure(&RgbImage::from_pixel(16, 16, Rgb([30, 30, 30])));
        assert_eq!(report.clarity_score, 0.0);
        assert_eq!(report.contrast, 0.0);
        assert_eq!(report.brightness, 30.0);
        assert!(!report.is_clear);
        assert!(report.is_dark);
        assert!(!report.is_bright);
        assert!(report.is_low_contrast);
    }

    #[test]
    fn sharp_checkerboard_is_clear() {
        let report = ClarityReport::measure(&checkerboard(32, 2, 0, 255));
        assert!(report.is_clear);
        assert!(report.edge_strength > 0.0);
        assert!(!report.is_low_contrast);
    }

    #[test]
    fn gamma_tables_keep_endpoints_and_order() {
        for gamma in [DARK_GAMMA, BRIGHT_GAMMA] {
            let table = gamma_table(gamma);
            assert_eq!(table[0], 0);
            assert_eq!(table[255], 255);
            assert!(table.windows(2).all(|pair| pair[0] <= pair[1]));
        }
        // Gamma below 1 darkens mid-tones, above 1 brightens them.
        assert!(gamma_table(DARK_GAMMA)[128] < 128);
        assert!(gamma_table(BRIGHT_GAMMA)[128] > 128);
    }

    #[test]
    fn lab_round_trip_is_close() {
        for rgb in [[0, 0, 0], [255, 255, 255], [200, 40, 40], [30, 160, 90], [20, 20, 220]] {
            let back = lab_to_rgb(rgb_to_lab(rgb));
            for (a, b) in rgb.iter().zip(back) {
                assert!(a.abs_diff(b) <= 4, "{rgb:?} -> {back:?}");
            }
        }
        let gray = rgb_to_lab([128, 128, 128]);
        assert_eq!((gray[1], gray[2]), (128, 128));
    }

    #[test]
    fn clahe_stretches_a_narrow_range() {
        let (width, height) = (32, 32);
        let plane: Vec<u8> = (0..width * height)
            .map(|i| 100 + ((i % width) * 20 / width) as u8)
            .collect();
        let output = clahe(&plane, width, height, CLAHE_CLIP_LIMIT, CLAHE_TILES);
        let spread = |values: &[u8]| {
            values.iter().max().copied().unwrap_or(0) - values.iter().min().copied().unwrap_or(0)
        };
        assert!(spread(&output) > spread(&plane));
    }

    #[test]
    fn denoising_keeps_flat_regions() {
        let image = RgbImage::from_pixel(12, 12, Rgb([40, 80, 120]));
        let denoised = denoise(&image).unwrap();
        assert_eq!(denoised.dimensions(), image.dimensions());
        assert!(
            denoised
                .as_raw()
                .iter()
                .zip(image.as_raw())
                .all(|(a, b)| a.abs_diff(*b) <= 1)
        );
    }

    #[test]
    fn sharpening_raises_edge_contrast() {
        let image = RgbImage::from_fn(16, 16, |x, _| {
            let v = if x < 8 { 90 } else { 150 };
            Rgb([v, v, v])
        });
        let sharpened = sharpen(&image, 120.0).unwrap();
        assert_eq!(sharpened.dimensions(), image.dimensions());
        assert!(sharpened.get_pixel(7, 8).0[0] < 90);
        assert!(sharpened.get_pixel(8, 8).0[0] > 150);
        assert_eq!(sharpened.get_pixel(2, 8).0[0], 90);
    }

    #[test]
    fn flat_dark_frame_is_brightened() {
        let image = RgbImage::from_pixel(16, 16, Rgb([30, 30, 30]));
        let enhanced = enhance_frame(&image);
        assert_eq!(enhanced.dimensions(), image.dimensions());
        assert!(mean(&enhanced) > mean(&image));
    }

    #[test]
    fn empty_frame_is_returned_unchanged() {
        let image = RgbImage::new(0, 0);
        assert_eq!(enhance_frame(&image), image);
    }
}
