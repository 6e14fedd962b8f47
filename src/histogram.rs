//! Hue × saturation histograms and the colour-change score.
//!
//! Colours are converted to 8-bit HSV with hue halved into `0..180` and
//! saturation scaled to `0..=255`, then binned into a 50 × 60 grid.

use image::RgbImage;

/// Number of hue bins over `0..180`.
pub const HUE_BINS: usize = 50;
/// Number of saturation bins over `0..256`.
pub const SATURATION_BINS: usize = 60;

const HUE_RANGE: f64 = 180.0;
const SATURATION_RANGE: f64 = 256.0;

/// 8-bit hue (`0..180`) and saturation (`0..=255`) of an RGB pixel.
pub(crate) fn hue_saturation(r: u8, g: u8, b: u8) -> (u8, u8) {
    let (rf, gf, bf) = (f64::from(r), f64::from(g), f64::from(b));
    let value = rf.max(gf).max(bf);
    let minimum = rf.min(gf).min(bf);
    let delta = value - minimum;

    let saturation = if value > 0.0 {
        (255.0 * delta / value).round()
    } else {
        0.0
    };

    let mut hue = if delta == 0.0 {
        0.0
    } else if value == rf {
        60.0 * (gf - bf) / delta
    } else if value == gf {
        120.0 + 60.0 * (bf - rf) / delta
    } else {
        240.0 + 60.0 * (rf - gf) / delta
    };
    if hue < 0.0 {
        hue += 360.0;
    }
    let hue = (hue / 2.0).round() as u32 % 180;

    (hue as u8, saturation.clamp(0.0, 255.0) as u8)
}

/// L2-normalised hue × saturation histogram, flattened hue-major.
#[derive(Debug, Clone, PartialEq)]
pub struct HueSaturationHistogram {
    bins: Vec<f64>,
}

impl HueSaturationHistogram {
    pub fn from_image(image: &RgbImage) -> Self {
        let mut bins = vec![0.0; HUE_BINS * SATURATION_BINS];
        for pixel in image.as_raw().chunks_exact(3) {
            let (hue, saturation) = hue_saturation(pixel[0], pixel[1], pixel[2]);
            let h = ((f64::from(hue) * HUE_BINS as f64 / HUE_RANGE) as usize).min(HUE_BINS - 1);
            let s = ((f64::from(saturation) * SATURATION_BINS as f64 / SATURATION_RANGE) as usize)
                .min(SATURATION_BINS - 1);
            bins[h * SATURATION_BINS + s] += 1.0;
        }

        let norm = bins.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for value in &mut bins {
                *value /= norm;
            }
        }
        Self { bins }
    }

    /// Chi-square distance `Σ (a − b)² / a` over bins where `a` is non-zero.
    /// Not symmetric: `self` is the reference histogram.
    pub fn chi_square(&self, other: &Self) -> f64 {
        self.bins
            .iter()
            .zip(&other.bins)
            .filter(|(a, _)| a.abs() > f64::EPSILON)
            .map(|(a, b)| (a - b).powi(2) / a)
            .sum()
    }
}
