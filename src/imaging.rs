//! Shared image primitives for the analysis kernels.
//!
//! Frames arrive from the decoder as [`RgbImage`]s. Optical flow works on
//! [`Plane`], a single-channel `f64` grid, so that gradients, window sums and
//! squared intensities keep full precision.

use image::{GrayImage, RgbImage, imageops::FilterType};

/// Border handling for neighbourhood operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Border {
    /// `gfedcb|abcdefgh|gfedcba`: mirror without repeating the edge pixel.
    Reflect101,
    /// `aaaaaa|abcdefgh|hhhhhhh`: repeat the edge pixel.
    Replicate,
}

impl Border {
    /// Map a possibly out-of-range coordinate into `0..len`.
    #[inline]
    pub(crate) fn resolve(self, coordinate: isize, len: usize) -> usize {
        let len = len as isize;
        if len == 1 {
            return 0;
        }
        match self {
            Border::Replicate => coordinate.clamp(0, len - 1) as usize,
            Border::Reflect101 => {
                let period = 2 * (len - 1);
                let mut c = coordinate.rem_euclid(period);
                if c >= len {
                    c = period - c;
                }
                c as usize
            }
        }
    }
}

/// A single-channel image of `f64` samples in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Plane {
    pub(crate) width: usize,
    pub(crate) height: usize,
    pub(crate) data: Vec<f64>,
}

impl Plane {
    pub(crate) fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    pub(crate) fn from_gray(image: &GrayImage) -> Self {
        Self {
            width: image.width() as usize,
            height: image.height() as usize,
            data: image.as_raw().iter().map(|&v| f64::from(v)).collect(),
        }
    }

    #[inline]
    pub(crate) fn get(&self, x: usize, y: usize) -> f64 {
        self.data[y * self.width + x]
    }

    /// Sample with out-of-range coordinates resolved by `border`.
    #[inline]
    pub(crate) fn get_border(&self, x: isize, y: isize, border: Border) -> f64 {
        self.get(border.resolve(x, self.width), border.resolve(y, self.height))
    }

    /// Bilinear sample at a fractional position, clamping to the edges.
    pub(crate) fn sample_bilinear(&self, x: f64, y: f64) -> f64 {
        let max_x = (self.width - 1) as f64;
        let max_y = (self.height - 1) as f64;
        let x = x.clamp(0.0, max_x);
        let y = y.clamp(0.0, max_y);
        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let fx = x - x0 as f64;
        let fy = y - y0 as f64;
        let top = self.get(x0, y0) * (1.0 - fx) + self.get(x1, y0) * fx;
        let bottom = self.get(x0, y1) * (1.0 - fx) + self.get(x1, y1) * fx;
        top * (1.0 - fy) + bottom * fy
    }

    /// Element-wise product, used for squared and cross terms.
    pub(crate) fn multiply(&self, other: &Plane) -> Plane {
        Plane {
            width: self.width,
            height: self.height,
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(a, b)| a * b)
                .collect(),
        }
    }

}

/// Round to nearest and clamp into `0..=255`.
#[inline]
pub(crate) fn saturate_u8(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Summed-area table giving O(1) sums over any axis-aligned window.
pub(crate) struct IntegralImage {
    stride: usize,
    sums: Vec<f64>,
}

impl IntegralImage {
    pub(crate) fn new(plane: &Plane) -> Self {
        let stride = plane.width + 1;
        let mut sums = vec![0.0; stride * (plane.height + 1)];
        for y in 0..plane.height {
            let mut row_sum = 0.0;
            for x in 0..plane.width {
                row_sum += plane.get(x, y);
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row_sum;
            }
        }
        Self { stride, sums }
    }

    /// Sum over `x0..x1` × `y0..y1` (exclusive ends).
    #[inline]
    pub(crate) fn sum(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> f64 {
        let s = self.stride;
        self.sums[y1 * s + x1] - self.sums[y0 * s + x1] - self.sums[y1 * s + x0]
            + self.sums[y0 * s + x0]
    }

    /// Sum over a square window of `radius` around `(x, y)`, clipped to the
    /// image bounds, together with the number of pixels summed.
    #[inline]
    pub(crate) fn window_sum(
        &self,
        x: usize,
        y: usize,
        radius: usize,
        width: usize,
        height: usize,
    ) -> (f64, usize) {
        let x0 = x.saturating_sub(radius);
        let y0 = y.saturating_sub(radius);
        let x1 = (x + radius + 1).min(width);
        let y1 = (y + radius + 1).min(height);
        (self.sum(x0, y0, x1, y1), (x1 - x0) * (y1 - y0))
    }
}

/// BT.601 luma (`0.299 R + 0.587 G + 0.114 B`), rounded.
pub fn to_grayscale(image: &RgbImage) -> GrayImage {
    let data = image
        .as_raw()
        .chunks_exact(3)
        .map(|pixel| {
            saturate_u8(
                0.299 * f64::from(pixel[0]) + 0.587 * f64::from(pixel[1])
                    + 0.114 * f64::from(pixel[2]),
            )
        })
        .collect();
    GrayImage::from_raw(image.width(), image.height(), data)
        .unwrap_or_else(|| GrayImage::new(image.width(), image.height()))
}

/// Dimensions that fit `width × height` inside `bound` on the larger side,
/// preserving aspect ratio. Images already within the bound are unchanged.
pub fn fit_within(width: u32, height: u32, bound: u32) -> (u32, u32) {
    let larger = width.max(height);
    if larger <= bound || larger == 0 {
        return (width, height);
    }
    let scale = f64::from(bound) / f64::from(larger);
    let scaled = |side: u32| ((f64::from(side) * scale).round() as u32).max(1);
    (scaled(width), scaled(height))
}

/// Bilinear resize of a grayscale image.
pub(crate) fn resize_gray(image: &GrayImage, width: u32, height: u32) -> GrayImage {
    if image.width() == width && image.height() == height {
        return image.clone();
    }
    image::imageops::resize(image, width, height, FilterType::Triangle)
}

/// Mean absolute difference of two same-sized grayscale images.
pub(crate) fn mean_abs_difference(a: &GrayImage, b: &GrayImage) -> Option<f64> {
    if a.dimensions() != b.dimensions() || a.as_raw().is_empty() {
        return None;
    }
    let total: u64 = a
        .as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(&p, &q)| u64::from(p.abs_diff(q)))
        .sum();
    Some(total as f64 / a.as_raw().len() as f64)
}
