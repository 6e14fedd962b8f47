//! Dense optical flow between two grayscale frames.
//!
//! A coarse-to-fine, iterative Lucas–Kanade solver evaluated at every pixel.
//! Each pyramid level halves the resolution; at each level the second frame
//! is warped by the current flow estimate and the residual motion is solved
//! from windowed gradient sums. The window sums come from integral images,
//! so cost per level is linear in the pixel count regardless of window size.

use image::GrayImage;

use crate::imaging::{Border, IntegralImage, Plane};

/// Parameters of the flow solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct FlowParameters {
    /// Pyramid levels including the full-resolution image.
    pub(crate) levels: usize,
    /// Side of the square averaging window.
    pub(crate) window_size: usize,
    /// Refinement passes per level.
    pub(crate) iterations: usize,
}

impl Default for FlowParameters {
    fn default() -> Self {
        Self {
            levels: 3,
            window_size: 15,
            iterations: 3,
        }
    }
}

/// Levels smaller than this on either side are not built.
const MIN_LEVEL_SIDE: usize = 8;
/// Structure tensors with a smaller determinant are treated as flat.
const MIN_DETERMINANT: f64 = 1e-6;

/// Per-pixel flow field.
#[derive(Debug, Clone)]
pub(crate) struct FlowField {
    pub(crate) dx: Plane,
    pub(crate) dy: Plane,
}

impl FlowField {
    fn zero(width: usize, height: usize) -> Self {
        Self {
            dx: Plane::new(width, height),
            dy: Plane::new(width, height),
        }
    }

    /// Mean length of the flow vectors.
    pub(crate) fn mean_magnitude(&self) -> f64 {
        if self.dx.data.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .dx
            .data
            .iter()
            .zip(&self.dy.data)
            .map(|(u, v)| u.hypot(*v))
            .sum();
        total / self.dx.data.len() as f64
    }

    /// Upsample to the next finer level, doubling the vectors.
    fn upscale(&self, width: usize, height: usize) -> Self {
        let mut finer = Self::zero(width, height);
        let scale_x = self.dx.width as f64 / width as f64;
        let scale_y = self.dx.height as f64 / height as f64;
        for y in 0..height {
            for x in 0..width {
                let sx = (x as f64 + 0.5) * scale_x - 0.5;
                let sy = (y as f64 + 0.5) * scale_y - 0.5;
                let i = y * width + x;
                finer.dx.data[i] = 2.0 * self.dx.sample_bilinear(sx, sy);
                finer.dy.data[i] = 2.0 * self.dy.sample_bilinear(sx, sy);
            }
        }
        finer
    }
}

/// Halve a plane with 2×2 averaging.
fn downsample(plane: &Plane) -> Plane {
    let width = plane.width / 2;
    let height = plane.height / 2;
    let mut output = Plane::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let (sx, sy) = (2 * x, 2 * y);
            output.data[y * width + x] = (plane.get(sx, sy)
                + plane.get(sx + 1, sy)
                + plane.get(sx, sy + 1)
                + plane.get(sx + 1, sy + 1))
                / 4.0;
        }
    }
    output
}

fn build_pyramid(base: Plane, levels: usize) -> Vec<Plane> {
    let mut pyramid = vec![base];
    while pyramid.len() < levels {
        let Some(last) = pyramid.last() else { break };
        if last.width / 2 < MIN_LEVEL_SIDE || last.height / 2 < MIN_LEVEL_SIDE {
            break;
        }
        let next = downsample(last);
        pyramid.push(next);
    }
    pyramid
}

/// Central-difference gradients with replicated borders.
fn gradients(plane: &Plane) -> (Plane, Plane) {
    let mut gx = Plane::new(plane.width, plane.height);
    let mut gy = Plane::new(plane.width, plane.height);
    for y in 0..plane.height {
        for x in 0..plane.width {
            let (xi, yi) = (x as isize, y as isize);
            let i = y * plane.width + x;
            gx.data[i] = (plane.get_border(xi + 1, yi, Border::Replicate)
                - plane.get_border(xi - 1, yi, Border::Replicate))
                / 2.0;
            gy.data[i] = (plane.get_border(xi, yi + 1, Border::Replicate)
                - plane.get_border(xi, yi - 1, Border::Replicate))
                / 2.0;
        }
    }
    (gx, gy)
}

/// Refine `flow` at one pyramid level.
fn refine_level(
    previous: &Plane,
    current: &Plane,
    flow: &mut FlowField,
    parameters: &FlowParameters,
) {
    let (width, height) = (previous.width, previous.height);
    let radius = parameters.window_size / 2;
    let (gx, gy) = gradients(previous);

    let sum_xx = IntegralImage::new(&gx.multiply(&gx));
    let sum_xy = IntegralImage::new(&gx.multiply(&gy));
    let sum_yy = IntegralImage::new(&gy.multiply(&gy));

    for _ in 0..parameters.iterations {
        // Temporal difference after warping the current frame by the flow.
        let mut temporal = Plane::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let i = y * width + x;
                let warped = current
                    .sample_bilinear(x as f64 + flow.dx.data[i], y as f64 + flow.dy.data[i]);
                temporal.data[i] = warped - previous.data[i];
            }
        }
        let sum_xt = IntegralImage::new(&gx.multiply(&temporal));
        let sum_yt = IntegralImage::new(&gy.multiply(&temporal));

        for y in 0..height {
            for x in 0..width {
                let (a, _) = sum_xx.window_sum(x, y, radius, width, height);
                let (b, _) = sum_xy.window_sum(x, y, radius, width, height);
                let (c, _) = sum_yy.window_sum(x, y, radius, width, height);
                let (p, _) = sum_xt.window_sum(x, y, radius, width, height);
                let (q, _) = sum_yt.window_sum(x, y, radius, width, height);
                let determinant = a * c - b * b;
                if determinant.abs() < MIN_DETERMINANT {
                    continue;
                }
                let i = y * width + x;
                flow.dx.data[i] += (-c * p + b * q) / determinant;
                flow.dy.data[i] += (b * p - a * q) / determinant;
            }
        }
    }
}

/// Dense flow from `previous` to `current`. Returns `None` when the frames
/// differ in size or are too small to hold a single window.
pub(crate) fn dense_flow(
    previous: &GrayImage,
    current: &GrayImage,
    parameters: &FlowParameters,
) -> Option<FlowField> {
    if previous.dimensions() != current.dimensions()
        || previous.width() < 2
        || previous.height() < 2
        || parameters.window_size == 0
    {
        return None;
    }

    let levels = parameters.levels.max(1);
    let previous_pyramid = build_pyramid(Plane::from_gray(previous), levels);
    let current_pyramid = build_pyramid(Plane::from_gray(current), previous_pyramid.len());

    let mut flow: Option<FlowField> = None;
    for (previous_level, current_level) in previous_pyramid.iter().zip(&current_pyramid).rev() {
        let (width, height) = (previous_level.width, previous_level.height);
        let mut level_flow = match flow.take() {
            Some(coarser) => coarser.upscale(width, height),
            None => FlowField::zero(width, height),
        };
        refine_level(previous_level, current_level, &mut level_flow, parameters);
        flow = Some(level_flow);
    }

    flow.filter(|field| {
        field
            .dx
            .data
            .iter()
            .chain(&field.dy.data)
            .all(|value| value.is_finite())
    })
}

/// Motion score: mean flow magnitude scaled by 10, or `None` if the flow
/// cannot be computed.
pub fn motion_score(previous: &GrayImage, current: &GrayImage) -> Option<f64> {
    dense_flow(previous, current, &FlowParameters::default())
        .map(|field| field.mean_magnitude() * 10.0)
}
