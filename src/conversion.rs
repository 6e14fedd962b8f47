//! Internal conversion helpers.
//!
//! Timestamp arithmetic between FFmpeg time bases, frame indices, and
//! seconds, plus the copy from a padded FFmpeg plane into a tightly packed
//! pixel buffer.

use ffmpeg_next::{Rational, frame::Video as VideoFrame};

/// Copy the first plane of an FFmpeg frame into a tightly packed buffer.
///
/// FFmpeg rows frequently carry padding (stride > width × bytes per pixel);
/// the padding is dropped so the result can go straight into
/// [`image::ImageBuffer::from_raw`].
pub(crate) fn frame_to_buffer(
    video_frame: &VideoFrame,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) -> Vec<u8> {
    pack_rows(
        video_frame.data(0),
        video_frame.stride(0),
        width as usize * bytes_per_pixel,
        height as usize,
    )
}

/// Strip per-row padding from `data`.
fn pack_rows(data: &[u8], stride: usize, row_bytes: usize, rows: usize) -> Vec<u8> {
    if stride == row_bytes {
        return data[..row_bytes * rows].to_vec();
    }
    let mut buffer = Vec::with_capacity(row_bytes * rows);
    for row in 0..rows {
        let start = row * stride;
        buffer.extend_from_slice(&data[start..start + row_bytes]);
    }
    buffer
}

/// Rescale a PTS value from the stream time base to seconds.
pub(crate) fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    pts as f64 * f64::from(time_base.numerator()) / f64::from(time_base.denominator())
}

/// Map a PTS to a zero-based frame index, measured from the stream's first
/// timestamp. Rounds to the nearest frame so NTSC-style rates (30000/1001)
/// do not land one frame early.
pub(crate) fn pts_to_frame_index(
    pts: i64,
    start_pts: i64,
    time_base: Rational,
    frames_per_second: f64,
) -> u64 {
    let seconds = pts_to_seconds(pts.saturating_sub(start_pts), time_base);
    (seconds * frames_per_second).round().max(0.0) as u64
}

/// Convert a frame index to a container-level seek target in
/// `AV_TIME_BASE` units (microseconds), offset by the stream start.
pub(crate) fn frame_index_to_seek_timestamp(
    frame_index: u64,
    frames_per_second: f64,
    start_seconds: f64,
) -> i64 {
    if frames_per_second <= 0.0 {
        return 0;
    }
    let seconds = frame_index as f64 / frames_per_second + start_seconds;
    (seconds * 1_000_000.0) as i64
}
