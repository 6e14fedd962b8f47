//! Benchmarks for the analysis kernels and the end-to-end pipeline.
//!
//! Run with: cargo bench
//! Run with all features: cargo bench --all-features
//!
//! The kernel benchmarks use synthetic frames. The pipeline benchmark
//! requires fixture files from `tests/fixtures/generate_fixtures.sh`.

use std::{hint::black_box, path::Path, time::Duration};

use criterion::Criterion;
use image::{GrayImage, Luma, Rgb, RgbImage};
use keyframer::{
    ClarityReport, ExtractionConfig, FfmpegLogLevel, KeyframeExtractor, edges, enhance_frame,
    histogram::HueSaturationHistogram, imaging, optical_flow, similarity,
};

const SAMPLE_VIDEO: &str = "tests/fixtures/sample_video.mp4";

/// 480 × 270, the analysis size of a 16:9 video at the default bound.
const WIDTH: u32 = 480;
const HEIGHT: u32 = 270;

fn textured_frame(shift: u32) -> RgbImage {
    RgbImage::from_fn(WIDTH, HEIGHT, |x, y| {
        let u = x + shift;
        Rgb([
            ((u * 3 + y) % 256) as u8,
            ((u / 4 + y * 2) % 256) as u8,
            (((u ^ y) * 5) % 256) as u8,
        ])
    })
}

fn gray_frame(shift: u32) -> GrayImage {
    GrayImage::from_fn(WIDTH, HEIGHT, |x, y| {
        let fx = f64::from(x + shift);
        let fy = f64::from(y);
        Luma([(128.0 + 60.0 * (fx / 9.0).sin() + 50.0 * (fy / 7.0).cos()) as u8])
    })
}

fn benchmark_signal_kernels(criterion: &mut Criterion) {
    let previous = gray_frame(0);
    let current = gray_frame(2);

    criterion.bench_function("optical flow motion score 480x270", |bencher| {
        bencher.iter(|| optical_flow::motion_score(black_box(&previous), black_box(&current)));
    });

    criterion.bench_function("canny edge map 480x270", |bencher| {
        bencher.iter(|| {
            edges::canny(
                black_box(&current),
                edges::LOW_THRESHOLD,
                edges::HIGH_THRESHOLD,
            )
        });
    });

    criterion.bench_function("edge score 480x270", |bencher| {
        bencher.iter(|| edges::edge_score(black_box(&previous), black_box(&current)));
    });

    criterion.bench_function("structural similarity 480x270", |bencher| {
        bencher.iter(|| {
            similarity::structural_similarity(black_box(&previous), black_box(&current))
        });
    });

    let first = textured_frame(0);
    let second = textured_frame(5);
    criterion.bench_function("hue-saturation histogram chi-square", |bencher| {
        bencher.iter(|| {
            let a = HueSaturationHistogram::from_image(black_box(&first));
            let b = HueSaturationHistogram::from_image(black_box(&second));
            a.chi_square(&b)
        });
    });

    criterion.bench_function("grayscale conversion 480x270", |bencher| {
        bencher.iter(|| imaging::to_grayscale(black_box(&first)));
    });
}

fn benchmark_enhancement(criterion: &mut Criterion) {
    let frame = textured_frame(0);
    let dark = RgbImage::from_fn(WIDTH, HEIGHT, |x, y| {
        Rgb([(10 + (x + y) % 20) as u8, (12 + x % 15) as u8, (8 + y % 25) as u8])
    });

    criterion.bench_function("clarity report 480x270", |bencher| {
        bencher.iter(|| ClarityReport::measure(black_box(&frame)));
    });

    criterion.bench_function("enhance frame 480x270", |bencher| {
        bencher.iter(|| enhance_frame(black_box(&frame)));
    });

    criterion.bench_function("enhance dark frame 480x270", |bencher| {
        bencher.iter(|| enhance_frame(black_box(&dark)));
    });
}

fn benchmark_pipeline(criterion: &mut Criterion) {
    keyframer::set_ffmpeg_log_level(FfmpegLogLevel::Error);

    if !Path::new(SAMPLE_VIDEO).exists() {
        eprintln!("Skipping benchmark: fixture not found");
        return;
    }

    let mut group = criterion.benchmark_group("pipeline");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(20));

    let extractor = KeyframeExtractor::new(ExtractionConfig::default());
    group.bench_function("extract keyframes (default config)", |bencher| {
        bencher.iter(|| extractor.try_extract(SAMPLE_VIDEO).unwrap());
    });

    let without_dedup =
        KeyframeExtractor::new(ExtractionConfig::default().with_deduplication(false));
    group.bench_function("extract keyframes (no deduplication)", |bencher| {
        bencher.iter(|| without_dedup.try_extract(SAMPLE_VIDEO).unwrap());
    });

    group.finish();
}

criterion::criterion_group!(
    benches,
    benchmark_signal_kernels,
    benchmark_enhancement,
    benchmark_pipeline,
);
criterion::criterion_main!(benches);
