use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use keyframer::{
    ExtractOptions, Extraction, ExtractionConfig, FfmpegLogLevel, KeyframeError,
    KeyframeExtractor, OperationType, ProgressCallback, ProgressInfo, VideoMetadata, VideoProbe,
};
use serde_json::{Value, json};

const CLI_AFTER_HELP: &str = "Examples:\n  keyframer probe input.mp4 --json\n  keyframer extract input.mp4 --out keyframes --progress\n  keyframer extract input.mp4 --json --max-frames 8 --disable-deduplication\n  keyframer extract input.mp4 --config settings.json --enable-image-enhancement\n  keyframer completions zsh > _keyframer";

#[derive(Debug, Parser)]
#[command(
    name = "keyframer",
    version,
    about = "Select representative keyframes from a video",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show debug logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress bar for each pipeline stage.
    #[arg(long, global = true)]
    progress: bool,

    /// Allow writing into an existing output directory.
    #[arg(long, global = true)]
    overwrite: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print video metadata (alias: info).
    #[command(
        about = "Print video metadata",
        visible_alias = "info",
        after_help = "Examples:\n  keyframer probe input.mp4\n  keyframer probe a.mp4 b.mkv --json"
    )]
    Probe {
        /// Input video paths.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output metadata as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Extract keyframes.
    #[command(
        about = "Extract keyframes",
        after_help = "Examples:\n  keyframer extract input.mp4 --out keyframes\n  keyframer extract input.mp4 --json --include-images > keyframes.json"
    )]
    Extract(ExtractArgs),

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Args, Clone, Default)]
struct ExtractArgs {
    /// Input video path.
    input: PathBuf,

    /// Output directory for keyframe images.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Print extraction metrics as JSON.
    #[arg(long)]
    json: bool,

    /// Embed each keyframe as a data URI in the JSON output.
    #[arg(long, requires = "json")]
    include_images: bool,

    /// JSON file with extraction settings; flags override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum number of keyframes.
    #[arg(long)]
    max_frames: Option<usize>,

    /// Minimum spacing between keyframes, in seconds.
    #[arg(long)]
    min_time_gap: Option<f64>,

    /// Enhance exposure, contrast and sharpness before encoding.
    #[arg(long)]
    enable_image_enhancement: bool,

    /// Number of candidates deduplication must leave.
    #[arg(long)]
    min_frames_after_dedup: Option<usize>,

    /// Analyse every Nth frame.
    #[arg(long)]
    frame_gap: Option<u64>,

    #[arg(long)]
    motion_weight: Option<f64>,

    #[arg(long)]
    scene_weight: Option<f64>,

    #[arg(long)]
    color_weight: Option<f64>,

    #[arg(long)]
    edge_weight: Option<f64>,

    /// Fraction of high-change frames kept as content candidates.
    #[arg(long)]
    content_frame_bar: Option<f64>,

    /// Force similarity deduplication on.
    #[arg(long, conflicts_with = "disable_deduplication")]
    enable_deduplication: bool,

    /// Skip similarity deduplication.
    #[arg(long)]
    disable_deduplication: bool,

    /// Similarity above which two frames count as duplicates.
    #[arg(long)]
    similarity_threshold: Option<f64>,

    /// Longest edge of the analysis copies, in pixels.
    #[arg(long)]
    maximum_dimension: Option<u32>,
}

fn parse_log_level(value: &str) -> Option<FfmpegLogLevel> {
    value.parse().ok()
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let environment = env_logger::Env::default().default_filter_or(default_filter);
    let _ = env_logger::Builder::from_env(environment)
        .format_timestamp_millis()
        .try_init();
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(global.verbose);

    if let Some(level) = &global.log_level {
        let parsed = parse_log_level(level).ok_or(format!("unsupported --log-level: {level}"))?;
        keyframer::set_ffmpeg_log_level(parsed);
    }

    Ok(())
}

/// Defaults, then the `--config` file, then individual flags.
fn resolve_config(args: &ExtractArgs) -> Result<ExtractionConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => ExtractionConfig::from_json_file(path)?,
        None => ExtractionConfig::default(),
    };

    if let Some(value) = args.max_frames {
        config = config.with_max_frames(value);
    }
    if let Some(value) = args.min_time_gap {
        config = config.with_min_time_gap(value);
    }
    if args.enable_image_enhancement {
        config = config.with_image_enhancement(true);
    }
    if let Some(value) = args.min_frames_after_dedup {
        config = config.with_min_frames_after_dedup(value);
    }
    if let Some(value) = args.frame_gap {
        config = config.with_frame_gap(value);
    }
    if let Some(value) = args.motion_weight {
        config = config.with_motion_weight(value);
    }
    if let Some(value) = args.scene_weight {
        config = config.with_scene_weight(value);
    }
    if let Some(value) = args.color_weight {
        config = config.with_color_weight(value);
    }
    if let Some(value) = args.edge_weight {
        config = config.with_edge_weight(value);
    }
    if let Some(value) = args.content_frame_bar {
        config = config.with_content_frame_bar(value);
    }
    if args.enable_deduplication {
        config = config.with_deduplication(true);
    }
    if args.disable_deduplication {
        config = config.with_deduplication(false);
    }
    if let Some(value) = args.similarity_threshold {
        config = config.with_similarity_threshold(value);
    }
    if let Some(value) = args.maximum_dimension {
        config = config.with_maximum_dimension(value);
    }

    config.validate()?;
    Ok(config)
}

fn prepare_output_directory(
    path: &Path,
    overwrite: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        if !overwrite {
            return Err(format!(
                "output directory already exists: {} (use --overwrite)",
                path.display()
            )
            .into());
        }
        eprintln!(
            "{} {}",
            "warning:".yellow().bold(),
            format!("writing into existing directory {}", path.display()).yellow()
        );
    }
    fs::create_dir_all(path)?;
    Ok(())
}

fn metadata_json(metadata: &VideoMetadata) -> Value {
    json!({
        "total_frames": metadata.total_frames,
        "fps": metadata.fps,
        "width": metadata.width,
        "height": metadata.height,
        "duration": metadata.duration,
        "resolution_quality": metadata.resolution_quality,
        "codec": metadata.codec,
    })
}

fn extraction_json(
    extraction: &Extraction,
    config: &ExtractionConfig,
    include_images: bool,
) -> Result<Value, serde_json::Error> {
    let keyframes: Vec<Value> = extraction
        .keyframes
        .iter()
        .map(|keyframe| {
            let mut entry = json!({
                "frame_index": keyframe.frame_index,
                "timestamp": keyframe.timestamp,
            });
            if include_images {
                entry["image"] = Value::String(keyframe.payload.to_data_uri());
            }
            entry
        })
        .collect();

    Ok(json!({
        "keyframes_count": extraction.keyframes.len(),
        "timestamps": extraction.timestamps(),
        "keyframes": keyframes,
        "video": metadata_json(&extraction.metadata),
        "extraction_params": serde_json::to_value(config)?,
        "report": serde_json::to_value(&extraction.report)?,
        "processing_time": extraction.report.processing_time.as_secs_f64(),
    }))
}

/// One progress bar, re-armed whenever a new stage starts reporting.
struct TerminalProgress {
    bar: ProgressBar,
    stage: Mutex<Option<OperationType>>,
}

impl TerminalProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        let template = "{spinner:.green} {msg:>12} {bar:40.cyan/blue} {pos}/{len}";
        if let Ok(style) = ProgressStyle::with_template(template) {
            bar.set_style(style.progress_chars("##-"));
        }
        Self {
            bar,
            stage: Mutex::new(None),
        }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

fn stage_label(operation: OperationType) -> &'static str {
    match operation {
        OperationType::FrameAnalysis => "analysing",
        OperationType::Deduplication => "deduplicating",
        OperationType::Rendering => "rendering",
        _ => "working",
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Ok(mut stage) = self.stage.lock() {
            if *stage != Some(info.operation) {
                *stage = Some(info.operation);
                self.bar.reset();
                self.bar.set_length(info.total.unwrap_or(0));
                self.bar.set_message(stage_label(info.operation));
            }
        }
        self.bar.set_position(info.current);
    }
}

/// JSON for a probe run: a single object for one input, otherwise an array
/// with one `{path, metadata}` or `{path, error}` entry per input.
fn probe_json(inputs: &[PathBuf], results: &[Result<VideoMetadata, KeyframeError>]) -> Value {
    if let ([_], [Ok(metadata)]) = (inputs, results) {
        return metadata_json(metadata);
    }
    let entries: Vec<Value> = inputs
        .iter()
        .zip(results)
        .map(|(input, result)| match result {
            Ok(metadata) => json!({
                "path": input.display().to_string(),
                "metadata": metadata_json(metadata),
            }),
            Err(error) => json!({
                "path": input.display().to_string(),
                "error": error.to_string(),
            }),
        })
        .collect();
    Value::Array(entries)
}

fn print_metadata(metadata: &VideoMetadata) {
    println!(
        "Video: {}x{} @ {:.2} fps [{}]",
        metadata.width, metadata.height, metadata.fps, metadata.codec
    );
    println!("Frames: {}", metadata.total_frames);
    println!("Duration: {:.2}s", metadata.duration);
    println!("Resolution quality: {:.2}", metadata.resolution_quality);
}

fn run_probe(inputs: &[PathBuf], json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let results = VideoProbe::probe_many(inputs);
    let failures = results.iter().filter(|result| result.is_err()).count();

    if json {
        println!("{}", serde_json::to_string_pretty(&probe_json(inputs, &results))?);
    } else if let ([_], [Ok(metadata)]) = (inputs, results.as_slice()) {
        print_metadata(metadata);
    } else {
        for (input, result) in inputs.iter().zip(&results) {
            println!("{}", input.display().to_string().bold());
            match result {
                Ok(metadata) => print_metadata(metadata),
                Err(error) => println!("{} {error}", "error:".red().bold()),
            }
        }
    }

    match (inputs, results.into_iter().next()) {
        ([_], Some(Err(error))) => Err(error.into()),
        _ if failures > 0 => {
            Err(format!("{failures} of {} files could not be probed", inputs.len()).into())
        }
        _ => Ok(()),
    }
}

fn run_extract(
    args: &ExtractArgs,
    global: &GlobalOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Some(out) = &args.out {
        prepare_output_directory(out, global.overwrite)?;
    }

    let progress = global.progress.then(|| Arc::new(TerminalProgress::new()));
    let mut options = ExtractOptions::new().with_batch_size(10);
    if let Some(progress) = &progress {
        options = options.with_progress(progress.clone());
    }

    let result = KeyframeExtractor::new(config.clone())
        .with_options(options)
        .try_extract(&args.input);
    if let Some(progress) = &progress {
        progress.finish();
    }

    let extraction = match result {
        Ok(extraction) if !extraction.is_empty() => extraction,
        Ok(_) => return Err("Failed to extract keyframes: no frames selected".into()),
        Err(error) => return Err(format!("Failed to extract keyframes: {error}").into()),
    };

    if let Some(out) = &args.out {
        let mut written = 0_usize;
        for keyframe in &extraction.keyframes {
            if keyframe.payload.is_empty() {
                log::warn!("Keyframe {} has no image, not writing it", keyframe.frame_index);
                continue;
            }
            let path = out.join(keyframe.file_name());
            fs::write(&path, &keyframe.payload.bytes)?;
            log::debug!("saved keyframe {} -> {}", keyframe.frame_index, path.display());
            written += 1;
        }
        eprintln!(
            "{} {}",
            "success:".green().bold(),
            format!("Wrote {written} keyframe(s) to {}", out.display()).green()
        );
    }

    if args.json {
        let document = extraction_json(&extraction, &config, args.include_images)?;
        println!("{}", serde_json::to_string_pretty(&document)?);
    } else if args.out.is_none() {
        for keyframe in &extraction.keyframes {
            println!(
                "{} frame {} at {:.3}s",
                "keyframe".cyan().bold(),
                keyframe.frame_index,
                keyframe.timestamp
            );
        }
    }

    eprintln!(
        "{} {}",
        "done:".green().bold(),
        format!(
            "{} keyframes in {:.2}s",
            extraction.keyframes.len(),
            extraction.report.processing_time.as_secs_f64()
        )
        .green()
    );
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Probe { inputs, json } => run_probe(&inputs, json)?,
        Commands::Extract(args) => run_extract(&args, &cli.global)?,
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "keyframer", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}
