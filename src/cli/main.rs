//! Super-resolution upscaling CLI tool
//!
//! Command-line interface for upscaling images with a tiled ONNX model.

use super::config::CliConfigBuilder;
use crate::{
    batch::{plan_jobs, process_batch, BatchItemOutcome, BatchJob},
    cache::{format_size, ModelCache, CACHE_DIR_ENV},
    config::UpscaleConfig,
    download::ModelDownloader,
    models::{LoadProgress, ModelSource},
    processor::{DefaultBackendFactory, UpscaleProcessor},
    services::{ImageIOService, ProcessingStage, ProgressReporter, ProgressUpdate, TileProgress},
    tracing_config::{init_cli_tracing, spans},
    types::ProcessingTimings,
    utils::ExecutionProviderManager,
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn, Instrument};

/// Super-resolution image upscaler
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "imgly-upscale")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Input image files or directories
    #[arg(value_name = "INPUT", required_unless_present_any = &["show_providers", "only_download", "list_models", "clear_cache", "show_cache_dir"])]
    pub input: Vec<PathBuf>,

    /// Output file (single input) or directory (batch processing)
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Overall scale factor: 2, 4 or 8 [default: 2]
    #[arg(short, long)]
    pub scale: Option<u32>,

    /// Output format [default: same as input]
    #[arg(short, long, value_enum)]
    pub format: Option<CliOutputFormat>,

    /// Execution provider in format backend:provider (e.g., onnx:auto, onnx:coreml, tract:cpu) [default: onnx:auto]
    #[arg(short, long)]
    pub execution_provider: Option<String>,

    /// Model file path or http(s) URL
    #[arg(short, long)]
    pub model: Option<String>,

    /// Model tensor layout: nchw-unit, nhwc-unit or nchw-byte [default: nchw-unit]
    #[arg(long)]
    pub layout: Option<String>,

    /// Tile edge length in source pixels [default: 1024]
    #[arg(long)]
    pub chunk_size: Option<u32>,

    /// Context margin around each tile in source pixels [default: 32]
    #[arg(long)]
    pub pad_size: Option<u32>,

    /// Tiles processed concurrently within a pass [default: 1]
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Inference sessions held by the ONNX backend [default: 1]
    #[arg(long)]
    pub sessions: Option<usize>,

    /// Per-tile inference deadline in milliseconds
    #[arg(long)]
    pub tile_timeout_ms: Option<u64>,

    /// JPEG quality (0-100) [default: 90]
    #[arg(long)]
    pub jpeg_quality: Option<u8>,

    /// Number of inference threads (0 = auto-detect)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// JSON configuration file; command-line flags take precedence
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Process directories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// File name pattern for directory inputs (e.g., "*.jpg")
    #[arg(long)]
    pub pattern: Option<String>,

    /// Show execution provider diagnostics and exit
    #[arg(long)]
    pub show_providers: bool,

    /// Download the model given with --model into the cache and exit
    #[arg(long)]
    pub only_download: bool,

    /// List cached models and exit
    #[arg(long)]
    pub list_models: bool,

    /// Clear cached models (combine with --model to clear one URL)
    #[arg(long)]
    pub clear_cache: bool,

    /// Show current cache directory
    #[arg(long)]
    pub show_cache_dir: bool,

    /// Use custom cache directory
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<String>,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum CliOutputFormat {
    Png,
    Jpeg,
    Webp,
    Tiff,
    Bmp,
}

/// Run the CLI
///
/// # Errors
/// - Invalid arguments or configuration
/// - Model load failure
/// - Any image in the batch failed
pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    let session_id = uuid::Uuid::new_v4().to_string();
    let _tracing_guard =
        init_cli_tracing(cli.verbose, &session_id).context("Failed to initialize tracing")?;

    if cli.show_providers {
        show_provider_diagnostics();
        return Ok(());
    }

    if cli.list_models {
        return list_cached_models(&cli);
    }

    if cli.only_download {
        return download_model_only(&cli).await;
    }

    if cli.clear_cache {
        return clear_cache_models(&cli);
    }

    if cli.show_cache_dir {
        return show_current_cache_dir(&cli);
    }

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;
    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;
    let Some(model) = config.model.clone() else {
        anyhow::bail!("No model specified. Use --model with a model path or URL, or set it in --config");
    };

    let files = collect_input_files(&cli)?;
    if files.is_empty() {
        warn!("No supported image files found in the provided inputs");
        return Ok(());
    }
    let jobs = resolve_jobs(&cli, &config, &files)?;

    let provider =
        ExecutionProviderManager::provider_to_string(config.backend, config.execution_provider);
    let model_name = model.source.display_name();
    let session_span = spans::session(&session_id, &model_name, &provider);

    async move {
        info!(
            factor = %config.factor,
            workers = config.workers,
            chunk_size = config.tiling.chunk_size,
            pad_size = config.tiling.pad_size,
            "Upscaling {} image(s)",
            jobs.len()
        );

        let processor = load_processor(config, &model_name, &provider).await?;
        let processor = if jobs.len() == 1 {
            processor.with_progress_reporter(Arc::new(TileProgressBar::new(cli.verbose > 0)))
        } else {
            processor
        };

        run_jobs(&processor, &jobs).await
    }
    .instrument(session_span)
    .await
}

/// Load the engine while showing a download/initialization bar
async fn load_processor(
    config: UpscaleConfig,
    model_name: &str,
    provider: &str,
) -> Result<UpscaleProcessor> {
    let load_progress = LoadProgressBar::new(model_name);
    let processor =
        UpscaleProcessor::with_factory(config, &DefaultBackendFactory, &load_progress)
            .instrument(spans::model_loading(model_name, provider))
            .await
            .context("Failed to load model")?;
    load_progress.finish();

    info!(
        backend = processor.engine().backend_name(),
        load_ms = processor.engine().load_time().as_millis() as u64,
        "Model ready"
    );
    Ok(processor)
}

async fn run_jobs(processor: &UpscaleProcessor, jobs: &[BatchJob]) -> Result<()> {
    let batch_bar = (jobs.len() > 1).then(|| {
        let pb = ProgressBar::new(jobs.len() as u64);
        pb.set_style(bar_style(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        ));
        pb
    });

    let span = spans::batch_processing(jobs.len(), processor.config().factor.multiplier());
    let summary = process_batch(processor, jobs, |outcome| {
        match outcome {
            BatchItemOutcome::Succeeded { job, dimensions } => {
                debug!(
                    "Wrote {} ({}x{})",
                    job.output.display(),
                    dimensions.0,
                    dimensions.1
                );
                if jobs.len() == 1 {
                    info!("Saved {}", job.output.display());
                }
            },
            BatchItemOutcome::Failed { job, error } => {
                error!("Failed to process {}: {}", job.input.display(), error);
            },
        }
        if let Some(pb) = &batch_bar {
            pb.inc(1);
        }
    })
    .instrument(span)
    .await
    .context("Batch aborted")?;

    if let Some(pb) = batch_bar {
        pb.finish_with_message(format!(
            "Completed! Processed: {}, Failed: {}",
            summary.processed,
            summary.failed.len()
        ));
    }

    if summary.total() > 1 {
        info!("Batch processing summary:");
        info!("  Files processed: {}", summary.processed);
        info!("  Files failed: {}", summary.failed.len());
        info!("  Total time: {:.2}s", summary.total_time.as_secs_f64());
    }

    if !summary.is_success() {
        anyhow::bail!(
            "{} of {} image(s) failed to process",
            summary.failed.len(),
            summary.total()
        );
    }
    Ok(())
}

fn bar_style(template: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

/// Model load progress rendered as a percentage bar
struct LoadProgressBar {
    bar: ProgressBar,
}

impl LoadProgressBar {
    fn new(model_name: &str) -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(bar_style("{msg} [{bar:40.cyan/blue}] {percent}%"));
        bar.set_message(format!("Loading {model_name}"));
        Self { bar }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl LoadProgress for LoadProgressBar {
    fn on_progress(&self, fraction: f32) {
        self.bar.set_position((fraction * 100.0).round() as u64);
    }
}

/// Per-tile progress bar for single-image runs
struct TileProgressBar {
    bar: ProgressBar,
    verbose: bool,
}

impl TileProgressBar {
    fn new(verbose: bool) -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(bar_style(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} tiles {msg}",
        ));
        Self { bar, verbose }
    }
}

impl ProgressReporter for TileProgressBar {
    fn report_progress(&self, update: ProgressUpdate) {
        debug!("[{}%] {}", update.progress, update.description);
        self.bar.set_message(update.description);
    }

    fn report_completion(&self, timings: ProcessingTimings) {
        self.bar.finish_and_clear();
        info!("Upscale completed in {}ms", timings.total_ms);

        if self.verbose {
            let breakdown = timings.breakdown_percentages();
            debug!(
                "  Decode: {}ms ({:.1}%)",
                timings.image_decode_ms, breakdown.decode_pct
            );
            debug!(
                "  Inference: {}ms ({:.1}%)",
                timings.inference_ms, breakdown.inference_pct
            );
            debug!(
                "  Stitching: {}ms ({:.1}%)",
                timings.stitch_ms, breakdown.stitch_pct
            );
            debug!(
                "  Encode: {}ms ({:.1}%)",
                timings.image_encode_ms, breakdown.encode_pct
            );
        }
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        self.bar.abandon();
        debug!("Error during {}: {}", stage.description(), error);
    }

    fn report_tile_progress(&self, progress: TileProgress) {
        self.bar.set_length(progress.total_tiles as u64);
        self.bar.set_position(progress.completed_tiles as u64);
        if let Some(message) = tile_message(&progress) {
            self.bar.set_message(message);
        }
    }
}

/// Pass counter plus overall completion, shown only for multi-pass runs
fn tile_message(progress: &TileProgress) -> Option<String> {
    (progress.total_passes > 1).then(|| {
        format!(
            "pass {}/{} ({:.0}% overall)",
            progress.pass,
            progress.total_passes,
            progress.overall_fraction() * 100.0
        )
    })
}

/// Expand the inputs into a sorted list of image files
fn collect_input_files(cli: &Cli) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in &cli.input {
        if path.is_file() {
            if ImageIOService::is_supported_format(path) {
                files.push(path.clone());
            } else {
                warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            files.extend(find_image_files(path, cli.recursive, cli.pattern.as_deref())?);
        } else {
            anyhow::bail!(
                "Input path does not exist or is not accessible: {}",
                path.display()
            );
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

/// Pair each input with its output path
///
/// A single input with `--output` that is not a directory writes exactly
/// there; otherwise `--output` names a directory for generated file names.
fn resolve_jobs(cli: &Cli, config: &UpscaleConfig, files: &[PathBuf]) -> Result<Vec<BatchJob>> {
    if let ([input], Some(output)) = (files, &cli.output) {
        if !output.is_dir() {
            return Ok(vec![BatchJob {
                input: input.clone(),
                output: output.clone(),
            }]);
        }
    }

    let output_dir = match &cli.output {
        Some(dir) if dir.is_file() => anyhow::bail!(
            "Output path exists and is a file, not a directory: {}",
            dir.display()
        ),
        Some(dir) => {
            std::fs::create_dir_all(dir).with_context(|| {
                format!("Failed to create output directory: {}", dir.display())
            })?;
            Some(dir.as_path())
        },
        None => None,
    };

    Ok(plan_jobs(
        files,
        output_dir,
        config.factor,
        config.output_format,
    ))
}

/// Find image files in a directory
fn find_image_files(dir: &Path, recursive: bool, pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    if recursive {
        for entry in walkdir::WalkDir::new(dir) {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type().is_file()
                && ImageIOService::is_supported_format(path)
                && matches_pattern(path, pattern)
            {
                files.push(path.to_path_buf());
            }
        }
    } else {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_file()
                && ImageIOService::is_supported_format(&path)
                && matches_pattern(&path, pattern)
            {
                files.push(path);
            }
        }
    }

    Ok(files)
}

/// Check if the file name matches a glob pattern
fn matches_pattern(path: &Path, pattern: Option<&str>) -> bool {
    match pattern {
        Some(pat) => path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|filename| {
                glob::Pattern::new(pat)
                    .map(|p| p.matches(filename))
                    .unwrap_or(false)
            }),
        None => true,
    }
}

fn open_cache(cli: &Cli) -> Result<ModelCache> {
    ModelCache::new(cli.cache_dir.as_deref().map(Path::new)).context("Failed to open model cache")
}

/// Display backend and execution provider diagnostics
fn show_provider_diagnostics() {
    println!("Backend and Execution Provider Diagnostics");
    println!("==========================================");

    let cpu_count = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1);
    println!("System: {cpu_count} CPU cores detected");

    println!("\nAvailable Backends:");
    println!("  onnx: ONNX Runtime backend (default), hardware acceleration support");
    println!("  tract: Pure Rust backend, no external dependencies");

    println!("\nExecution Providers:");
    for provider_info in ExecutionProviderManager::list_all_providers() {
        let status = if provider_info.available {
            "available"
        } else {
            "not available"
        };
        println!(
            "  {}: {} - {}",
            provider_info.name, status, provider_info.description
        );
    }

    println!("\nUsage Examples:");
    println!("  --execution-provider onnx:auto    # Auto-select best ONNX provider (default)");
    println!("  --execution-provider onnx:coreml  # Use Apple CoreML (macOS)");
    println!("  --execution-provider onnx:cuda    # Use NVIDIA CUDA");
    println!("  --execution-provider onnx:cpu     # Force ONNX CPU execution");
    println!("  --execution-provider tract:cpu    # Use pure Rust Tract backend");
    println!("\nWith --workers N and --sessions N, up to N tiles run on ONNX at once.");
}

fn list_cached_models(cli: &Cli) -> Result<()> {
    let cache = open_cache(cli)?;
    let models = cache
        .scan_cached_models()
        .context("Failed to list cached models")?;

    println!("Cached Models ({})", cache.cache_dir().display());
    if models.is_empty() {
        println!("No cached models found.");
        println!("\nTo download a model, use:");
        println!("  imgly-upscale --only-download --model https://example.com/model.onnx");
        return Ok(());
    }

    for model in models {
        println!("  {}  {}", model.model_id, format_size(model.size_bytes));
        println!("    {}", model.path.display());
    }
    Ok(())
}

async fn download_model_only(cli: &Cli) -> Result<()> {
    let url = match cli.model.as_deref().map(ModelSource::parse) {
        Some(ModelSource::Url(url)) => url,
        _ => anyhow::bail!("--only-download requires --model with an http(s) URL"),
    };

    let downloader = ModelDownloader::new(open_cache(cli)?)?;
    let progress = LoadProgressBar::new(&url);
    let path = downloader
        .download(&url, None, &progress)
        .await
        .with_context(|| format!("Failed to download {url}"))?;
    progress.finish();

    println!("Model cached at {}", path.display());
    Ok(())
}

fn clear_cache_models(cli: &Cli) -> Result<()> {
    let cache = open_cache(cli)?;

    if let Some(url) = &cli.model {
        if cache
            .clear_model(url)
            .with_context(|| format!("Failed to clear model '{url}'"))?
        {
            println!("Removed cached model for {url}");
        } else {
            println!("No cached model for {url}");
        }
    } else {
        let removed = cache.clear_all_models().context("Failed to clear cache")?;
        if removed.is_empty() {
            println!("Cache was already empty");
        } else {
            println!("Removed {} model(s):", removed.len());
            for model_id in &removed {
                println!("  {model_id}");
            }
        }
    }
    println!("Cache location: {}", cache.cache_dir().display());
    Ok(())
}

fn show_current_cache_dir(cli: &Cli) -> Result<()> {
    let cache = open_cache(cli)?;
    println!("Current cache directory: {}", cache.cache_dir().display());

    let source = if cli.cache_dir.is_some() {
        "--cache-dir flag"
    } else if std::env::var(CACHE_DIR_ENV).is_ok() {
        "environment variable"
    } else {
        "platform cache directory"
    };
    println!("Source: {source}");
    println!("\nTo use a custom cache directory, pass --cache-dir or set {CACHE_DIR_ENV}");
    Ok(())
}
