//! Multi-pass tiled upscale processor
//!
//! [`UpscaleProcessor`] repeats one tiling pass per doubling. Within a pass
//! tiles are extracted and run through the shared [`InferenceEngine`] on the
//! blocking thread pool, at most `workers` at a time. Results are stitched
//! into the pass canvas by the controller as they arrive, so canvas writes
//! never race. A pass finishes completely before the next one starts.

use crate::{
    config::{BackendType, OutputFormat, UpscaleConfig},
    error::{Result, UpscaleError},
    inference::{InferenceEngine, UpscaleBackend},
    models::{LoadProgress, NoOpLoadProgress},
    services::{
        ImageIOService, NoOpProgressReporter, ProcessingStage, ProgressReporter, ProgressTracker,
        TileProgress,
    },
    tiling::{extract_chunk, reconstruct_alpha, stitch_rgb, TileDescriptor, TileScheduler},
    types::{ProcessingTimings, UpscaleResult},
    utils::ConfigValidator,
};
use futures::stream::{self, StreamExt};
use image::RgbaImage;
use instant::{Duration, Instant};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Factory trait for creating inference backends
pub trait BackendFactory: Send + Sync {
    /// Create an unloaded backend instance of the specified type
    ///
    /// # Errors
    /// - Backend type not available in this build
    fn create_backend(&self, backend_type: BackendType) -> Result<Box<dyn UpscaleBackend>>;

    /// List available backend types
    fn available_backends(&self) -> Vec<BackendType>;
}

/// Backend factory for the backends compiled into this build
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    fn create_backend(&self, backend_type: BackendType) -> Result<Box<dyn UpscaleBackend>> {
        match backend_type {
            #[cfg(feature = "onnx")]
            BackendType::Onnx => Ok(Box::new(crate::backends::OnnxBackend::new())),
            #[cfg(feature = "tract")]
            BackendType::Tract => Ok(Box::new(crate::backends::TractBackend::new())),
            #[allow(unreachable_patterns)]
            other => Err(UpscaleError::invalid_config(format!(
                "{other} backend is not available. Rebuild with the '{other}' feature enabled."
            ))),
        }
    }

    fn available_backends(&self) -> Vec<BackendType> {
        let mut backends = Vec::new();
        #[cfg(feature = "onnx")]
        backends.push(BackendType::Onnx);
        #[cfg(feature = "tract")]
        backends.push(BackendType::Tract);
        backends
    }
}

/// Result of one tile worker
struct TileOutput {
    tile: TileDescriptor,
    chunk: RgbaImage,
    result: RgbaImage,
}

/// Wall-clock split of one pass
#[derive(Debug, Default, Clone, Copy)]
struct PassTimings {
    inference: Duration,
    stitch: Duration,
}

/// Tiled multi-pass upscaler
pub struct UpscaleProcessor {
    config: UpscaleConfig,
    engine: Arc<InferenceEngine>,
    scheduler: TileScheduler,
    reporter: Arc<dyn ProgressReporter>,
}

impl UpscaleProcessor {
    /// Load the configured model with the backends compiled into this build
    ///
    /// # Errors
    /// - Invalid configuration
    /// - `ModelLoad` or `Network` if the engine cannot be created
    pub async fn new(config: UpscaleConfig) -> Result<Self> {
        Self::with_factory(config, &DefaultBackendFactory, &NoOpLoadProgress).await
    }

    /// Load the configured model through a custom backend factory
    ///
    /// # Errors
    /// - Invalid configuration
    /// - `ModelLoad` or `Network` if the engine cannot be created
    pub async fn with_factory(
        config: UpscaleConfig,
        factory: &dyn BackendFactory,
        load_progress: &dyn LoadProgress,
    ) -> Result<Self> {
        config.validate()?;
        let engine = InferenceEngine::load(&config, factory, load_progress).await?;
        Self::with_engine(config, Arc::new(engine))
    }

    /// Create a processor around an engine that is already loaded
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn with_engine(config: UpscaleConfig, engine: Arc<InferenceEngine>) -> Result<Self> {
        config.validate()?;
        let scheduler = TileScheduler::from_config(&config.tiling)?;
        Ok(Self {
            config,
            engine,
            scheduler,
            reporter: Arc::new(NoOpProgressReporter),
        })
    }

    /// Report stage and tile progress to `reporter`
    #[must_use]
    pub fn with_progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    #[must_use]
    pub fn config(&self) -> &UpscaleConfig {
        &self.config
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<InferenceEngine> {
        &self.engine
    }

    /// Upscale by the configured factor
    ///
    /// # Errors
    /// - See [`UpscaleProcessor::upscale`]
    pub async fn upscale_image(&self, image: RgbaImage) -> Result<UpscaleResult> {
        self.upscale(image, self.config.factor.passes()).await
    }

    /// Apply `passes` doubling passes, each consuming the previous output
    ///
    /// The result is `2^passes` times larger in each dimension. Zero passes
    /// return the input unchanged.
    ///
    /// # Errors
    /// - `InvalidConfig` for an empty image or an output too large for `u32`
    /// - `Inference` or `ShapeMismatch` from any tile; the image is abandoned
    pub async fn upscale(&self, image: RgbaImage, passes: u32) -> Result<UpscaleResult> {
        let start = Instant::now();
        let original_dimensions = image.dimensions();
        ConfigValidator::validate_upscale_dimensions(
            original_dimensions.0,
            original_dimensions.1,
            passes,
        )?;

        let mut tracker = ProgressTracker::new(Arc::clone(&self.reporter));
        let mut timings = ProcessingTimings::new();
        let mut current = image;

        for pass in 1..=passes {
            let (width, height) = current.dimensions();
            tracker.report_stage_with_description(
                ProcessingStage::Inference,
                format!("Pass {pass}/{passes}: upscaling {width}x{height}"),
            );

            match self
                .execute_pass(Arc::new(current), pass, passes, &tracker)
                .await
            {
                Ok((canvas, pass_timings)) => {
                    timings.inference_ms += pass_timings.inference.as_millis() as u64;
                    timings.stitch_ms += pass_timings.stitch.as_millis() as u64;
                    current = canvas;
                },
                Err(e) => {
                    tracker.report_error(&e.to_string());
                    return Err(e);
                },
            }
        }

        timings.model_load_ms = self.engine.load_time().as_millis() as u64;
        timings.total_ms = start.elapsed().as_millis() as u64;

        info!(
            from = ?original_dimensions,
            to = ?current.dimensions(),
            passes,
            total_ms = timings.total_ms,
            "Upscale complete"
        );

        Ok(UpscaleResult {
            image: current,
            original_dimensions,
            passes,
            timings,
        })
    }

    /// Run a single doubling pass over `source`
    ///
    /// # Errors
    /// - `InvalidConfig` for an empty image
    /// - `Inference` or `ShapeMismatch` from any tile
    pub async fn run_pass(&self, source: RgbaImage) -> Result<RgbaImage> {
        let tracker = ProgressTracker::new(Arc::clone(&self.reporter));
        let (canvas, _) = self.execute_pass(Arc::new(source), 1, 1, &tracker).await?;
        Ok(canvas)
    }

    #[instrument(
        skip(self, source, tracker),
        fields(width = source.width(), height = source.height(), workers = self.config.workers)
    )]
    async fn execute_pass(
        &self,
        source: Arc<RgbaImage>,
        pass: u32,
        total_passes: u32,
        tracker: &ProgressTracker,
    ) -> Result<(RgbaImage, PassTimings)> {
        let pass_start = Instant::now();
        let (width, height) = source.dimensions();
        let tiles = self.scheduler.schedule(width, height)?;
        let (out_width, out_height) = ConfigValidator::validate_upscale_dimensions(width, height, 1)?;
        let total_tiles = tiles.len();
        debug!(tiles = total_tiles, "Pass scheduled");

        let timeout = self.config.tile_timeout();
        let mut results = stream::iter(tiles)
            .map(|tile| {
                let engine = Arc::clone(&self.engine);
                let source = Arc::clone(&source);
                process_tile(engine, source, tile, timeout)
            })
            .buffer_unordered(self.config.workers.max(1));

        let mut canvas = RgbaImage::new(out_width, out_height);
        let mut timings = PassTimings::default();
        let mut completed = 0;

        while let Some(output) = results.next().await {
            let output = output?;

            let stitch_start = Instant::now();
            stitch_rgb(&output.result, &output.tile, &mut canvas)?;
            reconstruct_alpha(&output.chunk, &output.tile, &mut canvas)?;
            timings.stitch += stitch_start.elapsed();

            completed += 1;
            tracker.report_tile(TileProgress {
                pass,
                total_passes,
                completed_tiles: completed,
                total_tiles,
            });
        }

        timings.inference = pass_start.elapsed().saturating_sub(timings.stitch);
        Ok((canvas, timings))
    }

    /// Decode `input`, upscale it by the configured factor and encode the
    /// result to `output`
    ///
    /// The output format is the configured override, else the one implied
    /// by `output`'s extension, else PNG. Nothing is written unless the
    /// upscale succeeds, and a partially written file is removed.
    ///
    /// # Errors
    /// - Decode, inference and encode failures
    pub async fn upscale_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input: P,
        output: Q,
    ) -> Result<UpscaleResult> {
        let (input, output) = (input.as_ref(), output.as_ref());
        let start = Instant::now();
        let mut tracker = ProgressTracker::new(Arc::clone(&self.reporter));

        tracker.report_stage(ProcessingStage::ImageLoading);
        let decode_start = Instant::now();
        let image = ImageIOService::load_image(input)?;
        let image_decode_ms = decode_start.elapsed().as_millis() as u64;

        let mut result = self.upscale_image(image).await?;

        tracker.report_stage(ProcessingStage::FileSaving);
        let encode_start = Instant::now();
        let format = self.output_format_for(output);
        if let Err(e) =
            ImageIOService::save_image(&result.image, output, format, self.config.jpeg_quality)
        {
            if output.exists() {
                if let Err(cleanup_err) = std::fs::remove_file(output) {
                    tracing::warn!("Failed to remove partial output: {}", cleanup_err);
                }
            }
            tracker.report_error(&e.to_string());
            return Err(e);
        }

        result.timings.image_decode_ms = image_decode_ms;
        result.timings.image_encode_ms = encode_start.elapsed().as_millis() as u64;
        result.timings.total_ms = start.elapsed().as_millis() as u64;
        tracker.report_stage(ProcessingStage::Completed);
        tracker.report_completion(result.timings.clone());

        info!(
            input = %input.display(),
            output = %output.display(),
            "Saved upscaled image"
        );
        Ok(result)
    }

    /// Output format used when writing to `output`
    #[must_use]
    pub fn output_format_for(&self, output: &Path) -> OutputFormat {
        self.config
            .output_format
            .or_else(|| OutputFormat::from_path(output))
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for UpscaleProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpscaleProcessor")
            .field("engine", &self.engine)
            .field("scheduler", &self.scheduler)
            .field("workers", &self.config.workers)
            .finish_non_exhaustive()
    }
}

/// Extract and infer one tile on the blocking pool
async fn process_tile(
    engine: Arc<InferenceEngine>,
    source: Arc<RgbaImage>,
    tile: TileDescriptor,
    timeout: Option<Duration>,
) -> Result<TileOutput> {
    let (row, column) = (tile.row, tile.column);
    let task = tokio::task::spawn_blocking(move || {
        let chunk = extract_chunk(&source, tile.input_region)?;
        let result = engine.infer(&chunk)?;
        Ok::<_, UpscaleError>(TileOutput {
            tile,
            chunk,
            result,
        })
    });

    let joined = match timeout {
        Some(limit) => tokio::time::timeout(limit, task).await.map_err(|_| {
            UpscaleError::inference(format!(
                "Tile ({row}, {column}) timed out after {}ms",
                limit.as_millis()
            ))
        })?,
        None => task.await,
    };

    joined
        .map_err(|e| UpscaleError::internal(format!("Tile ({row}, {column}) task failed: {e}")))?
        .map_err(|e| match e {
            UpscaleError::Inference(msg) => {
                UpscaleError::inference(format!("Tile ({row}, {column}): {msg}"))
            },
            other => other,
        })
}
