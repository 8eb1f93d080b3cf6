//! Progress reporting service
//!
//! This module separates progress reporting concerns from the upscale
//! pipeline, allowing different frontends to implement their own progress
//! handling.

use crate::types::ProcessingTimings;
use instant::Instant;
use std::sync::Arc;

/// Progress stages during an upscale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Initializing backend and loading model
    Initialization,
    /// Loading and decoding input image
    ImageLoading,
    /// Running inference on the tiles of a pass
    Inference,
    /// Encoding and writing the result
    FileSaving,
    /// Processing completed
    Completed,
}

impl ProcessingStage {
    /// Get a human-readable description of the processing stage
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Initialization => "Initializing model and backend",
            Self::ImageLoading => "Loading input image",
            Self::Inference => "Upscaling tiles",
            Self::FileSaving => "Saving result",
            Self::Completed => "Processing completed",
        }
    }

    /// Get the typical progress percentage for this stage
    #[must_use]
    pub fn progress_percentage(&self) -> u8 {
        match self {
            Self::Initialization => 5,
            Self::ImageLoading => 10,
            Self::Inference => 60,
            Self::FileSaving => 98,
            Self::Completed => 100,
        }
    }
}

/// Progress update containing stage and timing information
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub stage: ProcessingStage,
    /// Progress percentage (0-100)
    pub progress: u8,
    pub description: String,
    /// Elapsed time since processing started (milliseconds)
    pub elapsed_ms: u64,
}

impl ProgressUpdate {
    #[must_use]
    pub fn new(stage: ProcessingStage, start_time: Instant) -> Self {
        Self::with_description(stage, stage.description().to_string(), start_time)
    }

    /// Create a progress update with custom description
    #[must_use]
    pub fn with_description(
        stage: ProcessingStage,
        description: String,
        start_time: Instant,
    ) -> Self {
        Self {
            progress: stage.progress_percentage(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
            stage,
            description,
        }
    }
}

/// Completion of one tile within a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileProgress {
    /// One-based pass number
    pub pass: u32,
    pub total_passes: u32,
    pub completed_tiles: usize,
    pub total_tiles: usize,
}

impl TileProgress {
    /// Fraction of the whole run completed, in `0.0..=1.0`
    #[must_use]
    pub fn overall_fraction(&self) -> f32 {
        if self.total_passes == 0 || self.total_tiles == 0 {
            return 1.0;
        }
        let pass_fraction = self.completed_tiles as f32 / self.total_tiles as f32;
        ((self.pass.saturating_sub(1) as f32 + pass_fraction) / self.total_passes as f32)
            .clamp(0.0, 1.0)
    }
}

/// Trait for reporting progress during upscale operations
pub trait ProgressReporter: Send + Sync {
    fn report_progress(&self, update: ProgressUpdate);

    /// Report processing completion with final timings
    fn report_completion(&self, timings: ProcessingTimings);

    fn report_error(&self, stage: ProcessingStage, error: &str);

    /// Report a finished tile. Called from the pass controller as tile
    /// results arrive.
    fn report_tile_progress(&self, progress: TileProgress) {
        let _ = progress;
    }
}

/// No-op progress reporter that discards all progress updates
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}

    fn report_completion(&self, _timings: ProcessingTimings) {}

    fn report_error(&self, _stage: ProcessingStage, _error: &str) {}
}

/// Progress reporter that emits tracing events
pub struct ConsoleProgressReporter {
    verbose: bool,
}

impl ConsoleProgressReporter {
    /// `verbose` adds elapsed times and per-tile events
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        if self.verbose {
            tracing::info!(
                "[{}%] {} ({}ms elapsed)",
                update.progress,
                update.description,
                update.elapsed_ms
            );
        } else {
            tracing::info!("[{}%] {}", update.progress, update.description);
        }
    }

    fn report_completion(&self, timings: ProcessingTimings) {
        tracing::info!("Upscale completed in {}ms", timings.total_ms);

        if self.verbose {
            tracing::info!("  Image decode: {}ms", timings.image_decode_ms);
            tracing::info!("  Inference: {}ms", timings.inference_ms);
            tracing::info!("  Stitching: {}ms", timings.stitch_ms);
            tracing::info!("  Image encode: {}ms", timings.image_encode_ms);
        }
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        tracing::error!("Error during {}: {}", stage.description(), error);
    }

    fn report_tile_progress(&self, progress: TileProgress) {
        if self.verbose {
            tracing::debug!(
                pass = progress.pass,
                "Tile {}/{} done",
                progress.completed_tiles,
                progress.total_tiles
            );
        }
    }
}

/// Progress tracker that manages timing and progress reporting for one run
pub struct ProgressTracker {
    reporter: Arc<dyn ProgressReporter>,
    start_time: Instant,
    current_stage: Option<ProcessingStage>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(reporter: Arc<dyn ProgressReporter>) -> Self {
        Self {
            reporter,
            start_time: Instant::now(),
            current_stage: None,
        }
    }

    /// Create a progress tracker with no-op reporter (for testing/disabled progress)
    #[must_use]
    pub fn no_op() -> Self {
        Self::new(Arc::new(NoOpProgressReporter))
    }

    #[must_use]
    pub fn console(verbose: bool) -> Self {
        Self::new(Arc::new(ConsoleProgressReporter::new(verbose)))
    }

    /// Report progress for a specific stage
    pub fn report_stage(&mut self, stage: ProcessingStage) {
        self.current_stage = Some(stage);
        self.reporter
            .report_progress(ProgressUpdate::new(stage, self.start_time));
    }

    pub fn report_stage_with_description(&mut self, stage: ProcessingStage, description: String) {
        self.current_stage = Some(stage);
        self.reporter.report_progress(ProgressUpdate::with_description(
            stage,
            description,
            self.start_time,
        ));
    }

    pub fn report_tile(&self, progress: TileProgress) {
        self.reporter.report_tile_progress(progress);
    }

    pub fn report_completion(&self, timings: ProcessingTimings) {
        self.reporter.report_completion(timings);
    }

    /// Report an error against the current stage
    pub fn report_error(&self, error: &str) {
        let stage = self.current_stage.unwrap_or(ProcessingStage::Initialization);
        self.reporter.report_error(stage, error);
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    #[must_use]
    pub fn current_stage(&self) -> Option<ProcessingStage> {
        self.current_stage
    }
}
