#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # IMG.LY Upscale Library
//!
//! Tiled super-resolution upscaling with ONNX Runtime and Tract backends.
//!
//! Super-resolution models accept only bounded input sizes, so every image is
//! cut into overlapping tiles, each tile is doubled by the model, and the
//! results are cropped and stitched back into a seamless canvas. The alpha
//! channel never goes through the model: it is doubled by exact
//! nearest-neighbour duplication. Factors above 2x repeat the whole pass.
//!
//! ## Features
//!
//! - **Exact tiling**: padded tile grid with full coverage for any image size
//! - **Multi-pass**: 2x, 4x and 8x by repeated doubling
//! - **Multiple Backends**: ONNX Runtime (GPU acceleration) and Tract (Pure Rust)
//! - **Worker pool**: tiles of one pass run concurrently on blocking tasks
//! - **Model Management**: models from local paths or downloaded and cached from URLs
//! - **Format Support**: JPEG, PNG, WebP, BMP, TIFF
//! - **CLI Integration**: optional command-line interface (`cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use imgly_upscale::{ModelSource, ModelSpec, UpscaleConfig, UpscaleFactor, UpscaleProcessor};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = UpscaleConfig::builder()
//!     .model(ModelSpec::new(ModelSource::parse("models/x2.onnx")))
//!     .factor(UpscaleFactor::X4)
//!     .workers(2)
//!     .build()?;
//!
//! let processor = UpscaleProcessor::new(config).await?;
//! let result = processor.upscale_file("input.png", "input_4x.png").await?;
//! println!("{:?} -> {:?}", result.original_dimensions, result.dimensions());
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom Backends
//!
//! Any type implementing [`UpscaleBackend`] can drive the tiling engine:
//!
//! ```rust
//! use imgly_upscale::{InferenceEngine, ModelData, Result, UpscaleBackend, UpscaleConfig};
//! use image::{imageops, RgbaImage};
//!
//! struct Nearest;
//!
//! impl UpscaleBackend for Nearest {
//!     fn load(&mut self, _model: &ModelData, _config: &UpscaleConfig) -> Result<()> {
//!         Ok(())
//!     }
//!
//!     fn upscale_chunk(&self, chunk: &RgbaImage) -> Result<RgbaImage> {
//!         let (w, h) = chunk.dimensions();
//!         Ok(imageops::resize(chunk, w * 2, h * 2, imageops::FilterType::Nearest))
//!     }
//!
//!     fn is_initialized(&self) -> bool {
//!         true
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "nearest"
//!     }
//! }
//!
//! let engine = InferenceEngine::from_backend(Box::new(Nearest)).unwrap();
//! let doubled = engine.infer(&RgbaImage::new(3, 2)).unwrap();
//! assert_eq!(doubled.dimensions(), (6, 4));
//! ```
//!
//! ### Feature Flags
//!
//! - `onnx` (default): ONNX Runtime backend with GPU acceleration support
//! - `tract` (default): Pure Rust backend
//! - `cli` (default): Command-line interface, progress bars and tracing setup
//! - `webp-support` (default): WebP image format support
//! - `tracing-json`, `tracing-files`: extra log outputs for the CLI

pub mod backends;
pub mod batch;
pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod inference;
pub mod models;
pub mod processor;
pub mod services;
pub mod tiling;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

// Public API exports
#[cfg(feature = "onnx")]
pub use backends::OnnxBackend;
#[cfg(feature = "tract")]
pub use backends::TractBackend;
pub use batch::{generate_output_path, process_batch, BatchJob, BatchSummary};
pub use cache::{format_size, CachedModelInfo, ModelCache};
pub use config::{
    BackendType, ExecutionProvider, OutputFormat, TilingConfig, UpscaleConfig,
    UpscaleConfigBuilder, UpscaleFactor,
};
pub use download::{validate_model_url, ModelDownloader};
pub use error::{Result, UpscaleError};
pub use inference::{InferenceEngine, UpscaleBackend};
pub use models::{
    LoadProgress, ModelData, ModelLoader, ModelSource, ModelSpec, NoOpLoadProgress, TensorLayout,
};
pub use processor::{BackendFactory, DefaultBackendFactory, UpscaleProcessor};
pub use services::{
    ConsoleProgressReporter, ImageIOService, NoOpProgressReporter, OutputFormatHandler,
    ProcessingStage, ProgressReporter, ProgressTracker, ProgressUpdate, TileProgress,
};
pub use tiling::{Rect, TileDescriptor, TileScheduler};
pub use types::{ProcessingTimings, TimingBreakdown, UpscaleResult};
pub use utils::{ConfigValidator, ExecutionProviderManager, ProviderInfo, TensorValidator};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat, TracingOutput};

/// Upscale an in-memory image with a one-off engine
///
/// Loads the configured model, runs `config.factor` passes and drops the
/// engine. Build an [`UpscaleProcessor`] instead when processing several
/// images.
///
/// # Errors
/// - Invalid configuration or missing model
/// - Model load, inference or shape errors
pub async fn upscale_image(
    image: image::DynamicImage,
    config: &UpscaleConfig,
) -> Result<UpscaleResult> {
    let processor = UpscaleProcessor::new(config.clone()).await?;
    processor.upscale_image(image.to_rgba8()).await
}

/// Upscale encoded image bytes (any supported format)
///
/// # Errors
/// - Bytes cannot be decoded
/// - Same as [`upscale_image`]
pub async fn upscale_from_bytes(bytes: &[u8], config: &UpscaleConfig) -> Result<UpscaleResult> {
    let image = ImageIOService::load_from_bytes(bytes)?;
    upscale_image(image::DynamicImage::ImageRgba8(image), config).await
}
