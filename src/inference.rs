//! Inference backend abstraction and the engine handle
//!
//! An [`UpscaleBackend`] maps an RGBA chunk of `w`x`h` pixels to a chunk of
//! `2w`x`2h` pixels. The [`InferenceEngine`] owns one loaded backend, is
//! shared by reference between tile workers, and checks every result's
//! dimensions before it reaches the stitcher.

use crate::{
    config::UpscaleConfig,
    error::{Result, UpscaleError},
    models::{LoadProgress, ModelData, ModelLoader, MonotonicProgress},
    processor::BackendFactory,
};
use image::RgbaImage;
use instant::{Duration, Instant};

/// Share of the load progress given to fetching model bytes; the rest
/// covers building the backend
const FETCH_PROGRESS_SHARE: f32 = 0.9;

/// Trait for super-resolution inference backends
pub trait UpscaleBackend: Send + Sync {
    /// Build the backend from model bytes
    ///
    /// # Errors
    /// - Model cannot be parsed or compiled
    /// - Execution provider setup failures
    fn load(&mut self, model: &ModelData, config: &UpscaleConfig) -> Result<()>;

    /// Upscale one RGBA chunk by a factor of two in each dimension
    ///
    /// The alpha channel of the result is not used.
    ///
    /// # Errors
    /// - Backend not loaded
    /// - Model inference failures
    fn upscale_chunk(&self, chunk: &RgbaImage) -> Result<RgbaImage>;

    /// Check if backend is loaded
    fn is_initialized(&self) -> bool;

    /// Short backend name used in logs and error messages
    fn name(&self) -> &'static str;
}

/// Scales fractions into `0.0..=share` before forwarding them
struct ScaledProgress<'a> {
    inner: &'a dyn LoadProgress,
    share: f32,
}

impl LoadProgress for ScaledProgress<'_> {
    fn on_progress(&self, fraction: f32) {
        self.inner.on_progress(fraction * self.share);
    }
}

/// Loaded inference backend
pub struct InferenceEngine {
    backend: Box<dyn UpscaleBackend>,
    load_time: Duration,
}

impl InferenceEngine {
    /// Fetch the configured model and build a backend from it
    ///
    /// Progress is reported monotonically from 0 to 1. The backend is built
    /// on the blocking thread pool.
    ///
    /// # Errors
    /// - `InvalidConfig` when no model is configured
    /// - `Network` if the model download fails
    /// - `ModelLoad` for any failure reading the model or building the backend
    pub async fn load(
        config: &UpscaleConfig,
        factory: &dyn BackendFactory,
        progress: &dyn LoadProgress,
    ) -> Result<Self> {
        let start = Instant::now();
        let spec = config.model.as_ref().ok_or_else(|| {
            UpscaleError::invalid_config("No model configured. Set a model path or URL.")
        })?;

        let progress = MonotonicProgress::new(progress);
        let fetch_progress = ScaledProgress {
            inner: &progress,
            share: FETCH_PROGRESS_SHARE,
        };
        let model = ModelLoader::new(config.cache_dir.clone())
            .load(spec, &fetch_progress)
            .await?;

        let mut backend = factory.create_backend(config.backend)?;
        let backend_name = backend.name();
        let backend_config = config.clone();

        let backend = tokio::task::spawn_blocking(move || {
            backend.load(&model, &backend_config)?;
            Ok::<_, UpscaleError>(backend)
        })
        .await
        .map_err(|e| UpscaleError::internal(format!("Backend load task failed: {e}")))?
        .map_err(|e| match e {
            UpscaleError::ModelLoad(_) => e,
            other => UpscaleError::model_load(format!("{backend_name} backend: {other}")),
        })?;

        if !backend.is_initialized() {
            return Err(UpscaleError::model_load(format!(
                "{backend_name} backend did not finish loading"
            )));
        }

        progress.on_progress(1.0);
        let load_time = start.elapsed();
        tracing::info!(
            backend = backend_name,
            load_ms = load_time.as_millis() as u64,
            "Inference engine ready"
        );

        Ok(Self { backend, load_time })
    }

    /// Wrap a backend that is already loaded
    ///
    /// # Errors
    /// - `ModelLoad` if the backend is not initialized
    pub fn from_backend(backend: Box<dyn UpscaleBackend>) -> Result<Self> {
        if !backend.is_initialized() {
            return Err(UpscaleError::model_load(format!(
                "{} backend is not initialized",
                backend.name()
            )));
        }
        Ok(Self {
            backend,
            load_time: Duration::ZERO,
        })
    }

    /// Upscale one chunk and check that the result is exactly twice its size
    ///
    /// # Errors
    /// - `Inference` for backend failures
    /// - `ShapeMismatch` if the result is not `2w`x`2h`
    pub fn infer(&self, chunk: &RgbaImage) -> Result<RgbaImage> {
        let (width, height) = chunk.dimensions();
        let expected = width
            .checked_mul(2)
            .zip(height.checked_mul(2))
            .ok_or_else(|| {
                UpscaleError::invalid_config(format!("Chunk {width}x{height} is too large"))
            })?;

        let result = self.backend.upscale_chunk(chunk)?;
        if result.dimensions() != expected {
            return Err(UpscaleError::shape_mismatch(expected, result.dimensions()));
        }
        Ok(result)
    }

    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Time spent fetching the model and building the backend
    #[must_use]
    pub fn load_time(&self) -> Duration {
        self.load_time
    }

    /// Release the backend and its sessions
    pub fn shutdown(self) {
        tracing::debug!(backend = self.backend.name(), "Inference engine shut down");
    }
}

impl std::fmt::Debug for InferenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceEngine")
            .field("backend", &self.backend.name())
            .field("load_time", &self.load_time)
            .finish()
    }
}
