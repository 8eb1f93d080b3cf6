//! ONNX Runtime backend for super-resolution models
//!
//! Holds a small pool of sessions so that several tile workers can run
//! inference at the same time. Each call takes the first free session,
//! starting from a rotating index, or waits on one if all are busy.

use crate::config::{ExecutionProvider, UpscaleConfig};
use crate::error::{Result, UpscaleError};
use crate::inference::UpscaleBackend;
use crate::models::{ModelData, TensorLayout};
use crate::utils::{chunk_to_tensor, tensor_to_chunk};
use image::RgbaImage;
use ndarray::{Array4, Ix4};
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
    ExecutionProviderDispatch,
};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// ONNX Runtime backend
#[derive(Debug, Default)]
pub struct OnnxBackend {
    sessions: Vec<Mutex<Session>>,
    next_session: AtomicUsize,
    layout: TensorLayout,
}

impl OnnxBackend {
    /// List all ONNX Runtime execution providers with availability status and descriptions
    ///
    /// Returns `(name, available, description)` tuples.
    ///
    /// ```rust
    /// use imgly_upscale::backends::OnnxBackend;
    ///
    /// for (name, available, description) in OnnxBackend::list_providers() {
    ///     println!("{name}: {available} - {description}");
    /// }
    /// ```
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        tracing::debug!(
            os = std::env::consts::OS,
            arch = std::env::consts::ARCH,
            "Checking ONNX Runtime execution providers"
        );

        let cuda_available =
            OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false);
        let coreml_available =
            OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default())
                .unwrap_or(false);

        vec![
            (
                "CPU".to_string(),
                true,
                "Always available, uses CPU for inference".to_string(),
            ),
            (
                "CUDA".to_string(),
                cuda_available,
                "NVIDIA GPU acceleration (requires CUDA toolkit and compatible GPU)".to_string(),
            ),
            (
                "CoreML".to_string(),
                coreml_available,
                "Apple Silicon GPU acceleration (macOS only)".to_string(),
            ),
        ]
    }

    /// Create an unloaded backend
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions in the pool
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn execution_providers(provider: ExecutionProvider) -> Vec<ExecutionProviderDispatch> {
        let cuda = CUDAExecutionProvider::default();
        let cuda_available = OrtExecutionProvider::is_available(&cuda).unwrap_or(false);
        let coreml = CoreMLExecutionProvider::default().with_subgraphs(true);
        let coreml_available = OrtExecutionProvider::is_available(&coreml).unwrap_or(false);

        match provider {
            ExecutionProvider::Auto => {
                let mut providers = Vec::new();
                if cuda_available {
                    tracing::info!("CUDA execution provider is available and will be used");
                    providers.push(cuda.build());
                }
                if coreml_available {
                    tracing::info!("CoreML execution provider is available and will be used");
                    providers.push(coreml.build());
                }
                if providers.is_empty() {
                    tracing::warn!("No hardware acceleration available, falling back to CPU");
                }
                providers
            },
            ExecutionProvider::Cpu => {
                tracing::info!("Using CPU execution provider");
                Vec::new()
            },
            ExecutionProvider::Cuda if cuda_available => vec![cuda.build()],
            ExecutionProvider::CoreMl if coreml_available => vec![coreml.build()],
            requested => {
                tracing::warn!(
                    provider = %requested,
                    "Requested execution provider not available, falling back to CPU"
                );
                Vec::new()
            },
        }
    }

    fn build_session(model: &ModelData, config: &UpscaleConfig) -> Result<Session> {
        let session_error =
            |stage: &str, e: ort::Error| UpscaleError::model_load(format!("{stage}: {e}"));

        let intra_threads = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            let cores = std::thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(4);
            (cores / config.sessions.max(1)).max(1)
        };

        let mut builder = Session::builder()
            .map_err(|e| session_error("Failed to create session builder", e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| session_error("Failed to set optimization level", e))?;

        let providers = Self::execution_providers(config.execution_provider);
        if !providers.is_empty() {
            builder = builder
                .with_execution_providers(providers)
                .map_err(|e| session_error("Failed to set execution providers", e))?;
        }

        builder
            .with_intra_threads(intra_threads)
            .map_err(|e| session_error("Failed to set intra threads", e))?
            .commit_from_memory(&model.bytes)
            .map_err(|e| session_error("Failed to create session from model data", e))
    }

    fn acquire_session(&self) -> Result<MutexGuard<'_, Session>> {
        let count = self.sessions.len();
        if count == 0 {
            return Err(UpscaleError::inference("ONNX backend not initialized"));
        }

        let start = self.next_session.fetch_add(1, Ordering::Relaxed);
        for offset in 0..count {
            if let Some(Ok(guard)) = self
                .sessions
                .get((start + offset) % count)
                .map(Mutex::try_lock)
            {
                return Ok(guard);
            }
        }

        self.sessions
            .get(start % count)
            .ok_or_else(|| UpscaleError::internal("ONNX session index out of range"))?
            .lock()
            .map_err(|_| UpscaleError::internal("ONNX session lock poisoned"))
    }

    fn run(&self, input: Array4<f32>) -> Result<Array4<f32>> {
        let input_value = Value::from_array(input).map_err(|e| {
            UpscaleError::inference_error_with_provider("onnx", "Tensor conversion", &e.to_string())
        })?;

        let mut session = self.acquire_session()?;
        let outputs = session.run(ort::inputs![input_value]).map_err(|e| {
            UpscaleError::inference_error_with_provider("onnx", "Inference", &e.to_string())
        })?;

        let first_key = outputs
            .keys()
            .next()
            .ok_or_else(|| UpscaleError::inference("Model produced no outputs"))?;
        let output = outputs
            .get(first_key)
            .ok_or_else(|| UpscaleError::inference("First output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| UpscaleError::inference(format!("Failed to extract output tensor: {e}")))?;

        let output = output
            .into_dimensionality::<Ix4>()
            .map_err(|e| UpscaleError::inference(format!("Expected 4D output tensor: {e}")))?
            .to_owned();
        Ok(output)
    }
}

impl UpscaleBackend for OnnxBackend {
    fn load(&mut self, model: &ModelData, config: &UpscaleConfig) -> Result<()> {
        let sessions = (0..config.sessions.max(1))
            .map(|_| Self::build_session(model, config).map(Mutex::new))
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(
            model = %model.name,
            sessions = sessions.len(),
            provider = %config.execution_provider,
            "ONNX Runtime sessions created"
        );

        self.sessions = sessions;
        self.layout = model.layout;
        Ok(())
    }

    fn upscale_chunk(&self, chunk: &RgbaImage) -> Result<RgbaImage> {
        let input = chunk_to_tensor(chunk, self.layout);
        let output = self.run(input)?;
        tensor_to_chunk(&output, self.layout)
    }

    fn is_initialized(&self) -> bool {
        !self.sessions.is_empty()
    }

    fn name(&self) -> &'static str {
        "onnx"
    }
}
