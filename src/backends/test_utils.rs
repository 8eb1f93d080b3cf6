//! Test utilities and mock backends for testing inference functionality
//!
//! The mocks implement [`UpscaleBackend`] without any model file. The
//! doubling mock duplicates every pixel into a 2x2 block and writes a fixed
//! bogus alpha so tests can prove alpha never comes from inference.

use crate::{
    config::{BackendType, UpscaleConfig},
    error::{Result, UpscaleError},
    inference::UpscaleBackend,
    models::ModelData,
    processor::BackendFactory,
};
use image::{Rgba, RgbaImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Alpha written by mock backends, never expected in reconstructed output
pub const BOGUS_ALPHA: u8 = 7;

/// Nearest-neighbour 2x upscale of the RGB channels
#[must_use]
pub fn double_rgb(chunk: &RgbaImage) -> RgbaImage {
    RgbaImage::from_fn(chunk.width() * 2, chunk.height() * 2, |x, y| {
        let [r, g, b, _] = chunk.get_pixel(x / 2, y / 2).0;
        Rgba([r, g, b, BOGUS_ALPHA])
    })
}

/// Mock backend producing an exact nearest-neighbour doubling
#[derive(Debug, Clone, Default)]
pub struct DoublingBackend {
    initialized: bool,
    calls: Arc<AtomicUsize>,
    delay: Option<Duration>,
    fail_on_call: Option<usize>,
}

impl DoublingBackend {
    /// Already loaded backend
    #[must_use]
    pub fn loaded() -> Self {
        Self {
            initialized: true,
            ..Self::default()
        }
    }

    /// Sleep for `delay` in every call
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail the `n`th call (zero-based)
    #[must_use]
    pub fn failing_on_call(mut self, n: usize) -> Self {
        self.fail_on_call = Some(n);
        self
    }

    /// Shared counter of `upscale_chunk` calls
    #[must_use]
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl UpscaleBackend for DoublingBackend {
    fn load(&mut self, model: &ModelData, _config: &UpscaleConfig) -> Result<()> {
        if model.bytes.is_empty() {
            return Err(UpscaleError::model_load("empty model"));
        }
        self.initialized = true;
        Ok(())
    }

    fn upscale_chunk(&self, chunk: &RgbaImage) -> Result<RgbaImage> {
        if !self.initialized {
            return Err(UpscaleError::inference("mock backend not loaded"));
        }
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.fail_on_call == Some(call) {
            return Err(UpscaleError::inference(format!("mock failure on call {call}")));
        }
        Ok(double_rgb(chunk))
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn name(&self) -> &'static str {
        "doubling"
    }
}

/// Mock backend whose every inference call fails
#[derive(Debug, Clone, Default)]
pub struct FailingBackend {
    initialized: bool,
}

impl FailingBackend {
    #[must_use]
    pub fn loaded() -> Self {
        Self { initialized: true }
    }
}

impl UpscaleBackend for FailingBackend {
    fn load(&mut self, _model: &ModelData, _config: &UpscaleConfig) -> Result<()> {
        self.initialized = true;
        Ok(())
    }

    fn upscale_chunk(&self, _chunk: &RgbaImage) -> Result<RgbaImage> {
        Err(UpscaleError::inference("mock inference failure"))
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Mock backend returning one column too few
#[derive(Debug, Clone, Default)]
pub struct WrongShapeBackend {
    initialized: bool,
}

impl WrongShapeBackend {
    #[must_use]
    pub fn loaded() -> Self {
        Self { initialized: true }
    }
}

impl UpscaleBackend for WrongShapeBackend {
    fn load(&mut self, _model: &ModelData, _config: &UpscaleConfig) -> Result<()> {
        self.initialized = true;
        Ok(())
    }

    fn upscale_chunk(&self, chunk: &RgbaImage) -> Result<RgbaImage> {
        Ok(RgbaImage::new(
            (chunk.width() * 2).saturating_sub(1),
            chunk.height() * 2,
        ))
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn name(&self) -> &'static str {
        "wrong-shape"
    }
}

/// Mock backend that cannot be loaded
#[derive(Debug, Clone, Default)]
pub struct UnloadableBackend;

impl UpscaleBackend for UnloadableBackend {
    fn load(&mut self, _model: &ModelData, _config: &UpscaleConfig) -> Result<()> {
        Err(UpscaleError::inference("unsupported operator in mock model"))
    }

    fn upscale_chunk(&self, _chunk: &RgbaImage) -> Result<RgbaImage> {
        Err(UpscaleError::inference("mock backend not loaded"))
    }

    fn is_initialized(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "unloadable"
    }
}

/// Factory creating a [`DoublingBackend`] for ONNX and an
/// [`UnloadableBackend`] for Tract
#[derive(Debug, Clone, Copy, Default)]
pub struct MockBackendFactory;

impl BackendFactory for MockBackendFactory {
    fn create_backend(&self, backend_type: BackendType) -> Result<Box<dyn UpscaleBackend>> {
        match backend_type {
            BackendType::Onnx => Ok(Box::new(DoublingBackend::default())),
            BackendType::Tract => Ok(Box::new(UnloadableBackend)),
        }
    }

    fn available_backends(&self) -> Vec<BackendType> {
        vec![BackendType::Onnx, BackendType::Tract]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_rgb() {
        let chunk = RgbaImage::from_fn(2, 1, |x, _| Rgba([x as u8, 1, 2, 200]));
        let doubled = double_rgb(&chunk);
        assert_eq!(doubled.dimensions(), (4, 2));
        assert_eq!(doubled.get_pixel(3, 1).0, [1, 1, 2, BOGUS_ALPHA]);
        assert_eq!(doubled.get_pixel(1, 0).0, [0, 1, 2, BOGUS_ALPHA]);
    }

    #[test]
    fn test_doubling_backend_counts_and_fails_on_request() {
        let backend = DoublingBackend::loaded().failing_on_call(1);
        let counter = backend.call_counter();
        let chunk = RgbaImage::new(1, 1);

        assert!(backend.upscale_chunk(&chunk).is_ok());
        assert!(backend.upscale_chunk(&chunk).is_err());
        assert!(backend.upscale_chunk(&chunk).is_ok());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_unloaded_backend_refuses_inference() {
        let backend = DoublingBackend::default();
        assert!(!backend.is_initialized());
        assert!(backend.upscale_chunk(&RgbaImage::new(1, 1)).is_err());
    }
}
