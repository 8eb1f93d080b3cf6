//! Shared stub backends and fixtures for integration tests

#![allow(dead_code)]

use image::{Rgba, RgbaImage};
use imgly_upscale::{
    InferenceEngine, ModelData, Result, UpscaleBackend, UpscaleConfig, UpscaleError,
    UpscaleProcessor,
};
use std::sync::Arc;

/// Alpha the stubs write into every result pixel
pub const STUB_ALPHA: u8 = 3;

/// Pixel that makes [`MarkerFailBackend`] fail
pub const POISON: [u8; 3] = [255, 0, 255];

/// Doubles RGB by pixel duplication
#[derive(Debug, Default)]
pub struct EchoBackend;

impl UpscaleBackend for EchoBackend {
    fn load(&mut self, _model: &ModelData, _config: &UpscaleConfig) -> Result<()> {
        Ok(())
    }

    fn upscale_chunk(&self, chunk: &RgbaImage) -> Result<RgbaImage> {
        Ok(RgbaImage::from_fn(
            chunk.width() * 2,
            chunk.height() * 2,
            |x, y| {
                let [r, g, b, _] = chunk.get_pixel(x / 2, y / 2).0;
                Rgba([r, g, b, STUB_ALPHA])
            },
        ))
    }

    fn is_initialized(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "echo"
    }
}

/// Fails every call
#[derive(Debug, Default)]
pub struct AlwaysFailBackend;

impl UpscaleBackend for AlwaysFailBackend {
    fn load(&mut self, _model: &ModelData, _config: &UpscaleConfig) -> Result<()> {
        Ok(())
    }

    fn upscale_chunk(&self, _chunk: &RgbaImage) -> Result<RgbaImage> {
        Err(UpscaleError::inference("stub engine refused the chunk"))
    }

    fn is_initialized(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "always-fail"
    }
}

/// Echoes, but fails on any chunk containing a [`POISON`] pixel
#[derive(Debug, Default)]
pub struct MarkerFailBackend;

impl UpscaleBackend for MarkerFailBackend {
    fn load(&mut self, _model: &ModelData, _config: &UpscaleConfig) -> Result<()> {
        Ok(())
    }

    fn upscale_chunk(&self, chunk: &RgbaImage) -> Result<RgbaImage> {
        if chunk.pixels().any(|p| p.0[..3] == POISON) {
            return Err(UpscaleError::inference("poisoned chunk"));
        }
        EchoBackend.upscale_chunk(chunk)
    }

    fn is_initialized(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "marker-fail"
    }
}

/// Returns a result one pixel too narrow
#[derive(Debug, Default)]
pub struct ShrinkingBackend;

impl UpscaleBackend for ShrinkingBackend {
    fn load(&mut self, _model: &ModelData, _config: &UpscaleConfig) -> Result<()> {
        Ok(())
    }

    fn upscale_chunk(&self, chunk: &RgbaImage) -> Result<RgbaImage> {
        Ok(RgbaImage::new(chunk.width() * 2 - 1, chunk.height() * 2))
    }

    fn is_initialized(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "shrinking"
    }
}

/// Processor around an already loaded stub
pub fn processor_with(
    backend: impl UpscaleBackend + 'static,
    config: UpscaleConfig,
) -> UpscaleProcessor {
    let engine = InferenceEngine::from_backend(Box::new(backend)).unwrap();
    UpscaleProcessor::with_engine(config, Arc::new(engine)).unwrap()
}

/// Small tiles so even tiny images span several of them
pub fn small_tile_config(chunk_size: u32, pad_size: u32) -> UpscaleConfig {
    UpscaleConfig::builder()
        .chunk_size(chunk_size)
        .pad_size(pad_size)
        .build()
        .unwrap()
}

/// Image where every pixel differs from its neighbours
pub fn pattern(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([
            (x * 7 + y) as u8,
            (y * 11 + x * 3) as u8,
            ((x ^ y) * 5) as u8,
            (x * 13 + y * 17) as u8,
        ])
    })
}

/// Expected RGB of an exact doubling, per output pixel
pub fn expected_rgb(source: &RgbaImage, x: u32, y: u32, scale: u32) -> [u8; 3] {
    let [r, g, b, _] = source.get_pixel(x / scale, y / scale).0;
    [r, g, b]
}
