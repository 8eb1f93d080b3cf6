//! Result and timing types for upscale operations

use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Time spent in each phase of an upscale, in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    pub model_load_ms: u64,
    pub image_decode_ms: u64,
    /// Tile extraction plus engine calls, summed over passes
    pub inference_ms: u64,
    /// RGB stitching and alpha reconstruction, summed over passes
    pub stitch_ms: u64,
    pub image_encode_ms: u64,
    pub total_ms: u64,
}

/// Share of `total_ms` taken by each phase, in percent
#[derive(Debug, Clone, Default)]
pub struct TimingBreakdown {
    pub model_load_pct: f64,
    pub decode_pct: f64,
    pub inference_pct: f64,
    pub stitch_pct: f64,
    pub encode_pct: f64,
}

impl ProcessingTimings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Percentage breakdown of the total time
    #[must_use]
    pub fn breakdown_percentages(&self) -> TimingBreakdown {
        if self.total_ms == 0 {
            return TimingBreakdown::default();
        }
        let total = self.total_ms as f64;
        let pct = |ms: u64| ms as f64 / total * 100.0;
        TimingBreakdown {
            model_load_pct: pct(self.model_load_ms),
            decode_pct: pct(self.image_decode_ms),
            inference_pct: pct(self.inference_ms),
            stitch_pct: pct(self.stitch_ms),
            encode_pct: pct(self.image_encode_ms),
        }
    }
}

/// Output of an upscale run
#[derive(Debug, Clone)]
pub struct UpscaleResult {
    /// Upscaled image, `2^passes` times the original in each dimension
    pub image: RgbaImage,
    /// Dimensions of the input image
    pub original_dimensions: (u32, u32),
    /// Number of doubling passes applied
    pub passes: u32,
    pub timings: ProcessingTimings,
}

impl UpscaleResult {
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    #[must_use]
    pub fn timings(&self) -> &ProcessingTimings {
        &self.timings
    }

    #[must_use]
    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}
