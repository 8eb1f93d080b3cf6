//! Chunk extraction
//!
//! Materializes the padded input region of a tile as an owned buffer so it
//! can outlive the borrow of the source image while inference runs.

use super::geometry::{Rect, CHANNELS};
use crate::error::{Result, UpscaleError};
use image::RgbaImage;

/// Copy `region` out of `source`, row by row and unchanged
///
/// # Errors
/// - `region` is empty or not fully contained in `source`
pub fn extract_chunk(source: &RgbaImage, region: Rect) -> Result<RgbaImage> {
    let (width, height) = source.dimensions();
    if region.is_empty() || !region.fits_within(width, height) {
        return Err(UpscaleError::invalid_config(format!(
            "Chunk region {region} is outside the {width}x{height} source"
        )));
    }

    let raw = source.as_raw();
    let mut data = Vec::with_capacity(region.pixel_count() * CHANNELS);
    for row in 0..region.height {
        let bytes = raw.get(region.row_bytes(row, width)).ok_or_else(|| {
            UpscaleError::internal(format!("Row {row} of {region} is outside the source buffer"))
        })?;
        data.extend_from_slice(bytes);
    }

    RgbaImage::from_raw(region.width, region.height, data).ok_or_else(|| {
        UpscaleError::internal(format!("Chunk buffer for {region} has the wrong length"))
    })
}
