//! Placement of inference output into the pass canvas

use super::geometry::Rect;
use super::grid::TileDescriptor;
use crate::error::{Result, UpscaleError};
use image::RgbaImage;

/// Crop the padding off `result` and write its RGB channels into `canvas`
///
/// The crop starts at twice the tile's inner offset and spans the tile's
/// output rectangle. Alpha in the canvas is left untouched.
///
/// # Errors
/// - `ShapeMismatch` if the crop exceeds `result` or the placement exceeds
///   `canvas`
pub fn stitch_rgb(result: &RgbaImage, tile: &TileDescriptor, canvas: &mut RgbaImage) -> Result<()> {
    let crop = tile.result_crop();
    let target = tile.output_region;

    let (result_w, result_h) = result.dimensions();
    if !crop.fits_within(result_w, result_h) {
        return Err(UpscaleError::shape_mismatch(
            (crop.right(), crop.bottom()),
            (result_w, result_h),
        ));
    }

    let (canvas_w, canvas_h) = canvas.dimensions();
    if !target.fits_within(canvas_w, canvas_h) {
        return Err(UpscaleError::shape_mismatch(
            (target.right(), target.bottom()),
            (canvas_w, canvas_h),
        ));
    }

    copy_rgb_rows(result, crop, canvas, target)
}

fn copy_rgb_rows(
    source: &RgbaImage,
    crop: Rect,
    canvas: &mut RgbaImage,
    target: Rect,
) -> Result<()> {
    let source_w = source.width();
    let canvas_w = canvas.width();
    let source_raw = source.as_raw();
    let canvas_raw: &mut [u8] = canvas;

    for row in 0..target.height {
        let src = source_raw
            .get(crop.row_bytes(row, source_w))
            .ok_or_else(|| UpscaleError::internal(format!("Crop row {row} out of range")))?;
        let dst = canvas_raw
            .get_mut(target.row_bytes(row, canvas_w))
            .ok_or_else(|| UpscaleError::internal(format!("Canvas row {row} out of range")))?;

        for (out, px) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
            out[..3].copy_from_slice(&px[..3]);
        }
    }

    Ok(())
}
