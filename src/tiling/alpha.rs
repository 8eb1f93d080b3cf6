//! Nearest-neighbour alpha reconstruction
//!
//! Alpha never goes through the model. Each source alpha sample is
//! duplicated into a 2x2 block of the output canvas.

use super::grid::TileDescriptor;
use crate::error::{Result, UpscaleError};
use image::RgbaImage;

/// Write the doubled alpha of `chunk` into the tile's output rectangle
///
/// Output pixel `(lx, ly)` of the tile takes the alpha of chunk pixel
/// `(dx + lx / 2, dy + ly / 2)`. RGB in the canvas is left untouched.
///
/// # Errors
/// - `ShapeMismatch` if the chunk or canvas cannot hold the tile
pub fn reconstruct_alpha(
    chunk: &RgbaImage,
    tile: &TileDescriptor,
    canvas: &mut RgbaImage,
) -> Result<()> {
    let source = tile.source_region();
    let (dx, dy) = tile.inner_offset;
    let target = tile.output_region;

    let (chunk_w, chunk_h) = chunk.dimensions();
    if dx + source.width > chunk_w || dy + source.height > chunk_h {
        return Err(UpscaleError::shape_mismatch(
            (dx + source.width, dy + source.height),
            (chunk_w, chunk_h),
        ));
    }

    let (canvas_w, canvas_h) = canvas.dimensions();
    if !target.fits_within(canvas_w, canvas_h) {
        return Err(UpscaleError::shape_mismatch(
            (target.right(), target.bottom()),
            (canvas_w, canvas_h),
        ));
    }

    for ly in 0..target.height {
        for lx in 0..target.width {
            let alpha = chunk.get_pixel(dx + lx / 2, dy + ly / 2).0[3];
            canvas.get_pixel_mut(target.x + lx, target.y + ly).0[3] = alpha;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiling::chunk::extract_chunk;
    use crate::tiling::grid::TileScheduler;
    use image::Rgba;

    #[test]
    fn test_alpha_is_duplicated_per_block() {
        let scheduler = TileScheduler::new(4, 1).unwrap();
        let (width, height) = (9, 7);
        let source = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([1, 2, 3, (x * 16 + y) as u8])
        });
        let mut canvas = RgbaImage::from_pixel(width * 2, height * 2, Rgba([50, 60, 70, 0]));

        for tile in scheduler.schedule(width, height).unwrap() {
            let chunk = extract_chunk(&source, tile.input_region).unwrap();
            reconstruct_alpha(&chunk, &tile, &mut canvas).unwrap();
        }

        for (x, y, pixel) in canvas.enumerate_pixels() {
            assert_eq!(pixel.0[3], source.get_pixel(x / 2, y / 2).0[3]);
            assert_eq!(&pixel.0[..3], &[50, 60, 70]);
        }
    }

    #[test]
    fn test_alpha_rejects_short_chunk() {
        let tile = TileScheduler::default().schedule(8, 8).unwrap()[0];
        let chunk = RgbaImage::new(4, 8);
        let mut canvas = RgbaImage::new(16, 16);

        assert!(matches!(
            reconstruct_alpha(&chunk, &tile, &mut canvas),
            Err(UpscaleError::ShapeMismatch { .. })
        ));
    }
}
