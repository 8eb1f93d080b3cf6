//! Tile grid scheduling
//!
//! Splits an image into a row-major grid of tiles. Each tile carries its
//! padded input rectangle (the context handed to the model), its unpadded
//! target rectangle in the doubled output canvas, and the offset of the
//! unpadded origin inside the padded input.
//!
//! Per axis the grid uses `n = ceil(dim / chunk_size)` cells of
//! `floor(dim / n)` pixels. Because `n * floor(dim / n)` can fall short of
//! `dim`, the last cell on each axis absorbs the remainder so the output
//! regions always cover the full canvas.

use super::geometry::Rect;
use crate::config::TilingConfig;
use crate::error::{Result, UpscaleError};
use serde::{Deserialize, Serialize};

/// Nominal tile edge length before grid division
pub const DEFAULT_CHUNK_SIZE: u32 = 1024;

/// Context margin added around each tile where pixels exist
pub const DEFAULT_PAD_SIZE: u32 = 32;

/// One tile of a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileDescriptor {
    /// Row index (y axis)
    pub row: u32,
    /// Column index (x axis)
    pub column: u32,
    /// Padded source rectangle, clipped to the image
    pub input_region: Rect,
    /// Unpadded target rectangle in the doubled output canvas
    pub output_region: Rect,
    /// Offset of the unpadded tile origin inside `input_region`
    pub inner_offset: (u32, u32),
}

impl TileDescriptor {
    /// Unpadded tile rectangle in source coordinates
    #[must_use]
    pub fn source_region(&self) -> Rect {
        Rect::new(
            self.input_region.x + self.inner_offset.0,
            self.input_region.y + self.inner_offset.1,
            self.output_region.width / 2,
            self.output_region.height / 2,
        )
    }

    /// Crop rectangle inside the doubled inference result
    #[must_use]
    pub fn result_crop(&self) -> Rect {
        Rect::new(
            self.inner_offset.0 * 2,
            self.inner_offset.1 * 2,
            self.output_region.width,
            self.output_region.height,
        )
    }
}

/// One cell of the grid along a single axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AxisSpan {
    origin: u32,
    extent: u32,
    input_start: u32,
    input_end: u32,
}

fn axis_spans(dim: u32, chunk_size: u32, pad_size: u32) -> Vec<AxisSpan> {
    let count = dim.div_ceil(chunk_size);
    let cell = dim / count;

    (0..count)
        .map(|index| {
            let origin = index * cell;
            let extent = if index + 1 == count {
                dim - origin
            } else {
                cell
            };
            AxisSpan {
                origin,
                extent,
                input_start: origin.saturating_sub(pad_size),
                input_end: origin.saturating_add(extent).saturating_add(pad_size).min(dim),
            }
        })
        .collect()
}

/// Computes the tile grid covering an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileScheduler {
    chunk_size: u32,
    pad_size: u32,
}

impl TileScheduler {
    /// Create a scheduler for the given chunk and pad sizes
    ///
    /// # Errors
    /// - `chunk_size` is zero
    pub fn new(chunk_size: u32, pad_size: u32) -> Result<Self> {
        if chunk_size == 0 {
            return Err(UpscaleError::config_value_error(
                "chunk_size",
                chunk_size,
                ">= 1",
                Some(DEFAULT_CHUNK_SIZE),
            ));
        }
        Ok(Self {
            chunk_size,
            pad_size,
        })
    }

    /// Create a scheduler from tiling configuration
    ///
    /// # Errors
    /// - Invalid chunk size
    pub fn from_config(config: &TilingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.pad_size)
    }

    #[must_use]
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    #[must_use]
    pub fn pad_size(&self) -> u32 {
        self.pad_size
    }

    /// Number of tile columns and rows for an image
    #[must_use]
    pub fn grid_size(&self, width: u32, height: u32) -> (u32, u32) {
        (
            width.div_ceil(self.chunk_size),
            height.div_ceil(self.chunk_size),
        )
    }

    /// Compute the row-major tile sequence for a `width`x`height` image
    ///
    /// # Errors
    /// - Zero-sized image
    /// - Output coordinates overflow when doubled
    pub fn schedule(&self, width: u32, height: u32) -> Result<Vec<TileDescriptor>> {
        if width == 0 || height == 0 {
            return Err(UpscaleError::invalid_config(format!(
                "Cannot tile an empty image ({width}x{height})"
            )));
        }
        if width > u32::MAX / 2 || height > u32::MAX / 2 {
            return Err(UpscaleError::invalid_config(format!(
                "Image {width}x{height} is too large to double"
            )));
        }

        let columns = axis_spans(width, self.chunk_size, self.pad_size);
        let rows = axis_spans(height, self.chunk_size, self.pad_size);
        let mut tiles = Vec::with_capacity(columns.len() * rows.len());

        for (i, row) in rows.iter().enumerate() {
            for (j, column) in columns.iter().enumerate() {
                let input_region = Rect::new(
                    column.input_start,
                    row.input_start,
                    column.input_end - column.input_start,
                    row.input_end - row.input_start,
                );
                let output_region =
                    Rect::new(column.origin, row.origin, column.extent, row.extent).doubled()?;

                tiles.push(TileDescriptor {
                    row: i as u32,
                    column: j as u32,
                    input_region,
                    output_region,
                    inner_offset: (
                        column.origin - column.input_start,
                        row.origin - row.input_start,
                    ),
                });
            }
        }

        tracing::trace!(
            width,
            height,
            chunk_size = self.chunk_size,
            pad_size = self.pad_size,
            tiles = tiles.len(),
            "Computed tile grid"
        );

        Ok(tiles)
    }
}

impl Default for TileScheduler {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            pad_size: DEFAULT_PAD_SIZE,
        }
    }
}
