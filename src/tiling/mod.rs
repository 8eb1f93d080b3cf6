//! Tile geometry, extraction, stitching and alpha reconstruction
//!
//! One pass of the upscaler is expressed entirely in terms of these pieces:
//! the [`TileScheduler`] lays out the grid, [`extract_chunk`] copies the
//! padded input of a tile, and the doubled inference result is placed with
//! [`stitch_rgb`] while [`reconstruct_alpha`] fills alpha from the chunk.

pub mod alpha;
pub mod chunk;
pub mod geometry;
pub mod grid;
pub mod stitch;

pub use alpha::reconstruct_alpha;
pub use chunk::extract_chunk;
pub use geometry::Rect;
pub use grid::{TileDescriptor, TileScheduler, DEFAULT_CHUNK_SIZE, DEFAULT_PAD_SIZE};
pub use stitch::stitch_rgb;
