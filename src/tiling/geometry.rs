//! Pixel-space rectangles shared by the scheduler, extractor and stitcher

use crate::error::{Result, UpscaleError};
use serde::{Deserialize, Serialize};

/// Number of interleaved channels in every buffer handled by the tiler
pub const CHANNELS: usize = 4;

/// Axis-aligned rectangle in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle covering a whole `width`x`height` image
    #[must_use]
    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Exclusive right edge
    #[must_use]
    pub const fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge
    #[must_use]
    pub const fn bottom(&self) -> u32 {
        self.y + self.height
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether `self` lies entirely within an image of the given size
    #[must_use]
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        u64::from(self.x) + u64::from(self.width) <= u64::from(width)
            && u64::from(self.y) + u64::from(self.height) <= u64::from(height)
    }

    /// Whether two rectangles share at least one pixel
    #[must_use]
    pub fn overlaps(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// The same rectangle in a canvas of twice the resolution
    ///
    /// # Errors
    /// - Coordinates overflow `u32` when doubled
    pub fn doubled(&self) -> Result<Rect> {
        let double = |v: u32| {
            v.checked_mul(2).ok_or_else(|| {
                UpscaleError::invalid_config(format!("Coordinate {v} overflows when doubled"))
            })
        };
        Ok(Rect::new(
            double(self.x)?,
            double(self.y)?,
            double(self.width)?,
            double(self.height)?,
        ))
    }

    /// Byte range of row `row` (relative to the rectangle) inside a packed
    /// RGBA buffer whose rows are `image_width` pixels wide
    #[must_use]
    pub fn row_bytes(&self, row: u32, image_width: u32) -> std::ops::Range<usize> {
        let start = ((self.y + row) as usize * image_width as usize + self.x as usize) * CHANNELS;
        start..start + self.width as usize * CHANNELS
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {})x[{}, {})",
            self.x,
            self.right(),
            self.y,
            self.bottom()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edges_and_counts() {
        let rect = Rect::new(10, 20, 30, 40);
        assert_eq!(rect.right(), 40);
        assert_eq!(rect.bottom(), 60);
        assert_eq!(rect.pixel_count(), 1200);
        assert!(!rect.is_empty());
        assert!(Rect::new(0, 0, 0, 5).is_empty());
    }

    #[test]
    fn test_fits_within() {
        assert!(Rect::new(0, 0, 10, 10).fits_within(10, 10));
        assert!(!Rect::new(1, 0, 10, 10).fits_within(10, 10));
        assert!(!Rect::new(0, u32::MAX, 1, 1).fits_within(10, 10));
    }

    #[test]
    fn test_overlaps_is_exclusive_on_edges() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(10, 0, 10, 10);
        let c = Rect::new(9, 9, 2, 2);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(b.overlaps(&c));
    }

    #[test]
    fn test_doubled() {
        let rect = Rect::new(3, 5, 7, 9).doubled().unwrap();
        assert_eq!(rect, Rect::new(6, 10, 14, 18));
        assert!(Rect::new(u32::MAX, 0, 1, 1).doubled().is_err());
    }

    #[test]
    fn test_row_bytes() {
        let rect = Rect::new(2, 1, 3, 2);
        assert_eq!(rect.row_bytes(0, 10), 48..60);
        assert_eq!(rect.row_bytes(1, 10), 88..100);
    }
}
