//! Validation helpers for tensors and upscale parameters

use crate::error::{Result, UpscaleError};
use crate::models::TensorLayout;

/// Validator for model tensor shapes
pub struct TensorValidator;

impl TensorValidator {
    /// Check that `shape` is a single-batch, three-channel tensor in
    /// `layout` and return its `(width, height)`
    ///
    /// # Errors
    /// - `Inference` for any other shape
    pub fn validate_rgb_tensor(shape: &[usize], layout: TensorLayout) -> Result<(u32, u32)> {
        let &[batch, a, b, c] = shape else {
            return Err(UpscaleError::inference(format!(
                "Tensor must have 4 dimensions, got {}",
                shape.len()
            )));
        };

        let (channels, height, width) = if layout.is_channels_last() {
            (c, a, b)
        } else {
            (a, b, c)
        };

        if batch != 1 || channels != 3 {
            return Err(UpscaleError::inference(format!(
                "Expected a [1, 3] RGB tensor in {layout:?} layout, got shape {shape:?}"
            )));
        }

        let to_u32 = |v: usize| {
            u32::try_from(v).map_err(|_| {
                UpscaleError::inference(format!("Tensor dimension {v} exceeds u32"))
            })
        };
        Ok((to_u32(width)?, to_u32(height)?))
    }
}

/// Validator for upscale parameters
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate a quality setting (0-100)
    ///
    /// # Errors
    /// - Quality above 100
    pub fn validate_quality(name: &str, quality: u8) -> Result<()> {
        if quality > 100 {
            return Err(UpscaleError::config_value_error(
                name,
                quality,
                "0-100",
                Some(90),
            ));
        }
        Ok(())
    }

    /// Validate that a `width`x`height` image can be doubled `passes` times
    /// and return the final dimensions
    ///
    /// # Errors
    /// - Zero-sized image
    /// - Final dimensions do not fit in `u32`
    pub fn validate_upscale_dimensions(width: u32, height: u32, passes: u32) -> Result<(u32, u32)> {
        if width == 0 || height == 0 {
            return Err(UpscaleError::invalid_config(format!(
                "Image dimensions must be positive, got {width}x{height}"
            )));
        }

        let scale = |v: u32| {
            1u32.checked_shl(passes)
                .and_then(|factor| v.checked_mul(factor))
                .ok_or_else(|| {
                    UpscaleError::invalid_config(format!(
                        "{width}x{height} cannot be doubled {passes} times"
                    ))
                })
        };

        Ok((scale(width)?, scale(height)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rgb_tensor() {
        assert_eq!(
            TensorValidator::validate_rgb_tensor(&[1, 3, 20, 30], TensorLayout::NchwUnit).unwrap(),
            (30, 20)
        );
        assert_eq!(
            TensorValidator::validate_rgb_tensor(&[1, 20, 30, 3], TensorLayout::NhwcUnit).unwrap(),
            (30, 20)
        );
        assert!(TensorValidator::validate_rgb_tensor(&[2, 3, 2, 2], TensorLayout::NchwUnit).is_err());
        assert!(TensorValidator::validate_rgb_tensor(&[1, 3, 2], TensorLayout::NchwUnit).is_err());
        assert!(TensorValidator::validate_rgb_tensor(&[1, 3, 2, 2], TensorLayout::NhwcUnit).is_err());
    }

    #[test]
    fn test_validate_upscale_dimensions() {
        assert_eq!(ConfigValidator::validate_upscale_dimensions(3, 5, 0).unwrap(), (3, 5));
        assert_eq!(ConfigValidator::validate_upscale_dimensions(3, 5, 3).unwrap(), (24, 40));
        assert!(ConfigValidator::validate_upscale_dimensions(0, 5, 1).is_err());
        assert!(ConfigValidator::validate_upscale_dimensions(1 << 30, 1, 2).is_err());
        assert!(ConfigValidator::validate_upscale_dimensions(1, 1, 40).is_err());
    }

    #[test]
    fn test_validate_quality() {
        assert!(ConfigValidator::validate_quality("JPEG quality", 100).is_ok());
        assert!(ConfigValidator::validate_quality("JPEG quality", 101).is_err());
    }
}
