//! Conversion between RGBA chunks and model tensors
//!
//! Only the RGB channels travel through the model. Alpha is rebuilt from
//! the source chunk, so tensors decoded here always carry opaque alpha.

use super::validation::TensorValidator;
use crate::error::Result;
use crate::models::TensorLayout;
use image::{Rgba, RgbaImage};
use ndarray::Array4;

/// Encode the RGB channels of `chunk` in the tensor layout a model expects
#[must_use]
pub fn chunk_to_tensor(chunk: &RgbaImage, layout: TensorLayout) -> Array4<f32> {
    let (width, height) = chunk.dimensions();
    let scale = layout.scale() / 255.0;
    let mut tensor = Array4::<f32>::zeros(layout.input_shape(width as usize, height as usize));

    for (x, y, pixel) in chunk.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for (c, &value) in pixel.0.iter().take(3).enumerate() {
            let value = f32::from(value) * scale;
            if layout.is_channels_last() {
                tensor[[0, y, x, c]] = value;
            } else {
                tensor[[0, c, y, x]] = value;
            }
        }
    }

    tensor
}

/// Decode a model output tensor into an opaque RGBA chunk
///
/// Values are rescaled to `0..=255`, rounded and clamped.
///
/// # Errors
/// - Tensor is not a single-batch RGB tensor in `layout`
pub fn tensor_to_chunk(tensor: &Array4<f32>, layout: TensorLayout) -> Result<RgbaImage> {
    let (width, height) = TensorValidator::validate_rgb_tensor(tensor.shape(), layout)?;
    let scale = 255.0 / layout.scale();

    let sample = |x: u32, y: u32, c: usize| {
        let (x, y) = (x as usize, y as usize);
        let value = if layout.is_channels_last() {
            tensor[[0, y, x, c]]
        } else {
            tensor[[0, c, y, x]]
        };
        to_byte(value * scale)
    };

    Ok(RgbaImage::from_fn(width, height, |x, y| {
        Rgba([sample(x, y, 0), sample(x, y, 1), sample(x, y, 2), u8::MAX])
    }))
}

fn to_byte(value: f32) -> u8 {
    if value.is_nan() {
        0
    } else {
        value.round().clamp(0.0, 255.0) as u8
    }
}
