//! Output format handling service

use crate::config::OutputFormat;
use image::{DynamicImage, ImageFormat, RgbaImage};

/// Service for handling output format conversions
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Convert an RGBA image into the pixel layout stored by `format`
    ///
    /// JPEG cannot store transparency, so its alpha channel is dropped.
    ///
    /// ```rust
    /// use imgly_upscale::{services::OutputFormatHandler, OutputFormat};
    /// use image::RgbaImage;
    ///
    /// let converted = OutputFormatHandler::convert_format(RgbaImage::new(4, 4), OutputFormat::Jpeg);
    /// assert!(converted.as_rgb8().is_some());
    /// ```
    #[must_use]
    pub fn convert_format(rgba_image: RgbaImage, format: OutputFormat) -> DynamicImage {
        let image = DynamicImage::ImageRgba8(rgba_image);
        if Self::supports_transparency(format) {
            image
        } else {
            DynamicImage::ImageRgb8(image.to_rgb8())
        }
    }

    /// File extension (without the dot) for a given output format
    #[must_use]
    pub fn get_extension(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::WebP => "webp",
            OutputFormat::Tiff => "tiff",
            OutputFormat::Bmp => "bmp",
        }
    }

    #[must_use]
    pub fn supports_transparency(format: OutputFormat) -> bool {
        !matches!(format, OutputFormat::Jpeg)
    }

    /// Encoder format in the `image` crate
    #[must_use]
    pub fn image_format(format: OutputFormat) -> ImageFormat {
        match format {
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::Jpeg => ImageFormat::Jpeg,
            OutputFormat::WebP => ImageFormat::WebP,
            OutputFormat::Tiff => ImageFormat::Tiff,
            OutputFormat::Bmp => ImageFormat::Bmp,
        }
    }
}
