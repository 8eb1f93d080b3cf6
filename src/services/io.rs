//! Image I/O operations service
//!
//! Decodes inputs into RGBA8 and encodes results by output format.

use crate::{
    config::OutputFormat,
    error::{Result, UpscaleError},
    services::OutputFormatHandler,
};
use image::{codecs::jpeg::JpegEncoder, RgbaImage};
use std::io::BufWriter;
use std::path::Path;

/// Service for handling image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Load an image from a file path as RGBA8
    ///
    /// The format is guessed from the extension first and from the file
    /// contents if that fails.
    ///
    /// # Errors
    /// - File does not exist or cannot be read
    /// - `ImageDecode` if the data is not a supported image
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<RgbaImage> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(UpscaleError::file_io_error(
                "read image file",
                path_ref,
                &std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }

        match image::open(path_ref) {
            Ok(img) => Ok(img.to_rgba8()),
            Err(e) => {
                tracing::debug!(
                    "Extension-based loading failed for {}: {}. Attempting content-based detection.",
                    path_ref.display(),
                    e
                );
                let data = std::fs::read(path_ref).map_err(|io_err| {
                    UpscaleError::file_io_error("read image data", path_ref, &io_err)
                })?;
                Self::load_from_bytes(&data).map_err(|content_err| {
                    UpscaleError::image_decode(format!(
                        "Failed to load {}: {e}; content detection: {content_err}",
                        path_ref.display()
                    ))
                })
            },
        }
    }

    /// Decode an image from memory as RGBA8
    ///
    /// # Errors
    /// - `ImageDecode` if the data is not a supported image
    pub fn load_from_bytes(bytes: &[u8]) -> Result<RgbaImage> {
        image::load_from_memory(bytes)
            .map(|img| img.to_rgba8())
            .map_err(|e| UpscaleError::image_decode(format!("Failed to decode image from bytes: {e}")))
    }

    /// Encode and write an image, creating the parent directory if needed
    ///
    /// `jpeg_quality` only applies to JPEG output.
    ///
    /// # Errors
    /// - Directory or file cannot be created
    /// - `ImageEncode` if encoding fails
    pub fn save_image<P: AsRef<Path>>(
        image: &RgbaImage,
        path: P,
        format: OutputFormat,
        jpeg_quality: u8,
    ) -> Result<()> {
        let path_ref = path.as_ref();

        if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                UpscaleError::file_io_error("create output directory", parent, &e)
            })?;
        }

        let encode_error = |e: image::ImageError| {
            UpscaleError::image_encode(format!(
                "Failed to save {} as {format:?}: {e}",
                path_ref.display()
            ))
        };

        match format {
            OutputFormat::Jpeg => {
                let file = std::fs::File::create(path_ref)
                    .map_err(|e| UpscaleError::file_io_error("create output file", path_ref, &e))?;
                let encoder = JpegEncoder::new_with_quality(BufWriter::new(file), jpeg_quality.min(100));
                let rgb = OutputFormatHandler::convert_format(image.clone(), format).to_rgb8();
                rgb.write_with_encoder(encoder).map_err(encode_error)
            },
            other => image
                .save_with_format(path_ref, OutputFormatHandler::image_format(other))
                .map_err(encode_error),
        }
    }

    /// Check if a file path has a supported image extension
    #[must_use]
    pub fn is_supported_format<P: AsRef<Path>>(path: P) -> bool {
        OutputFormat::from_path(path).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::TempDir;

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 10) as u8, (y * 10) as u8, 128, (x + y) as u8 * 5])
        })
    }

    #[test]
    fn test_is_supported_format() {
        assert!(ImageIOService::is_supported_format("a.PNG"));
        assert!(ImageIOService::is_supported_format("dir/b.jpeg"));
        assert!(ImageIOService::is_supported_format("c.tif"));
        assert!(!ImageIOService::is_supported_format("d.gif"));
        assert!(!ImageIOService::is_supported_format("noext"));
    }

    #[test]
    fn test_load_nonexistent_file() {
        assert!(matches!(
            ImageIOService::load_image("/definitely/not/here.png"),
            Err(UpscaleError::Io(_))
        ));
    }

    #[test]
    fn test_png_round_trip_is_lossless() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/out.png");
        let image = gradient(9, 7);

        ImageIOService::save_image(&image, &path, OutputFormat::Png, 90).unwrap();
        assert_eq!(ImageIOService::load_image(&path).unwrap(), image);
    }

    #[test]
    fn test_jpeg_output_is_opaque() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.jpg");

        ImageIOService::save_image(&gradient(16, 16), &path, OutputFormat::Jpeg, 80).unwrap();
        let loaded = ImageIOService::load_image(&path).unwrap();
        assert_eq!(loaded.dimensions(), (16, 16));
        assert!(loaded.pixels().all(|p| p.0[3] == 255));
    }

    #[test]
    fn test_content_detection_with_wrong_extension() {
        let temp_dir = TempDir::new().unwrap();
        let png_path = temp_dir.path().join("real.png");
        let disguised = temp_dir.path().join("fake.jpg");
        ImageIOService::save_image(&gradient(3, 3), &png_path, OutputFormat::Png, 90).unwrap();
        std::fs::copy(&png_path, &disguised).unwrap();

        assert_eq!(ImageIOService::load_image(&disguised).unwrap().dimensions(), (3, 3));
    }

    #[test]
    fn test_load_from_bytes_invalid() {
        assert!(matches!(
            ImageIOService::load_from_bytes(b"not an image"),
            Err(UpscaleError::ImageDecode(_))
        ));
        assert!(ImageIOService::load_from_bytes(&[]).is_err());
    }

    #[test]
    fn test_corrupt_file_is_decode_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.png");
        std::fs::write(&path, b"garbage").unwrap();
        assert!(matches!(
            ImageIOService::load_image(&path),
            Err(UpscaleError::ImageDecode(_))
        ));
    }
}
