//! Configuration types for upscaling operations

use crate::error::{Result, UpscaleError};
use crate::models::ModelSpec;
use crate::tiling::{DEFAULT_CHUNK_SIZE, DEFAULT_PAD_SIZE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon GPU acceleration
    CoreMl,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

/// Inference backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// ONNX Runtime backend (supports GPU acceleration)
    #[default]
    Onnx,
    /// Tract backend (pure Rust, no external dependencies)
    Tract,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Onnx => write!(f, "onnx"),
            Self::Tract => write!(f, "tract"),
        }
    }
}

/// Output image format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// PNG with alpha channel
    #[default]
    Png,
    /// JPEG (no transparency, alpha is dropped)
    Jpeg,
    /// Lossless WebP with alpha channel
    WebP,
    /// TIFF with alpha channel
    Tiff,
    /// BMP with alpha channel
    Bmp,
}

impl OutputFormat {
    /// Map a file extension (case-insensitive, without the dot) to a format
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            "tif" | "tiff" => Some(Self::Tiff),
            "bmp" => Some(Self::Bmp),
            _ => None,
        }
    }

    /// Format implied by a path's extension
    #[must_use]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

/// Overall scale factor of an upscale run
///
/// Every pass doubles both dimensions, so `X4` and `X8` run two and three
/// passes respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpscaleFactor {
    #[default]
    X2,
    X4,
    X8,
}

impl UpscaleFactor {
    /// Number of doubling passes
    #[must_use]
    pub fn passes(self) -> u32 {
        match self {
            Self::X2 => 1,
            Self::X4 => 2,
            Self::X8 => 3,
        }
    }

    /// Linear magnification (`2^passes`)
    #[must_use]
    pub fn multiplier(self) -> u32 {
        1 << self.passes()
    }

    /// Parse a linear magnification (2, 4 or 8)
    ///
    /// # Errors
    /// - Any other value
    pub fn from_multiplier(multiplier: u32) -> Result<Self> {
        match multiplier {
            2 => Ok(Self::X2),
            4 => Ok(Self::X4),
            8 => Ok(Self::X8),
            other => Err(UpscaleError::config_value_error(
                "scale",
                other,
                "2, 4 or 8",
                Some(2),
            )),
        }
    }
}

impl std::fmt::Display for UpscaleFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x", self.multiplier())
    }
}

/// Tile grid parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TilingConfig {
    /// Nominal tile edge length in source pixels
    pub chunk_size: u32,
    /// Context margin around each tile in source pixels
    pub pad_size: u32,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            pad_size: DEFAULT_PAD_SIZE,
        }
    }
}

/// Configuration for upscale operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpscaleConfig {
    /// Model artifact and its tensor contract
    pub model: Option<ModelSpec>,

    /// Inference backend
    pub backend: BackendType,

    /// Execution provider for ONNX Runtime
    pub execution_provider: ExecutionProvider,

    /// Tile grid parameters
    pub tiling: TilingConfig,

    /// Overall scale factor
    pub factor: UpscaleFactor,

    /// Tiles in flight at once within a pass (1 = sequential)
    pub workers: usize,

    /// Inference sessions held by the ONNX backend
    pub sessions: usize,

    /// Per-tile inference deadline in milliseconds
    pub tile_timeout_ms: Option<u64>,

    /// Number of intra-op threads for inference (0 = auto)
    pub intra_threads: usize,

    /// Output format override (None = keep the input's format)
    pub output_format: Option<OutputFormat>,

    /// JPEG quality (0-100, only used for JPEG output)
    pub jpeg_quality: u8,

    /// Model cache directory override
    pub cache_dir: Option<PathBuf>,
}

impl Default for UpscaleConfig {
    fn default() -> Self {
        Self {
            model: None,
            backend: BackendType::default(),
            execution_provider: ExecutionProvider::default(),
            tiling: TilingConfig::default(),
            factor: UpscaleFactor::default(),
            workers: 1,
            sessions: 1,
            tile_timeout_ms: None,
            intra_threads: 0,
            output_format: None,
            jpeg_quality: 90,
            cache_dir: None,
        }
    }
}

impl UpscaleConfig {
    /// Create a new configuration builder
    ///
    /// ```rust
    /// use imgly_upscale::{UpscaleConfig, UpscaleFactor};
    ///
    /// let config = UpscaleConfig::builder()
    ///     .factor(UpscaleFactor::X4)
    ///     .workers(2)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.factor.passes(), 2);
    /// ```
    #[must_use]
    pub fn builder() -> UpscaleConfigBuilder {
        UpscaleConfigBuilder::default()
    }

    /// Load a configuration from a JSON file
    ///
    /// Missing fields take their default values. The result is validated.
    ///
    /// # Errors
    /// - File cannot be read
    /// - Malformed JSON
    /// - Invalid parameter values
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| UpscaleError::file_io_error("read config file", path, &e))?;
        let config: Self = serde_json::from_str(&contents).map_err(|e| {
            UpscaleError::invalid_config(format!("Malformed config '{}': {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON
    ///
    /// # Errors
    /// - Serialization or write failure
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| UpscaleError::internal(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, json)
            .map_err(|e| UpscaleError::file_io_error("write config file", path, &e))
    }

    /// Per-tile deadline, if configured
    #[must_use]
    pub fn tile_timeout(&self) -> Option<std::time::Duration> {
        self.tile_timeout_ms.map(std::time::Duration::from_millis)
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - `chunk_size`, `workers` or `sessions` is zero
    /// - `tile_timeout_ms` is zero
    /// - JPEG quality above 100
    pub fn validate(&self) -> Result<()> {
        if self.tiling.chunk_size == 0 {
            return Err(UpscaleError::config_value_error(
                "chunk_size",
                self.tiling.chunk_size,
                ">= 1",
                Some(DEFAULT_CHUNK_SIZE),
            ));
        }

        if self.workers == 0 {
            return Err(UpscaleError::config_value_error(
                "workers",
                self.workers,
                ">= 1",
                Some(1),
            ));
        }

        if self.sessions == 0 {
            return Err(UpscaleError::config_value_error(
                "sessions",
                self.sessions,
                ">= 1",
                Some(1),
            ));
        }

        if self.tile_timeout_ms == Some(0) {
            return Err(UpscaleError::invalid_config(
                "tile_timeout_ms must be positive when set",
            ));
        }

        if self.jpeg_quality > 100 {
            return Err(UpscaleError::config_value_error(
                "JPEG quality",
                self.jpeg_quality,
                "0-100",
                Some(90),
            ));
        }

        Ok(())
    }
}

/// Builder for `UpscaleConfig`
#[derive(Debug, Default)]
pub struct UpscaleConfigBuilder {
    config: UpscaleConfig,
}

impl UpscaleConfigBuilder {
    /// Start from an existing configuration, e.g. one loaded from a file
    #[must_use]
    pub fn from_config(config: UpscaleConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn model(mut self, model: ModelSpec) -> Self {
        self.config.model = Some(model);
        self
    }

    #[must_use]
    pub fn backend(mut self, backend: BackendType) -> Self {
        self.config.backend = backend;
        self
    }

    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    #[must_use]
    pub fn chunk_size(mut self, chunk_size: u32) -> Self {
        self.config.tiling.chunk_size = chunk_size;
        self
    }

    #[must_use]
    pub fn pad_size(mut self, pad_size: u32) -> Self {
        self.config.tiling.pad_size = pad_size;
        self
    }

    #[must_use]
    pub fn factor(mut self, factor: UpscaleFactor) -> Self {
        self.config.factor = factor;
        self
    }

    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    #[must_use]
    pub fn sessions(mut self, sessions: usize) -> Self {
        self.config.sessions = sessions;
        self
    }

    #[must_use]
    pub fn tile_timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
        self.config.tile_timeout_ms = timeout_ms;
        self
    }

    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    #[must_use]
    pub fn output_format(mut self, format: Option<OutputFormat>) -> Self {
        self.config.output_format = format;
        self
    }

    /// Set JPEG quality, clamped to 100
    #[must_use]
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.min(100);
        self
    }

    #[must_use]
    pub fn cache_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.config.cache_dir = dir;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// - Any check of [`UpscaleConfig::validate`] fails
    pub fn build(self) -> Result<UpscaleConfig> {
        let config = self.config;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ModelSource, TensorLayout};
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = UpscaleConfig::default();
        assert_eq!(config.tiling.chunk_size, 1024);
        assert_eq!(config.tiling.pad_size, 32);
        assert_eq!(config.factor, UpscaleFactor::X2);
        assert_eq!(config.workers, 1);
        assert_eq!(config.jpeg_quality, 90);
        assert!(config.model.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = UpscaleConfig::builder()
            .backend(BackendType::Tract)
            .chunk_size(256)
            .pad_size(8)
            .factor(UpscaleFactor::X8)
            .workers(4)
            .tile_timeout_ms(Some(5_000))
            .jpeg_quality(150)
            .build()
            .unwrap();

        assert_eq!(config.backend, BackendType::Tract);
        assert_eq!(config.tiling, TilingConfig { chunk_size: 256, pad_size: 8 });
        assert_eq!(config.factor.passes(), 3);
        assert_eq!(config.workers, 4);
        assert_eq!(config.tile_timeout(), Some(std::time::Duration::from_secs(5)));
        assert_eq!(config.jpeg_quality, 100);
    }

    #[test]
    fn test_config_validation() {
        assert!(UpscaleConfig::builder().chunk_size(0).build().is_err());
        assert!(UpscaleConfig::builder().workers(0).build().is_err());
        assert!(UpscaleConfig::builder().sessions(0).build().is_err());
        assert!(UpscaleConfig::builder().tile_timeout_ms(Some(0)).build().is_err());

        let mut config = UpscaleConfig::default();
        config.jpeg_quality = 101;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("JPEG quality"));
        assert!(err.to_string().contains("101"));
    }

    #[test]
    fn test_upscale_factor() {
        assert_eq!(UpscaleFactor::X2.passes(), 1);
        assert_eq!(UpscaleFactor::X4.passes(), 2);
        assert_eq!(UpscaleFactor::X8.multiplier(), 8);
        assert_eq!(UpscaleFactor::from_multiplier(4).unwrap(), UpscaleFactor::X4);
        assert!(UpscaleFactor::from_multiplier(3).is_err());
        assert_eq!(UpscaleFactor::X4.to_string(), "4x");
    }

    #[test]
    fn test_output_format_from_extension() {
        assert_eq!(OutputFormat::from_extension("PNG"), Some(OutputFormat::Png));
        assert_eq!(OutputFormat::from_extension("jpeg"), Some(OutputFormat::Jpeg));
        assert_eq!(OutputFormat::from_path("a/b.tif"), Some(OutputFormat::Tiff));
        assert_eq!(OutputFormat::from_path("a/b"), None);
        assert_eq!(OutputFormat::from_extension("gif"), None);
    }

    #[test]
    fn test_execution_provider_display() {
        assert_eq!(ExecutionProvider::default(), ExecutionProvider::Auto);
        assert_eq!(ExecutionProvider::CoreMl.to_string(), "coreml");
        assert_eq!(BackendType::Tract.to_string(), "tract");
    }

    #[test]
    fn test_json_file_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("upscale.json");

        let config = UpscaleConfig::builder()
            .model(ModelSpec {
                source: ModelSource::Url("https://example.com/x2.onnx".to_string()),
                layout: TensorLayout::NhwcUnit,
                sha256: None,
            })
            .factor(UpscaleFactor::X4)
            .output_format(Some(OutputFormat::WebP))
            .build()
            .unwrap();

        config.to_json_file(&path).unwrap();
        let loaded = UpscaleConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("partial.json");
        std::fs::write(&path, r#"{ "factor": "x8", "tiling": { "chunk_size": 512 } }"#).unwrap();

        let config = UpscaleConfig::from_json_file(&path).unwrap();
        assert_eq!(config.factor, UpscaleFactor::X8);
        assert_eq!(config.tiling.chunk_size, 512);
        assert_eq!(config.tiling.pad_size, 32);
        assert_eq!(config.workers, 1);
    }

    #[test]
    fn test_invalid_json_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            UpscaleConfig::from_json_file(&path),
            Err(UpscaleError::InvalidConfig(_))
        ));

        std::fs::write(&path, r#"{ "workers": 0 }"#).unwrap();
        assert!(UpscaleConfig::from_json_file(&path).is_err());

        assert!(matches!(
            UpscaleConfig::from_json_file(temp_dir.path().join("missing.json")),
            Err(UpscaleError::Io(_))
        ));
    }
}
