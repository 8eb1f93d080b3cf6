//! Model specification and loading
//!
//! A model is an ONNX artifact read from disk or fetched from an HTTP(S)
//! URI into the local cache. Its tensor contract is described by a
//! [`TensorLayout`] so backends never branch on model names.

use crate::cache::ModelCache;
use crate::download::ModelDownloader;
use crate::error::{Result, UpscaleError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Where a model artifact comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSource {
    /// Local ONNX file
    Path(PathBuf),
    /// `http://` or `https://` URI, downloaded into the cache on first use
    Url(String),
}

impl ModelSource {
    /// Interpret a command-line model argument
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.starts_with("http://") || value.starts_with("https://") {
            Self::Url(value.to_string())
        } else {
            Self::Path(PathBuf::from(value))
        }
    }

    /// Get a display name for the model source
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Self::Path(path) => path
                .file_name()
                .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned()),
            Self::Url(url) => url.rsplit('/').next().unwrap_or(url).to_string(),
        }
    }
}

/// Tensor contract of a model family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TensorLayout {
    /// `[1, 3, h, w]` RGB planes with values in `0..=1`
    #[default]
    NchwUnit,
    /// `[1, h, w, 3]` interleaved RGB with values in `0..=1`
    NhwcUnit,
    /// `[1, 3, h, w]` RGB planes with values in `0..=255`
    NchwByte,
}

impl TensorLayout {
    /// Tensor shape for a `width`x`height` RGB input
    #[must_use]
    pub fn input_shape(self, width: usize, height: usize) -> [usize; 4] {
        match self {
            Self::NchwUnit | Self::NchwByte => [1, 3, height, width],
            Self::NhwcUnit => [1, height, width, 3],
        }
    }

    /// Value of full intensity in the tensor domain
    #[must_use]
    pub fn scale(self) -> f32 {
        match self {
            Self::NchwUnit | Self::NhwcUnit => 1.0,
            Self::NchwByte => 255.0,
        }
    }

    #[must_use]
    pub fn is_channels_last(self) -> bool {
        matches!(self, Self::NhwcUnit)
    }
}

impl std::str::FromStr for TensorLayout {
    type Err = UpscaleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "nchw-unit" | "nchw" => Ok(Self::NchwUnit),
            "nhwc-unit" | "nhwc" => Ok(Self::NhwcUnit),
            "nchw-byte" => Ok(Self::NchwByte),
            other => Err(UpscaleError::invalid_config(format!(
                "Unknown tensor layout: {other}. Supported: nchw-unit, nhwc-unit, nchw-byte"
            ))),
        }
    }
}

/// Model artifact plus its tensor contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub source: ModelSource,
    #[serde(default)]
    pub layout: TensorLayout,
    /// Expected SHA-256 of the artifact (hex), checked after download
    #[serde(default)]
    pub sha256: Option<String>,
}

impl ModelSpec {
    /// Spec with the default layout and no checksum
    #[must_use]
    pub fn new(source: ModelSource) -> Self {
        Self {
            source,
            layout: TensorLayout::default(),
            sha256: None,
        }
    }

    #[must_use]
    pub fn with_layout(mut self, layout: TensorLayout) -> Self {
        self.layout = layout;
        self
    }
}

/// Loaded model bytes ready to hand to a backend
#[derive(Clone)]
pub struct ModelData {
    pub name: String,
    pub bytes: Vec<u8>,
    pub layout: TensorLayout,
}

impl std::fmt::Debug for ModelData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelData")
            .field("name", &self.name)
            .field("size_bytes", &self.bytes.len())
            .field("layout", &self.layout)
            .finish()
    }
}

/// Receives model load progress as a fraction in `0.0..=1.0`
pub trait LoadProgress: Send + Sync {
    fn on_progress(&self, fraction: f32);
}

/// Discards load progress
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpLoadProgress;

impl LoadProgress for NoOpLoadProgress {
    fn on_progress(&self, _fraction: f32) {}
}

/// Forwards clamped, never-decreasing progress to an inner reporter
pub struct MonotonicProgress<'a> {
    inner: &'a dyn LoadProgress,
    last: Mutex<Option<f32>>,
}

impl<'a> MonotonicProgress<'a> {
    #[must_use]
    pub fn new(inner: &'a dyn LoadProgress) -> Self {
        Self {
            inner,
            last: Mutex::new(None),
        }
    }
}

impl LoadProgress for MonotonicProgress<'_> {
    fn on_progress(&self, fraction: f32) {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        let Ok(mut last) = self.last.lock() else {
            return;
        };
        match *last {
            Some(previous) if fraction <= previous => {},
            _ => {
                *last = Some(fraction);
                self.inner.on_progress(fraction);
            },
        }
    }
}

/// Resolves a [`ModelSpec`] to bytes
#[derive(Debug)]
pub struct ModelLoader {
    cache_dir: Option<PathBuf>,
}

impl ModelLoader {
    /// Loader using the platform cache directory, or `cache_dir` when set
    #[must_use]
    pub fn new(cache_dir: Option<PathBuf>) -> Self {
        Self { cache_dir }
    }

    /// Read the model, downloading it first when the source is a URI
    ///
    /// Progress starts at 0 and ends at 1 on success.
    ///
    /// # Errors
    /// - `ModelLoad` if the file cannot be read or is empty
    /// - `Network` if the download fails
    pub async fn load(&self, spec: &ModelSpec, progress: &dyn LoadProgress) -> Result<ModelData> {
        let progress = MonotonicProgress::new(progress);
        progress.on_progress(0.0);

        let path = match &spec.source {
            ModelSource::Path(path) => path.clone(),
            ModelSource::Url(url) => {
                let cache = ModelCache::new(self.cache_dir.as_deref())?;
                let downloader = ModelDownloader::new(cache)?;
                downloader
                    .download(url, spec.sha256.as_deref(), &progress)
                    .await?
            },
        };

        let bytes = read_model_file(&path).await?;
        progress.on_progress(1.0);

        tracing::info!(
            model = %spec.source.display_name(),
            size = %crate::cache::format_size(bytes.len() as u64),
            layout = ?spec.layout,
            "Model loaded"
        );

        Ok(ModelData {
            name: spec.source.display_name(),
            bytes,
            layout: spec.layout,
        })
    }
}

async fn read_model_file(path: &Path) -> Result<Vec<u8>> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        UpscaleError::model_load(format!("Failed to read model '{}': {e}", path.display()))
    })?;
    if bytes.is_empty() {
        return Err(UpscaleError::model_load(format!(
            "Model file '{}' is empty",
            path.display()
        )));
    }
    Ok(bytes)
}
