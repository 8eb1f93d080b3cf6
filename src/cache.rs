//! Model cache management for downloaded models
//!
//! Downloaded models live in a flat directory, one `<id>.onnx` file per
//! source URI, where the id is derived from the URI's SHA-256.

use crate::error::{Result, UpscaleError};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the cache root
pub const CACHE_DIR_ENV: &str = "IMGLY_UPSCALE_CACHE_DIR";

const MODEL_EXTENSION: &str = "onnx";

/// Information about a cached model
#[derive(Debug, Clone)]
pub struct CachedModelInfo {
    /// Model identifier (derived from URL)
    pub model_id: String,
    /// Path to the cached model file
    pub path: PathBuf,
    /// Size of the model file in bytes
    pub size_bytes: u64,
}

/// Model cache manager
#[derive(Debug, Clone)]
pub struct ModelCache {
    cache_dir: PathBuf,
}

impl ModelCache {
    /// Open the model cache, creating its directory if needed
    ///
    /// With `custom_dir` the cache lives in `<custom_dir>/models`. Otherwise
    /// `$IMGLY_UPSCALE_CACHE_DIR/models` or the platform cache directory
    /// (`~/.cache/imgly-upscale/models` on Linux) is used.
    ///
    /// # Errors
    /// - Failed to determine cache directory
    /// - Failed to create cache directory
    pub fn new(custom_dir: Option<&Path>) -> Result<Self> {
        let cache_dir = match custom_dir {
            Some(dir) => dir.join("models"),
            None => Self::default_cache_dir()?,
        };

        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir).map_err(|e| {
                UpscaleError::file_io_error("create cache directory", &cache_dir, &e)
            })?;
        }

        Ok(Self { cache_dir })
    }

    fn default_cache_dir() -> Result<PathBuf> {
        if let Ok(cache_override) = std::env::var(CACHE_DIR_ENV) {
            return Ok(PathBuf::from(cache_override).join("models"));
        }

        Ok(dirs::cache_dir()
            .ok_or_else(|| {
                UpscaleError::invalid_config(format!(
                    "Failed to determine cache directory. Set {CACHE_DIR_ENV} environment variable."
                ))
            })?
            .join("imgly-upscale")
            .join("models"))
    }

    /// Derive a cache-safe identifier from a URL
    ///
    /// ```
    /// use imgly_upscale::cache::ModelCache;
    ///
    /// let id = ModelCache::url_to_model_id("https://example.com/x2.onnx");
    /// assert_eq!(id.len(), 16);
    /// assert_eq!(id, ModelCache::url_to_model_id("https://example.com/x2.onnx"));
    /// ```
    #[must_use]
    pub fn url_to_model_id(url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        let hash = format!("{:x}", hasher.finalize());
        hash.get(..16).unwrap_or(&hash).to_string()
    }

    /// Path where the model for `url` is (or will be) cached
    #[must_use]
    pub fn model_path(&self, url: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}.{MODEL_EXTENSION}", Self::url_to_model_id(url)))
    }

    /// Whether a non-empty cached file exists for `url`
    #[must_use]
    pub fn is_cached(&self, url: &str) -> bool {
        fs::metadata(self.model_path(url)).is_ok_and(|meta| meta.is_file() && meta.len() > 0)
    }

    /// List all cached models
    ///
    /// # Errors
    /// - Failed to read cache directory
    pub fn scan_cached_models(&self) -> Result<Vec<CachedModelInfo>> {
        let entries = fs::read_dir(&self.cache_dir)
            .map_err(|e| UpscaleError::file_io_error("read cache directory", &self.cache_dir, &e))?;

        let mut models = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                UpscaleError::file_io_error("read cache entry", &self.cache_dir, &e)
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(MODEL_EXTENSION) {
                continue;
            }
            let Some(model_id) = path.file_stem().and_then(|s| s.to_str()).map(String::from)
            else {
                continue;
            };
            let size_bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);
            models.push(CachedModelInfo {
                model_id,
                path,
                size_bytes,
            });
        }

        models.sort_by(|a, b| a.model_id.cmp(&b.model_id));
        Ok(models)
    }

    /// Remove every cached model, returning the removed ids
    ///
    /// # Errors
    /// - Failed to read the cache or remove a file
    pub fn clear_all_models(&self) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for model in self.scan_cached_models()? {
            fs::remove_file(&model.path)
                .map_err(|e| UpscaleError::file_io_error("remove cached model", &model.path, &e))?;
            tracing::debug!(model_id = %model.model_id, "Removed cached model");
            removed.push(model.model_id);
        }
        Ok(removed)
    }

    /// Remove the cached model for `url`, returning whether it existed
    ///
    /// # Errors
    /// - Failed to remove the file
    pub fn clear_model(&self, url: &str) -> Result<bool> {
        let path = self.model_path(url);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)
            .map_err(|e| UpscaleError::file_io_error("remove cached model", &path, &e))?;
        Ok(true)
    }

    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

/// Format file size in human-readable format
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS.get(unit_index).unwrap_or(&"B"))
    } else {
        format!("{:.1} {}", size, UNITS.get(unit_index).unwrap_or(&"B"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_url_to_model_id() {
        let a = ModelCache::url_to_model_id("https://example.com/x2.onnx");
        let b = ModelCache::url_to_model_id("https://example.com/x4.onnx");
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
    }

    #[test]
    fn test_custom_cache_dir() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ModelCache::new(Some(temp_dir.path())).unwrap();
        assert_eq!(cache.cache_dir(), temp_dir.path().join("models"));
        assert!(cache.cache_dir().exists());
    }

    #[test]
    fn test_cache_lookup_scan_and_clear() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ModelCache::new(Some(temp_dir.path())).unwrap();
        let url = "https://example.com/x2.onnx";

        assert!(!cache.is_cached(url));
        fs::write(cache.model_path(url), b"model").unwrap();
        fs::write(cache.cache_dir().join("notes.txt"), b"ignored").unwrap();
        assert!(cache.is_cached(url));

        let models = cache.scan_cached_models().unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].model_id, ModelCache::url_to_model_id(url));
        assert_eq!(models[0].size_bytes, 5);

        assert!(cache.clear_model(url).unwrap());
        assert!(!cache.clear_model(url).unwrap());

        fs::write(cache.model_path(url), b"model").unwrap();
        assert_eq!(cache.clear_all_models().unwrap().len(), 1);
        assert!(cache.scan_cached_models().unwrap().is_empty());
    }

    #[test]
    fn test_empty_file_is_not_cached() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ModelCache::new(Some(temp_dir.path())).unwrap();
        let url = "https://example.com/partial.onnx";
        fs::write(cache.model_path(url), b"").unwrap();
        assert!(!cache.is_cached(url));
    }
}
