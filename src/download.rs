//! Model download functionality
//!
//! Streams a model from an HTTP(S) URI into the [`ModelCache`]. The file is
//! written to a `.part` sibling first and renamed once complete, so an
//! interrupted download never looks cached.

use crate::cache::ModelCache;
use crate::error::{Result, UpscaleError};
use crate::models::LoadProgress;
use futures_util::stream::TryStreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;
use tracing::Instrument;

/// Model downloader backed by the local cache
#[derive(Debug)]
pub struct ModelDownloader {
    client: Client,
    cache: ModelCache,
}

impl ModelDownloader {
    /// Create a new model downloader
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new(cache: ModelCache) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(|e| UpscaleError::network_error("Failed to create HTTP client", e))?;

        Ok(Self { client, cache })
    }

    /// Ensure the model at `url` is cached and return its local path
    ///
    /// A cached copy is reused without touching the network. Progress is
    /// reported as the fraction of bytes received when the server sends a
    /// content length.
    ///
    /// # Errors
    /// - Invalid URL
    /// - Network errors or non-success HTTP status
    /// - Checksum mismatch when `expected_sha256` is given
    /// - File system errors while caching
    pub async fn download(
        &self,
        url: &str,
        expected_sha256: Option<&str>,
        progress: &dyn LoadProgress,
    ) -> Result<PathBuf> {
        validate_model_url(url)?;
        let final_path = self.cache.model_path(url);

        if self.cache.is_cached(url) {
            tracing::debug!(url = %url, path = %final_path.display(), "Model already cached");
            progress.on_progress(1.0);
            return Ok(final_path);
        }

        let span = tracing::info_span!("download", url = %url, destination = %final_path.display());
        self.fetch_into_cache(url, &final_path, expected_sha256, progress)
            .instrument(span)
            .await
    }

    async fn fetch_into_cache(
        &self,
        url: &str,
        final_path: &Path,
        expected_sha256: Option<&str>,
        progress: &dyn LoadProgress,
    ) -> Result<PathBuf> {
        let part_path = final_path.with_extension("onnx.part");
        let outcome = self.download_file(url, &part_path, progress).await.and_then(|()| {
            if let Some(expected) = expected_sha256 {
                verify_file_integrity(&part_path, expected)?;
            }
            Ok(())
        });

        match outcome {
            Ok(()) => {
                std::fs::rename(&part_path, final_path).map_err(|e| {
                    UpscaleError::file_io_error("move downloaded model to cache", final_path, &e)
                })?;
                tracing::info!(model_id = %ModelCache::url_to_model_id(url), "Model downloaded");
                Ok(final_path.to_path_buf())
            },
            Err(e) => {
                if part_path.exists() {
                    if let Err(cleanup_err) = std::fs::remove_file(&part_path) {
                        tracing::warn!("Failed to remove partial download: {}", cleanup_err);
                    }
                }
                Err(e)
            },
        }
    }

    async fn download_file(
        &self,
        url: &str,
        local_path: &Path,
        progress: &dyn LoadProgress,
    ) -> Result<()> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| UpscaleError::network_error(format!("Failed to download {url}"), e))?;

        if !response.status().is_success() {
            return Err(UpscaleError::network_error(
                format!("Failed to download {url}"),
                format!("HTTP status {}", response.status()),
            ));
        }

        let total_size = response.content_length().filter(|&n| n > 0);

        let mut file = tokio::fs::File::create(local_path)
            .await
            .map_err(|e| UpscaleError::file_io_error("create file", local_path, &e))?;

        let mut stream = StreamReader::new(
            response
                .bytes_stream()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
        );

        let mut downloaded = 0u64;
        let mut buffer = vec![0; 64 * 1024];

        loop {
            let bytes_read = stream
                .read(&mut buffer)
                .await
                .map_err(|e| UpscaleError::network_error("Failed to read download stream", e))?;

            if bytes_read == 0 {
                break;
            }

            file.write_all(buffer.get(..bytes_read).unwrap_or(&[]))
                .await
                .map_err(|e| UpscaleError::file_io_error("write to file", local_path, &e))?;

            downloaded += bytes_read as u64;
            if let Some(total) = total_size {
                progress.on_progress(downloaded as f32 / total as f32);
            }
        }

        file.flush()
            .await
            .map_err(|e| UpscaleError::file_io_error("flush file", local_path, &e))?;

        if downloaded == 0 {
            return Err(UpscaleError::network_error(
                format!("Failed to download {url}"),
                "empty response body",
            ));
        }

        tracing::debug!(
            "Downloaded {} to {}",
            crate::cache::format_size(downloaded),
            local_path.display()
        );
        Ok(())
    }

    #[must_use]
    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }
}

/// Check a file's SHA-256 against an expected hex digest
///
/// # Errors
/// - File cannot be read
/// - `Network` if the digest does not match
pub fn verify_file_integrity(file_path: &Path, expected_hash: &str) -> Result<()> {
    let contents = std::fs::read(file_path)
        .map_err(|e| UpscaleError::file_io_error("read file for verification", file_path, &e))?;

    let mut hasher = Sha256::new();
    hasher.update(&contents);
    let actual_hash = format!("{:x}", hasher.finalize());

    if actual_hash.eq_ignore_ascii_case(expected_hash.trim()) {
        Ok(())
    } else {
        Err(UpscaleError::network_error(
            format!("Integrity check failed for {}", file_path.display()),
            format!("expected {expected_hash}, got {actual_hash}"),
        ))
    }
}

/// Validate that a URL can be fetched by the downloader
///
/// # Errors
/// - Empty URL, unsupported scheme or missing host
pub fn validate_model_url(url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(UpscaleError::invalid_config("Model URL cannot be empty"));
    }

    let Some(rest) = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
    else {
        return Err(UpscaleError::invalid_config(format!(
            "Unsupported URL: {url}. Only http:// and https:// are supported"
        )));
    };

    let host = rest.split('/').next().unwrap_or_default();
    if host.is_empty() {
        return Err(UpscaleError::invalid_config(format!(
            "Model URL has no host: {url}"
        )));
    }

    Ok(())
}
