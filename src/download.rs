//! Detector model downloading
//!
//! Streams a single ONNX file into the model cache with progress reporting.
//! The body is hashed while it is written, staged in a temporary file next to
//! the destination and only renamed into place once complete, so a partial
//! download never shadows a good model.

use crate::cache::ModelCache;
use crate::error::{FaceBlurError, Result};
use futures_util::stream::TryStreamExt;
#[cfg(feature = "cli")]
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;

/// Model downloader with progress reporting
#[derive(Debug)]
pub struct ModelDownloader {
    client: Client,
    cache: ModelCache,
}

/// Progress bar abstraction that works with and without CLI features
#[derive(Debug)]
pub enum ProgressIndicator {
    #[cfg(feature = "cli")]
    Indicatif(ProgressBar),
    NoOp,
}

impl ProgressIndicator {
    pub fn set_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_message(msg),
            Self::NoOp => {
                let _ = msg;
            },
        }
    }

    pub fn set_length(&self, len: u64) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_length(len),
            Self::NoOp => {
                let _ = len;
            },
        }
    }

    pub fn set_position(&self, pos: u64) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_position(pos),
            Self::NoOp => {
                let _ = pos;
            },
        }
    }

    pub fn finish_with_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.finish_with_message(msg),
            Self::NoOp => {
                let _ = msg;
            },
        }
    }
}

impl ModelDownloader {
    /// Create a downloader writing into the default cache
    ///
    /// # Errors
    /// - Failed to create HTTP client
    /// - Failed to initialize model cache
    pub fn new() -> Result<Self> {
        Self::with_cache(ModelCache::new()?)
    }

    /// Create a downloader writing into `cache`
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn with_cache(cache: ModelCache) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(|e| FaceBlurError::network_error("Failed to create HTTP client", e))?;

        Ok(Self { client, cache })
    }

    /// Download `url` into the cache as `file_name`, returning the cached path
    ///
    /// Already cached files are returned without touching the network.
    ///
    /// # Errors
    /// - Invalid URL
    /// - Network errors during download
    /// - File system errors during caching
    pub async fn download_model(&self, url: &str, file_name: &str, show_progress: bool) -> Result<PathBuf> {
        validate_model_url(url)?;

        let final_path = self.cache.get_model_path(file_name);
        if self.cache.is_model_cached(file_name) {
            log::info!("Model already cached: {}", final_path.display());
            return Ok(final_path);
        }

        log::info!("Downloading model from: {url}");
        let progress = if show_progress {
            Self::create_progress_indicator()
        } else {
            ProgressIndicator::NoOp
        };
        progress.set_message(format!("Downloading {file_name}"));

        let staging = tempfile::Builder::new()
            .prefix(".download-")
            .tempfile_in(self.cache.get_current_cache_dir())
            .map_err(|e| FaceBlurError::file_io_error("create staging file", self.cache.get_current_cache_dir(), &e))?
            .into_temp_path();

        let digest = match self.download_file(url, &staging, &progress).await {
            Ok(digest) => digest,
            Err(e) => {
                progress.finish_with_message("Download failed".to_string());
                return Err(e);
            },
        };

        staging
            .persist(&final_path)
            .map_err(|e| FaceBlurError::file_io_error("move downloaded model to cache", &final_path, &e.error))?;
        self.cache.write_checksum(file_name, &digest)?;

        progress.finish_with_message(format!("Downloaded {file_name}"));
        log::info!("Model cached at {} (sha256 {digest})", final_path.display());
        Ok(final_path)
    }

    fn create_progress_indicator() -> ProgressIndicator {
        #[cfg(feature = "cli")]
        {
            let pb = ProgressBar::new(0);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            ProgressIndicator::Indicatif(pb)
        }
        #[cfg(not(feature = "cli"))]
        {
            ProgressIndicator::NoOp
        }
    }

    /// Stream one URL to `local_path`, returning the body's SHA-256
    async fn download_file(&self, url: &str, local_path: &Path, progress: &ProgressIndicator) -> Result<String> {
        log::debug!("Downloading: {} -> {}", url, local_path.display());

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FaceBlurError::network_error(format!("Failed to download {url}"), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FaceBlurError::network_error(
                format!("HTTP error for {url}"),
                status,
            ));
        }

        if let Some(total) = response.content_length() {
            progress.set_length(total);
        }

        let mut file = tokio::fs::File::create(local_path)
            .await
            .map_err(|e| FaceBlurError::file_io_error("create file", local_path, &e))?;

        let mut stream = StreamReader::new(
            response
                .bytes_stream()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
        );

        let mut hasher = Sha256::new();
        let mut downloaded = 0u64;
        let mut buffer = vec![0; 64 * 1024];

        loop {
            let bytes_read = stream
                .read(&mut buffer)
                .await
                .map_err(|e| FaceBlurError::network_error("Failed to read download stream", e))?;
            if bytes_read == 0 {
                break;
            }

            let chunk = buffer.get(..bytes_read).unwrap_or(&[]);
            hasher.update(chunk);
            file.write_all(chunk)
                .await
                .map_err(|e| FaceBlurError::file_io_error("write to file", local_path, &e))?;

            downloaded += bytes_read as u64;
            progress.set_position(downloaded);
        }

        file.flush()
            .await
            .map_err(|e| FaceBlurError::file_io_error("flush file", local_path, &e))?;

        if downloaded == 0 {
            return Err(FaceBlurError::model(format!("Downloaded model from {url} is empty")));
        }

        log::debug!("Downloaded {} bytes to {}", downloaded, local_path.display());
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Get the model cache for other operations
    #[must_use]
    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }
}

/// Validate that a URL can be fetched by the downloader
///
/// # Errors
/// - Empty URL, non-HTTPS scheme, or no file component
pub fn validate_model_url(url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(FaceBlurError::invalid_config("Model URL cannot be empty"));
    }

    let Some(rest) = url.strip_prefix("https://") else {
        return Err(FaceBlurError::invalid_config(format!(
            "Unsupported URL: {url}. Models are only fetched over https://"
        )));
    };

    match rest.rsplit_once('/') {
        Some((host, file)) if !host.is_empty() && !file.is_empty() => Ok(()),
        _ => Err(FaceBlurError::invalid_config(format!(
            "Model URL must point at a file: {url}"
        ))),
    }
}
