//! Model cache management for downloaded detector models
//!
//! Models live as flat files in an XDG-compliant cache directory, each with an
//! optional `<file>.sha256` sidecar holding the hex digest recorded at
//! download time.

use crate::error::{FaceBlurError, Result};
use log::{debug, warn};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Environment variable overriding the cache root
pub const CACHE_DIR_ENV: &str = "FACEBLUR_CACHE_DIR";

/// Extension of the integrity sidecar written next to each model
const CHECKSUM_EXTENSION: &str = "sha256";

/// Information about a cached model file
#[derive(Debug, Clone)]
pub struct CachedModelInfo {
    /// File name inside the cache directory
    pub file_name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Whether a checksum sidecar exists next to the model
    pub has_checksum: bool,
}

/// Model cache manager
#[derive(Debug)]
pub struct ModelCache {
    cache_dir: PathBuf,
}

impl ModelCache {
    /// Create a new model cache manager
    ///
    /// Uses XDG Base Directory specification for cache location:
    /// - Linux: `~/.cache/faceblur/models/`
    /// - macOS: `~/Library/Caches/faceblur/models/`
    /// - Windows: `%LOCALAPPDATA%/faceblur/models/`
    ///
    /// # Errors
    /// - Failed to determine cache directory
    /// - Failed to create cache directory
    pub fn new() -> Result<Self> {
        let cache_dir = Self::get_cache_dir()?;

        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir)
                .map_err(|e| FaceBlurError::file_io_error("create cache directory", &cache_dir, &e))?;
        }

        Ok(Self { cache_dir })
    }

    /// Create a model cache rooted at a custom directory
    ///
    /// # Errors
    /// - Failed to create cache directory
    pub fn with_custom_cache_dir(cache_dir: &Path) -> Result<Self> {
        let models_dir = cache_dir.join("models");

        if !models_dir.exists() {
            fs::create_dir_all(&models_dir)
                .map_err(|e| FaceBlurError::file_io_error("create custom cache directory", &models_dir, &e))?;
        }

        Ok(Self {
            cache_dir: models_dir,
        })
    }

    fn get_cache_dir() -> Result<PathBuf> {
        if let Ok(cache_override) = std::env::var(CACHE_DIR_ENV) {
            return Ok(PathBuf::from(cache_override).join("models"));
        }

        Ok(dirs::cache_dir()
            .ok_or_else(|| {
                FaceBlurError::invalid_config(format!(
                    "Failed to determine cache directory. Set {CACHE_DIR_ENV} environment variable."
                ))
            })?
            .join("faceblur")
            .join("models"))
    }

    /// Get the current cache directory path
    #[must_use]
    pub fn get_current_cache_dir(&self) -> &PathBuf {
        &self.cache_dir
    }

    /// Path a model file would occupy in the cache
    #[must_use]
    pub fn get_model_path(&self, file_name: &str) -> PathBuf {
        self.cache_dir.join(file_name)
    }

    /// Path of the checksum sidecar for `file_name`
    #[must_use]
    pub fn checksum_path(&self, file_name: &str) -> PathBuf {
        self.cache_dir.join(format!("{file_name}.{CHECKSUM_EXTENSION}"))
    }

    /// Check if a non-empty model file is cached
    #[must_use]
    pub fn is_model_cached(&self, file_name: &str) -> bool {
        fs::metadata(self.get_model_path(file_name))
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false)
    }

    /// Record the digest of a freshly cached model
    ///
    /// # Errors
    /// - Failed to write the sidecar file
    pub fn write_checksum(&self, file_name: &str, hex_digest: &str) -> Result<()> {
        let path = self.checksum_path(file_name);
        fs::write(&path, format!("{hex_digest}\n"))
            .map_err(|e| FaceBlurError::file_io_error("write checksum", &path, &e))
    }

    /// Compare a cached model against its sidecar
    ///
    /// Returns `Ok(true)` when the digests match or no sidecar was recorded.
    ///
    /// # Errors
    /// - Model or sidecar cannot be read
    pub fn verify_model(&self, file_name: &str) -> Result<bool> {
        let checksum_path = self.checksum_path(file_name);
        if !checksum_path.exists() {
            warn!("No checksum recorded for {file_name}, skipping integrity check");
            return Ok(true);
        }

        let expected = fs::read_to_string(&checksum_path)
            .map_err(|e| FaceBlurError::file_io_error("read checksum", &checksum_path, &e))?;
        let actual = sha256_file(&self.get_model_path(file_name))?;
        let matches = expected.trim().eq_ignore_ascii_case(&actual);

        if matches {
            debug!("Checksum verified for {file_name}");
        } else {
            warn!(
                "Checksum mismatch for {file_name}: expected {}, got {actual}",
                expected.trim()
            );
        }
        Ok(matches)
    }

    /// List cached model files, sorted by name
    ///
    /// # Errors
    /// - Failed to read the cache directory
    pub fn scan_cached_models(&self) -> Result<Vec<CachedModelInfo>> {
        let mut models = Vec::new();
        if !self.cache_dir.exists() {
            return Ok(models);
        }

        let entries = fs::read_dir(&self.cache_dir)
            .map_err(|e| FaceBlurError::file_io_error("read cache directory", &self.cache_dir, &e))?;

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) == Some(CHECKSUM_EXTENSION) {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };

            let size_bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);
            models.push(CachedModelInfo {
                has_checksum: self.checksum_path(&file_name).exists(),
                file_name,
                path,
                size_bytes,
            });
        }

        models.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(models)
    }

    /// Remove a cached model and its sidecar; returns whether the model existed
    ///
    /// # Errors
    /// - Failed to delete an existing file
    pub fn clear_model(&self, file_name: &str) -> Result<bool> {
        let model_path = self.get_model_path(file_name);
        let existed = model_path.exists();
        if existed {
            fs::remove_file(&model_path)
                .map_err(|e| FaceBlurError::file_io_error("remove cached model", &model_path, &e))?;
        }

        let checksum_path = self.checksum_path(file_name);
        if checksum_path.exists() {
            fs::remove_file(&checksum_path)
                .map_err(|e| FaceBlurError::file_io_error("remove checksum", &checksum_path, &e))?;
        }
        Ok(existed)
    }
}

/// Hex SHA-256 digest of a file, streamed in chunks
///
/// # Errors
/// - File cannot be opened or read
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path).map_err(|e| FaceBlurError::file_io_error("open for hashing", path, &e))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];

    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|e| FaceBlurError::file_io_error("read for hashing", path, &e))?;
        if read == 0 {
            break;
        }
        hasher.update(buffer.get(..read).unwrap_or_default());
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Format file size in human-readable format
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    #[allow(clippy::cast_precision_loss)]
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

    fn cache() -> (TempDir, ModelCache) {
        let temp_dir = TempDir::new().unwrap();
        let cache = ModelCache::with_custom_cache_dir(temp_dir.path()).unwrap();
        (temp_dir, cache)
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
    }

    #[test]
    fn test_custom_cache_dir() {
        let (temp_dir, cache) = cache();
        assert_eq!(cache.get_current_cache_dir(), &temp_dir.path().join("models"));
        assert!(cache.get_current_cache_dir().exists());
    }

    #[test]
    fn test_is_model_cached() {
        let (_temp_dir, cache) = cache();
        assert!(!cache.is_model_cached("model.onnx"));

        fs::write(cache.get_model_path("empty.onnx"), b"").unwrap();
        assert!(!cache.is_model_cached("empty.onnx"));

        fs::write(cache.get_model_path("model.onnx"), b"onnx").unwrap();
        assert!(cache.is_model_cached("model.onnx"));
    }

    #[test]
    fn test_checksum_round_trip() {
        let (_temp_dir, cache) = cache();
        let path = cache.get_model_path("model.onnx");
        fs::write(&path, b"model bytes").unwrap();

        // No sidecar yet: accepted
        assert!(cache.verify_model("model.onnx").unwrap());

        let digest = sha256_file(&path).unwrap();
        cache.write_checksum("model.onnx", &digest).unwrap();
        assert!(cache.verify_model("model.onnx").unwrap());

        fs::write(&path, b"tampered").unwrap();
        assert!(!cache.verify_model("model.onnx").unwrap());
    }

    #[test]
    fn test_sha256_known_value() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("abc.txt");
        fs::write(&path, b"abc").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_scan_skips_checksums() {
        let (_temp_dir, cache) = cache();
        fs::write(cache.get_model_path("b.onnx"), b"bb").unwrap();
        fs::write(cache.get_model_path("a.onnx"), b"a").unwrap();
        cache.write_checksum("a.onnx", "00").unwrap();

        let models = cache.scan_cached_models().unwrap();
        let names: Vec<_> = models.iter().map(|m| m.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.onnx", "b.onnx"]);
        assert!(models[0].has_checksum);
        assert!(!models[1].has_checksum);
        assert_eq!(models[1].size_bytes, 2);
    }

    #[test]
    fn test_clear_model() {
        let (_temp_dir, cache) = cache();
        fs::write(cache.get_model_path("model.onnx"), b"x").unwrap();
        cache.write_checksum("model.onnx", "00").unwrap();

        assert!(cache.clear_model("model.onnx").unwrap());
        assert!(!cache.checksum_path("model.onnx").exists());
        assert!(!cache.clear_model("model.onnx").unwrap());
    }
}
