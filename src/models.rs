//! Detector model resolution and loading

use crate::cache::ModelCache;
use crate::error::{FaceBlurError, Result};
use std::fs;
use std::path::PathBuf;

/// File name of the default detector in the cache
pub const DEFAULT_MODEL_FILE: &str = "version-RFB-320.onnx";

/// Download location of the default detector (UltraFace RFB-320)
pub const DEFAULT_MODEL_URL: &str =
    "https://github.com/onnx/models/raw/main/validated/vision/body_analysis/ultraface/models/version-RFB-320.onnx";

/// NCHW input shape of the default detector
///
/// Other UltraFace variants need a matching `DetectorConfig::input_size`.
pub const DEFAULT_INPUT_SHAPE: (usize, usize, usize, usize) = (1, 3, 240, 320);

/// Where detector weights come from
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ModelSource {
    /// ONNX file at an explicit filesystem path
    External(PathBuf),
    /// File name inside the model cache
    Cached(String),
}

impl Default for ModelSource {
    fn default() -> Self {
        Self::Cached(DEFAULT_MODEL_FILE.to_string())
    }
}

impl ModelSource {
    /// Get a display name for tracing and logging
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Self::External(path) => format!(
                "external:{}",
                path.file_name().unwrap_or_default().to_string_lossy()
            ),
            Self::Cached(file_name) => format!("cached:{file_name}"),
        }
    }
}

/// Model information and metadata
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Resolves a [`ModelSource`] to a file and loads its bytes
#[derive(Debug, Clone)]
pub struct ModelManager {
    source: ModelSource,
    path: PathBuf,
}

impl ModelManager {
    /// Resolve `source` against the default cache
    ///
    /// # Errors
    /// - Cache directory cannot be determined
    /// - Model file does not exist
    pub fn from_source(source: &ModelSource) -> Result<Self> {
        match source {
            ModelSource::External(path) => Self::with_external_model(path.clone()),
            ModelSource::Cached(file_name) => Self::with_cached_model(&ModelCache::new()?, file_name),
        }
    }

    /// Use an ONNX file at an explicit path
    ///
    /// # Errors
    /// - Path does not exist or is not a file
    pub fn with_external_model(path: PathBuf) -> Result<Self> {
        if !path.is_file() {
            return Err(FaceBlurError::model(format!(
                "Model file not found: {}",
                path.display()
            )));
        }
        Ok(Self {
            source: ModelSource::External(path.clone()),
            path,
        })
    }

    /// Use a model previously downloaded into `cache`
    ///
    /// # Errors
    /// - Model missing from the cache
    /// - Model fails its recorded checksum
    pub fn with_cached_model(cache: &ModelCache, file_name: &str) -> Result<Self> {
        if !cache.is_model_cached(file_name) {
            return Err(FaceBlurError::model(format!(
                "Model '{file_name}' is not cached in {}. Run with --download-model first.",
                cache.get_current_cache_dir().display()
            )));
        }
        if !cache.verify_model(file_name)? {
            return Err(FaceBlurError::model(format!(
                "Cached model '{file_name}' failed its integrity check. Delete it and download again."
            )));
        }

        Ok(Self {
            source: ModelSource::Cached(file_name.to_string()),
            path: cache.get_model_path(file_name),
        })
    }

    /// Load model data
    ///
    /// # Errors
    /// - File I/O errors when reading model data
    pub fn load_model(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).map_err(|e| FaceBlurError::file_io_error("read model", &self.path, &e))
    }

    /// Get model information
    ///
    /// # Errors
    /// - Model file metadata unavailable
    pub fn get_info(&self) -> Result<ModelInfo> {
        let metadata = fs::metadata(&self.path)
            .map_err(|e| FaceBlurError::file_io_error("read model metadata", &self.path, &e))?;
        Ok(ModelInfo {
            name: self.source.display_name(),
            path: self.path.clone(),
            size_bytes: metadata.len(),
        })
    }

    #[must_use]
    pub fn source(&self) -> &ModelSource {
        &self.source
    }

    #[must_use]
    pub fn model_path(&self) -> &PathBuf {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_display_names() {
        assert_eq!(
            ModelSource::External(PathBuf::from("/models/face.onnx")).display_name(),
            "external:face.onnx"
        );
        assert_eq!(ModelSource::default().display_name(), format!("cached:{DEFAULT_MODEL_FILE}"));
    }

    #[test]
    fn test_external_model_must_exist() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.onnx");
        assert!(matches!(
            ModelManager::with_external_model(missing),
            Err(FaceBlurError::Model(_))
        ));

        let present = temp_dir.path().join("face.onnx");
        fs::write(&present, b"weights").unwrap();
        let manager = ModelManager::with_external_model(present).unwrap();
        assert_eq!(manager.load_model().unwrap(), b"weights");
        assert_eq!(manager.get_info().unwrap().size_bytes, 7);
    }

    #[test]
    fn test_cached_model_resolution() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ModelCache::with_custom_cache_dir(temp_dir.path()).unwrap();
        assert!(ModelManager::with_cached_model(&cache, DEFAULT_MODEL_FILE).is_err());

        let path = cache.get_model_path(DEFAULT_MODEL_FILE);
        fs::write(&path, b"weights").unwrap();
        let digest = crate::cache::sha256_file(&path).unwrap();
        cache.write_checksum(DEFAULT_MODEL_FILE, &digest).unwrap();

        let manager = ModelManager::with_cached_model(&cache, DEFAULT_MODEL_FILE).unwrap();
        assert_eq!(manager.model_path(), &path);
        assert_eq!(manager.source(), &ModelSource::default());
    }

    #[test]
    fn test_corrupted_cached_model_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ModelCache::with_custom_cache_dir(temp_dir.path()).unwrap();
        fs::write(cache.get_model_path(DEFAULT_MODEL_FILE), b"weights").unwrap();
        cache.write_checksum(DEFAULT_MODEL_FILE, "deadbeef").unwrap();

        assert!(matches!(
            ModelManager::with_cached_model(&cache, DEFAULT_MODEL_FILE),
            Err(FaceBlurError::Model(_))
        ));
    }
}
