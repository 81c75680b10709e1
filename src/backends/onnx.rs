//! ONNX Runtime backend for the face detector
//!
//! Runs the detector through ONNX Runtime with support for multiple execution
//! providers (CPU, CUDA, CoreML). Provider requests that are unavailable on
//! the current machine fall back to CPU with a warning.

use crate::config::{DetectorConfig, ExecutionProvider};
use crate::error::{FaceBlurError, Result};
use crate::inference::{squeeze_batch, InferenceBackend, RawDetections};
use crate::models::{ModelManager, DEFAULT_INPUT_SHAPE};
use log;
use ndarray::{Array2, Array4};
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
};
use ort::session::{builder::GraphOptimizationLevel, builder::SessionBuilder, Session};
use ort::{self, value::Value};

/// ONNX Runtime backend running the face detector
#[derive(Debug)]
pub struct OnnxBackend {
    session: Option<Session>,
    model_manager: Option<ModelManager>,
    input_shape: (usize, usize, usize, usize),
    initialized: bool,
}

impl OnnxBackend {
    /// List all ONNX Runtime execution providers with availability status and descriptions
    ///
    /// # Examples
    /// ```rust
    /// use faceblur::backends::OnnxBackend;
    ///
    /// for (name, available, description) in OnnxBackend::list_providers() {
    ///     println!("{}: {} - {}", name, if available { "yes" } else { "no" }, description);
    /// }
    /// ```
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        log::debug!("🔍 System Hardware Analysis:");
        log::debug!("  - Platform: {os}", os = std::env::consts::OS);
        log::debug!("  - Architecture: {arch}", arch = std::env::consts::ARCH);
        log::debug!("  - CPU cores: {cores}", cores = available_cores());

        let cuda_available = OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false);
        let coreml_available =
            OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default()).unwrap_or(false);

        vec![
            (
                "CPU".to_string(),
                true,
                "Always available, uses CPU for inference".to_string(),
            ),
            (
                "CUDA".to_string(),
                cuda_available,
                "NVIDIA GPU acceleration (requires CUDA toolkit and compatible GPU)".to_string(),
            ),
            (
                "CoreML".to_string(),
                coreml_available,
                "Apple Silicon GPU acceleration (macOS only)".to_string(),
            ),
        ]
    }

    /// Create an ONNX backend that loads its weights from `model_manager`
    #[must_use]
    pub fn with_model_manager(model_manager: ModelManager) -> Self {
        Self {
            session: None,
            model_manager: Some(model_manager),
            input_shape: DEFAULT_INPUT_SHAPE,
            initialized: false,
        }
    }

    /// Create an ONNX backend without a model; one must be set before initialization
    #[must_use]
    pub fn new() -> Self {
        Self {
            session: None,
            model_manager: None,
            input_shape: DEFAULT_INPUT_SHAPE,
            initialized: false,
        }
    }

    pub fn set_model_manager(&mut self, model_manager: ModelManager) {
        self.model_manager = Some(model_manager);
    }

    fn configure_providers(builder: SessionBuilder, requested: ExecutionProvider) -> Result<SessionBuilder> {
        let cuda = CUDAExecutionProvider::default();
        let coreml = CoreMLExecutionProvider::default();
        let cuda_available = OrtExecutionProvider::is_available(&cuda).unwrap_or(false);
        let coreml_available = OrtExecutionProvider::is_available(&coreml).unwrap_or(false);

        let providers = match requested {
            ExecutionProvider::Cpu => {
                log::info!("Using CPU execution provider");
                Vec::new()
            },
            ExecutionProvider::Auto => {
                let mut providers = Vec::new();
                if cuda_available {
                    log::info!("🚀 CUDA execution provider is available and will be used");
                    providers.push(cuda.build());
                }
                if coreml_available {
                    log::info!("🍎 CoreML execution provider is available and will be used");
                    providers.push(coreml.with_subgraphs(true).build());
                }
                if providers.is_empty() {
                    log::info!("No hardware acceleration available, using CPU");
                }
                providers
            },
            ExecutionProvider::Cuda if cuda_available => {
                log::info!("Using CUDA execution provider");
                vec![cuda.build()]
            },
            ExecutionProvider::CoreMl if coreml_available => {
                log::info!("🍎 Using CoreML execution provider (explicitly requested)");
                vec![coreml.with_subgraphs(true).build()]
            },
            other => {
                log::warn!("{other} execution provider requested but not available, falling back to CPU");
                Vec::new()
            },
        };

        if providers.is_empty() {
            return Ok(builder);
        }
        builder
            .with_execution_providers(providers)
            .map_err(|e| FaceBlurError::inference(format!("Failed to set execution providers: {e}")))
    }

    /// Load and initialize the ONNX model
    fn load_model(&mut self, config: &DetectorConfig) -> Result<std::time::Duration> {
        let model_load_start = std::time::Instant::now();
        let model_manager = self
            .model_manager
            .as_ref()
            .ok_or_else(|| FaceBlurError::model("No model manager available for ONNX backend"))?;

        let model_data = model_manager.load_model()?;
        let model_info = model_manager.get_info()?;

        let session_builder = Session::builder()
            .map_err(|e| FaceBlurError::inference(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| FaceBlurError::inference(format!("Failed to set optimization level: {e}")))?;
        let session_builder = Self::configure_providers(session_builder, config.execution_provider)?;

        // The detector is small; a handful of threads saturates it
        let intra_threads = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            available_cores()
        };
        let inter_threads = if config.inter_threads > 0 {
            config.inter_threads
        } else {
            (available_cores() / 4).max(1)
        };

        let session = session_builder
            .with_intra_threads(intra_threads)
            .map_err(|e| FaceBlurError::inference(format!("Failed to set intra threads: {e}")))?
            .with_inter_threads(inter_threads)
            .map_err(|e| FaceBlurError::inference(format!("Failed to set inter threads: {e}")))?
            .commit_from_memory(&model_data)
            .map_err(|e| FaceBlurError::model(format!("Failed to create session from model data: {e}")))?;

        log::debug!("✅ ONNX Runtime session created successfully");
        log::debug!("  - Requested provider: {}", config.execution_provider);
        log::debug!("  - Threading: {intra_threads} intra-op threads, {inter_threads} inter-op threads");
        log::debug!("  - Model: {}", model_info.name);
        log::debug!("  - Input: {}x{}", config.input_size.0, config.input_size.1);
        #[allow(clippy::cast_precision_loss)]
        let size_mb = model_info.size_bytes as f64 / (1024.0 * 1024.0);
        log::debug!("  - Model size: {size_mb:.2} MB");

        self.session = Some(session);
        self.input_shape = config.input_shape();
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "📊 Model loading complete: {:.0}ms",
            model_load_time.as_secs_f64() * 1000.0
        );
        Ok(model_load_time)
    }
}

impl Default for OnnxBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for OnnxBackend {
    fn initialize(&mut self, config: &DetectorConfig) -> Result<Option<std::time::Duration>> {
        if self.initialized {
            return Ok(None);
        }

        let model_load_time = self.load_model(config)?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<RawDetections> {
        use std::time::Instant;

        if !self.initialized {
            return Err(FaceBlurError::internal("Backend not initialized"));
        }
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| FaceBlurError::internal("ONNX session not initialized"))?;

        let inference_start = Instant::now();
        log::debug!("🚀 Starting inference with input shape: {:?}", input.dim());

        let input_value = Value::from_array(input.clone())
            .map_err(|e| FaceBlurError::inference(format!("Failed to convert input tensor: {e}")))?;
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| FaceBlurError::inference(format!("ONNX inference failed: {e}")))?;

        // Prefer the named heads, fall back to positional order
        let keys: Vec<String> = outputs.keys().map(ToString::to_string).collect();
        let head = |name: &str, index: usize, columns: usize| -> Result<Array2<f32>> {
            let key = if keys.iter().any(|k| k == name) {
                name.to_string()
            } else {
                keys.get(index)
                    .cloned()
                    .ok_or_else(|| FaceBlurError::inference(format!("Detector output '{name}' not found")))?
            };
            let tensor = outputs
                .get(key.as_str())
                .ok_or_else(|| FaceBlurError::inference(format!("Detector output '{key}' not found")))?
                .try_extract_array::<f32>()
                .map_err(|e| FaceBlurError::inference(format!("Failed to extract '{key}' tensor: {e}")))?;
            let shape = tensor.shape().to_vec();
            squeeze_batch(&shape, tensor.iter().copied().collect(), columns, name)
        };

        let raw = RawDetections {
            scores: head("scores", 0, 2)?,
            boxes: head("boxes", 1, 4)?,
        };

        log::debug!(
            "📊 Inference complete: {:.2}ms, {} anchors",
            inference_start.elapsed().as_secs_f64() * 1000.0,
            raw.scores.nrows()
        );
        Ok(raw)
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        self.input_shape
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_onnx_backend_creation() {
        let backend = OnnxBackend::new();
        assert!(!backend.is_initialized());
        assert_eq!(backend.input_shape(), DEFAULT_INPUT_SHAPE);
    }

    #[test]
    fn test_cpu_provider_always_listed() {
        let providers = OnnxBackend::list_providers();
        assert!(providers.iter().any(|(name, available, _)| name == "CPU" && *available));
        assert_eq!(providers.len(), 3);
    }

    #[test]
    fn test_initialize_without_model_fails() {
        let mut backend = OnnxBackend::new();
        assert!(matches!(
            backend.initialize(&DetectorConfig::default()),
            Err(FaceBlurError::Model(_))
        ));
        assert!(!backend.is_initialized());
    }

    #[test]
    fn test_infer_before_initialize_fails() {
        let mut backend = OnnxBackend::new();
        let input = Array4::<f32>::zeros(DEFAULT_INPUT_SHAPE);
        assert!(backend.infer(&input).is_err());
    }

    #[test]
    fn test_invalid_model_bytes_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.onnx");
        std::fs::write(&path, b"not an onnx graph").unwrap();

        let manager = ModelManager::with_external_model(path).unwrap();
        let mut backend = OnnxBackend::with_model_manager(manager);
        let config = DetectorConfig {
            execution_provider: ExecutionProvider::Cpu,
            ..DetectorConfig::default()
        };
        assert!(backend.initialize(&config).is_err());
        assert!(!backend.is_initialized());
    }
}
