//! Tract backend for the face detector
//!
//! Pure Rust inference through Tract: no native runtime to install, CPU only.
//! Slower than ONNX Runtime but portable to every target Rust builds for.

use crate::config::DetectorConfig;
use crate::error::{FaceBlurError, Result};
use crate::inference::{squeeze_batch, InferenceBackend, RawDetections};
use crate::models::{ModelManager, DEFAULT_INPUT_SHAPE};
use log;
use ndarray::{Array2, Array4};
use tract_onnx::prelude::*;

/// Type alias for the complex Tract model type to reduce complexity warnings
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

// Use instant crate for cross-platform time compatibility
use instant::{Duration, Instant};

/// Tract backend running the face detector in pure Rust
#[derive(Debug)]
pub struct TractBackend {
    model: Option<TractModel>,
    model_manager: Option<ModelManager>,
    input_shape: (usize, usize, usize, usize),
    initialized: bool,
}

impl TractBackend {
    /// Tract's only execution provider, for `--show-providers`
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        log::debug!("🔍 Tract Backend System Analysis:");
        log::debug!("  - Platform: {os}", os = std::env::consts::OS);
        log::debug!("  - Architecture: {arch}", arch = std::env::consts::ARCH);

        vec![(
            "CPU".to_string(),
            true,
            "Pure Rust CPU inference with no external dependencies".to_string(),
        )]
    }

    #[must_use]
    pub fn new() -> Self {
        Self {
            model: None,
            model_manager: None,
            input_shape: DEFAULT_INPUT_SHAPE,
            initialized: false,
        }
    }

    #[must_use]
    pub fn with_model_manager(model_manager: ModelManager) -> Self {
        Self {
            model: None,
            model_manager: Some(model_manager),
            input_shape: DEFAULT_INPUT_SHAPE,
            initialized: false,
        }
    }

    pub fn set_model_manager(&mut self, model_manager: ModelManager) {
        self.model_manager = Some(model_manager);
    }

    fn load_model(&mut self, input_shape: (usize, usize, usize, usize)) -> Result<Duration> {
        let model_load_start = Instant::now();

        let Some(ref model_manager) = self.model_manager else {
            return Err(FaceBlurError::model("No model manager available for Tract backend"));
        };

        let model_data = model_manager.load_model()?;
        let model_info = model_manager.get_info()?;
        let (n, c, h, w) = input_shape;

        log::info!("🚀 Initializing Tract Backend");
        log::info!("🧠 Model: {}", model_info.name);
        log::info!("⚡ Execution Provider: CPU (Pure Rust)");
        log::debug!("📐 Input: {w}x{h}");

        // Pin the input fact so the graph optimizes for the fixed detector resolution
        let model = onnx()
            .model_for_read(&mut std::io::Cursor::new(model_data))
            .map_err(|e| FaceBlurError::model(format!("Failed to load ONNX model: {e}")))?
            .with_input_fact(0, f32::fact([n, c, h, w]).into())
            .map_err(|e| FaceBlurError::model(format!("Failed to set input shape: {e}")))?
            .into_optimized()
            .map_err(|e| FaceBlurError::model(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| FaceBlurError::model(format!("Failed to create runnable model: {e}")))?;

        self.model = Some(model);
        self.input_shape = input_shape;
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        log::info!("✅ Tract backend initialized in {}ms", model_load_time.as_millis());
        Ok(model_load_time)
    }
}

impl Default for TractBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for TractBackend {
    fn initialize(&mut self, config: &DetectorConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }
        if config.intra_threads > 0 || config.inter_threads > 0 {
            log::debug!("Tract backend ignores thread settings");
        }

        let model_load_time = self.load_model(config.input_shape())?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<RawDetections> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| FaceBlurError::inference("Tract model not initialized"))?;

        log::debug!("🔮 Running Tract inference on {:?}", input.shape());
        let inference_start = Instant::now();

        let outputs = model
            .run(tvec![Tensor::from(input.clone()).into()])
            .map_err(|e| FaceBlurError::inference(format!("Tract inference failed: {e}")))?;

        // UltraFace emits scores first, boxes second
        let head = |index: usize, columns: usize, name: &str| -> Result<Array2<f32>> {
            let tensor = outputs
                .get(index)
                .ok_or_else(|| FaceBlurError::inference(format!("Detector output '{name}' not found")))?;
            let view = tensor
                .to_array_view::<f32>()
                .map_err(|e| FaceBlurError::inference(format!("Failed to convert '{name}' tensor: {e}")))?;
            squeeze_batch(view.shape(), view.iter().copied().collect(), columns, name)
        };

        let raw = RawDetections {
            scores: head(0, 2, "scores")?,
            boxes: head(1, 4, "boxes")?,
        };

        log::debug!(
            "✅ Tract inference completed in {}ms, {} anchors",
            inference_start.elapsed().as_millis(),
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

#[cfg(all(test, feature = "tract"))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_tract_backend_creation() {
        let backend = TractBackend::new();
        assert!(!backend.is_initialized());
        assert_eq!(backend.input_shape(), DEFAULT_INPUT_SHAPE);
    }

    #[test]
    fn test_tract_list_providers() {
        let providers = TractBackend::list_providers();
        assert_eq!(providers.len(), 1);
        assert!(providers[0].1);
    }

    #[test]
    fn test_tract_uninitialized_inference_fails() {
        let mut backend = TractBackend::new();
        let input = Array4::<f32>::zeros(DEFAULT_INPUT_SHAPE);
        assert!(matches!(backend.infer(&input), Err(FaceBlurError::Inference(_))));
    }

    #[test]
    fn test_tract_rejects_garbage_model() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("garbage.onnx");
        std::fs::write(&path, [0u8, 1, 2, 3]).unwrap();

        let mut backend = TractBackend::with_model_manager(ModelManager::with_external_model(path).unwrap());
        assert!(matches!(
            backend.initialize(&DetectorConfig::default()),
            Err(FaceBlurError::Model(_))
        ));
    }
}
