//! Mock inference backend for detector tests
//!
//! Produces fixed detector head outputs so detection, processor and CLI
//! wiring can be exercised without model files or a runtime.

use crate::{
    config::DetectorConfig,
    error::{FaceBlurError, Result},
    inference::{InferenceBackend, RawDetections},
};
use instant::Duration;
use ndarray::{Array2, Array4};
use std::sync::{Arc, Mutex};

/// Mock backend returning a fixed set of normalized face boxes
#[derive(Debug, Clone)]
pub struct MockDetectorBackend {
    initialized: bool,
    input_shape: (usize, usize, usize, usize),
    /// `([x1, y1, x2, y2], face_score)` per anchor
    anchors: Vec<([f32; 4], f32)>,
    /// Call history for verification in tests
    call_history: Arc<Mutex<Vec<String>>>,
    should_fail_init: bool,
    should_fail_inference: bool,
}

impl MockDetectorBackend {
    /// Mock backend with no anchors
    #[must_use]
    pub fn new() -> Self {
        Self {
            initialized: false,
            input_shape: (1, 3, 240, 320),
            anchors: Vec::new(),
            call_history: Arc::new(Mutex::new(Vec::new())),
            should_fail_init: false,
            should_fail_inference: false,
        }
    }

    /// Mock backend that reports the given anchors on every inference
    #[must_use]
    pub fn with_anchors(anchors: Vec<([f32; 4], f32)>) -> Self {
        Self {
            anchors,
            ..Self::new()
        }
    }

    #[must_use]
    pub fn new_failing_init() -> Self {
        Self {
            should_fail_init: true,
            ..Self::new()
        }
    }

    #[must_use]
    pub fn new_failing_inference() -> Self {
        Self {
            should_fail_inference: true,
            ..Self::new()
        }
    }

    /// Shared handle to the call history, usable after the backend is boxed
    #[must_use]
    pub fn call_history(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.call_history)
    }

    fn record_call(&self, method: &str) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(method.to_string());
        }
    }

    fn raw_outputs(&self) -> RawDetections {
        let mut scores = Array2::<f32>::zeros((self.anchors.len(), 2));
        let mut boxes = Array2::<f32>::zeros((self.anchors.len(), 4));
        for (row, (corners, score)) in self.anchors.iter().enumerate() {
            scores[[row, 0]] = 1.0 - score;
            scores[[row, 1]] = *score;
            for (col, value) in corners.iter().enumerate() {
                boxes[[row, col]] = *value;
            }
        }
        RawDetections { scores, boxes }
    }
}

impl Default for MockDetectorBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for MockDetectorBackend {
    fn initialize(&mut self, config: &DetectorConfig) -> Result<Option<Duration>> {
        self.record_call("initialize");

        if self.should_fail_init {
            return Err(FaceBlurError::model("Mock backend initialization failed"));
        }
        if self.initialized {
            return Ok(None);
        }

        self.input_shape = config.input_shape();
        self.initialized = true;
        Ok(Some(Duration::from_millis(5)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<RawDetections> {
        self.record_call("infer");

        if !self.initialized {
            return Err(FaceBlurError::internal("Mock backend not initialized"));
        }
        if self.should_fail_inference {
            return Err(FaceBlurError::inference("Mock backend inference failed"));
        }
        if input.dim() != self.input_shape {
            return Err(FaceBlurError::inference(format!(
                "Mock backend expected input {:?}, got {:?}",
                self.input_shape,
                input.dim()
            )));
        }

        Ok(self.raw_outputs())
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        self.input_shape
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_requires_initialization() {
        let mut backend = MockDetectorBackend::new();
        let input = Array4::<f32>::zeros((1, 3, 240, 320));
        assert!(backend.infer(&input).is_err());

        backend.initialize(&DetectorConfig::default()).unwrap();
        let raw = backend.infer(&input).unwrap();
        assert_eq!(raw.anchors().unwrap(), 0);
    }

    #[test]
    fn test_mock_reports_anchors() {
        let mut backend = MockDetectorBackend::with_anchors(vec![([0.1, 0.2, 0.3, 0.4], 0.9)]);
        backend.initialize(&DetectorConfig::default()).unwrap();
        let raw = backend.infer(&Array4::zeros((1, 3, 240, 320))).unwrap();

        assert_eq!(raw.anchors().unwrap(), 1);
        assert!((raw.scores[[0, 1]] - 0.9).abs() < f32::EPSILON);
        assert!((raw.boxes[[0, 2]] - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn test_mock_failure_modes() {
        let mut backend = MockDetectorBackend::new_failing_init();
        assert!(backend.initialize(&DetectorConfig::default()).is_err());

        let mut backend = MockDetectorBackend::new_failing_inference();
        backend.initialize(&DetectorConfig::default()).unwrap();
        assert!(backend.infer(&Array4::zeros((1, 3, 240, 320))).is_err());

        let history = backend.call_history();
        assert_eq!(*history.lock().unwrap(), vec!["initialize", "infer"]);
    }

    #[test]
    fn test_mock_rejects_wrong_input_shape() {
        let mut backend = MockDetectorBackend::new();
        backend.initialize(&DetectorConfig::default()).unwrap();
        assert!(backend.infer(&Array4::zeros((1, 3, 100, 100))).is_err());
    }
}
