//! Inference backend abstraction

use crate::{config::DetectorConfig, error::Result};
use ndarray::{Array2, Array4};

// Use instant crate for cross-platform time compatibility
use instant::Duration;

/// Raw detector head outputs for a single image
///
/// Both arrays have one row per anchor. `scores` rows are
/// `[background, face]`, `boxes` rows are `[x1, y1, x2, y2]` normalized to
/// the network input.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetections {
    pub scores: Array2<f32>,
    pub boxes: Array2<f32>,
}

impl RawDetections {
    /// Number of anchors, or an error when the two heads disagree
    ///
    /// # Errors
    /// - Score and box row counts differ
    /// - Unexpected column counts
    pub fn anchors(&self) -> Result<usize> {
        let (score_rows, score_cols) = self.scores.dim();
        let (box_rows, box_cols) = self.boxes.dim();
        if score_cols != 2 || box_cols != 4 || score_rows != box_rows {
            return Err(crate::error::FaceBlurError::detector(format!(
                "Mismatched detector outputs: scores {score_rows}x{score_cols}, boxes {box_rows}x{box_cols}"
            )));
        }
        Ok(score_rows)
    }
}

/// Trait for inference backends
pub trait InferenceBackend {
    /// Initialize the backend with the given configuration
    ///
    /// Returns the model load time, or `None` when already initialized.
    ///
    /// # Errors
    /// - Model loading or validation errors
    /// - Execution provider setup failures
    fn initialize(&mut self, config: &DetectorConfig) -> Result<Option<Duration>>;

    /// Run the detector on a preprocessed `1x3xHxW` tensor
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Model inference failures
    /// - Missing or malformed output tensors
    fn infer(&mut self, input: &Array4<f32>) -> Result<RawDetections>;

    /// Expected input shape in NCHW order
    fn input_shape(&self) -> (usize, usize, usize, usize);

    /// Check if backend is initialized
    fn is_initialized(&self) -> bool;
}

/// Split `[1, N, C]` head outputs into `N x C` rows
pub(crate) fn squeeze_batch(shape: &[usize], data: Vec<f32>, columns: usize, head: &str) -> Result<Array2<f32>> {
    let rows = match shape {
        [1, rows, cols] if *cols == columns => *rows,
        [rows, cols] if *cols == columns => *rows,
        _ => {
            return Err(crate::error::FaceBlurError::inference(format!(
                "Unexpected '{head}' output shape {shape:?}, expected [1, N, {columns}]"
            )))
        },
    };

    Array2::from_shape_vec((rows, columns), data)
        .map_err(|e| crate::error::FaceBlurError::inference(format!("Failed to reshape '{head}' output: {e}")))
}
