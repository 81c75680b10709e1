//! Detector input preprocessing

use crate::error::{FaceBlurError, Result};
use image::{imageops::FilterType, DynamicImage};
use ndarray::Array4;

/// Per-channel normalization applied to 8-bit RGB values: `(p - mean) / scale`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreprocessingOptions {
    pub mean: f32,
    pub scale: f32,
    pub filter: FilterType,
}

impl Default for PreprocessingOptions {
    fn default() -> Self {
        Self {
            mean: 127.0,
            scale: 128.0,
            filter: FilterType::Triangle,
        }
    }
}

/// Converts images into detector input tensors
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Stretch `image` to the network resolution and normalize into NCHW
    ///
    /// The detector was trained on stretched inputs, so the aspect ratio is
    /// not preserved; box outputs are normalized and scale back per axis.
    ///
    /// # Errors
    /// - Empty source image
    /// - Input shape is not a single RGB image
    pub fn preprocess_for_detector(
        image: &DynamicImage,
        input_shape: (usize, usize, usize, usize),
        options: &PreprocessingOptions,
    ) -> Result<Array4<f32>> {
        let (batch, channels, height, width) = input_shape;
        if batch != 1 || channels != 3 {
            return Err(FaceBlurError::detector(format!(
                "Detector input must be 1x3xHxW, got {input_shape:?}"
            )));
        }
        if image.width() == 0 || image.height() == 0 {
            return Err(FaceBlurError::detector("Cannot run detection on an empty image"));
        }

        let target_width = u32::try_from(width)
            .map_err(|_| FaceBlurError::detector("Detector input width out of range"))?;
        let target_height = u32::try_from(height)
            .map_err(|_| FaceBlurError::detector("Detector input height out of range"))?;

        let resized = image::imageops::resize(&image.to_rgb8(), target_width, target_height, options.filter);

        let mut tensor = Array4::<f32>::zeros(input_shape);
        #[allow(clippy::indexing_slicing)]
        // Safe: tensor allocated with the resized image's dimensions
        for (x, y, pixel) in resized.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for channel in 0..3 {
                tensor[[0, channel, y, x]] = (f32::from(pixel[channel]) - options.mean) / options.scale;
            }
        }

        Ok(tensor)
    }
}
