//! Image and region file I/O
//!
//! Keeps filesystem access out of the pipeline so the processor and the
//! selection sessions can be tested on in-memory images.

use crate::{
    error::{FaceBlurError, Result},
    types::FaceRegion,
};
use image::{DynamicImage, ImageFormat, RgbImage};
use std::path::Path;

/// Service for handling image and region file input/output
pub struct ImageIOService;

impl ImageIOService {
    /// Load an image from a file path
    ///
    /// Tries the extension first, then sniffs the content, so mislabelled
    /// files still load.
    ///
    /// # Examples
    /// ```rust,no_run
    /// use faceblur::services::ImageIOService;
    ///
    /// let image = ImageIOService::load_image("group.jpg")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    ///
    /// # Errors
    /// - `InputNotFound` when the path does not exist
    /// - Decode failures from both detection strategies
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();
        if !path_ref.is_file() {
            return Err(FaceBlurError::InputNotFound(path_ref.to_path_buf()));
        }

        match image::open(path_ref) {
            Ok(img) => Ok(img),
            Err(e) => {
                log::debug!(
                    "Extension-based loading failed for {}: {}. Attempting content-based detection.",
                    path_ref.display(),
                    e
                );
                let data = std::fs::read(path_ref)
                    .map_err(|io_err| FaceBlurError::file_io_error("read image data", path_ref, &io_err))?;
                image::load_from_memory(&data).map_err(FaceBlurError::from)
            },
        }
    }

    /// Encode `image` to `path`, picking the format from the extension
    ///
    /// # Errors
    /// - `OutputWriteFailure` for unknown extensions, missing directories or encoder errors
    pub fn save_image<P: AsRef<Path>>(image: &RgbImage, path: P) -> Result<()> {
        let path_ref = path.as_ref();

        let format = ImageFormat::from_path(path_ref)
            .map_err(|e| FaceBlurError::output_write(path_ref, format!("unsupported output format: {e}")))?;

        if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| FaceBlurError::output_write(path_ref, format!("cannot create directory: {e}")))?;
        }

        image
            .save_with_format(path_ref, format)
            .map_err(|e| FaceBlurError::output_write(path_ref, e.to_string()))?;

        log::debug!("Wrote {}x{} {:?} to {}", image.width(), image.height(), format, path_ref.display());
        Ok(())
    }

    /// Read a JSON array of `{x, y, width, height}` regions
    ///
    /// # Errors
    /// - File missing or unreadable
    /// - Malformed JSON
    pub fn load_regions<P: AsRef<Path>>(path: P) -> Result<Vec<FaceRegion>> {
        let path_ref = path.as_ref();
        let data = std::fs::read_to_string(path_ref)
            .map_err(|e| FaceBlurError::file_io_error("read regions file", path_ref, &e))?;
        serde_json::from_str(&data).map_err(|e| {
            FaceBlurError::invalid_config(format!("Invalid regions file {}: {e}", path_ref.display()))
        })
    }

    /// Write regions as a pretty-printed JSON array
    ///
    /// # Errors
    /// - `OutputWriteFailure` when the file cannot be written
    pub fn save_regions<P: AsRef<Path>>(regions: &[FaceRegion], path: P) -> Result<()> {
        let path_ref = path.as_ref();
        let json = serde_json::to_string_pretty(regions)
            .map_err(|e| FaceBlurError::internal(format!("Failed to serialize regions: {e}")))?;
        std::fs::write(path_ref, json).map_err(|e| FaceBlurError::output_write(path_ref, e.to_string()))?;
        log::info!("Exported {} region(s) to {}", regions.len(), path_ref.display());
        Ok(())
    }
}
