#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # faceblur
//!
//! Detect or hand-pick faces in a photo and blur them.
//!
//! Faces come from a neural detector (UltraFace RFB-320 on ONNX Runtime or
//! Tract), from a JSON regions file, or from the operator dragging ellipses
//! over the image. In automatic mode every detected face starts selected and
//! a click toggles it; the chosen faces are then blurred inside their
//! inscribed ellipses (or their whole bounding rectangles).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use faceblur::{
//!     display::HeadlessSurface, FaceBlurProcessor, ModelSource, ProcessorConfig, SelectionMode,
//! };
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = ProcessorConfig::builder()
//!     .mode(SelectionMode::Automatic)
//!     .model_source(ModelSource::External("version-RFB-320.onnx".into()))
//!     .interactive(false)
//!     .build()?;
//!
//! let mut processor = FaceBlurProcessor::new(config)?;
//! let result = processor.process_file(
//!     Path::new("group.jpg"),
//!     Path::new("group_BLURRED.jpg"),
//!     &mut HeadlessSurface,
//! )?;
//! println!("blurred {} face(s)", result.regions.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Compositing only
//!
//! When the regions are already known, skip detection entirely:
//!
//! ```rust
//! use faceblur::{blur_faces, BlurConfig, FaceRegion};
//! use image::RgbImage;
//!
//! let image = RgbImage::new(100, 100);
//! let blurred = blur_faces(&image, &[FaceRegion::new(10, 10, 20, 20)], &BlurConfig::default());
//! assert_eq!(blurred.dimensions(), (100, 100));
//! ```
//!
//! ### Feature Flags
//!
//! - `onnx` (default): ONNX Runtime backend with GPU acceleration support
//! - `tract` (default): Pure Rust backend
//! - `cli` (default): Command-line interface, progress bars and tracing setup
//! - `gui` (default): Interactive selection window (`eframe`)
//! - `tracing-json`, `tracing-files`: extra log outputs for the CLI

pub mod backends;
pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compositing;
pub mod config;
pub mod detection;
pub mod display;
pub mod download;
pub mod error;
pub mod inference;
pub mod models;
pub mod processor;
pub mod selection;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

// Public API exports
pub use backends::*;
pub use cache::{format_size, CachedModelInfo, ModelCache};
pub use compositing::blur_faces;
pub use config::{
    BlurConfig, BlurStrategy, DetectorConfig, ExecutionProvider, OverlayStyle, SelectionMode, TogglePolicy,
};
pub use detection::{FaceDetector, ModelFaceDetector, StaticDetector};
pub use display::{HeadlessSurface, ScriptedSurface, SelectionSurface};
pub use download::{validate_model_url, ModelDownloader};
pub use error::{FaceBlurError, Result};
pub use inference::{InferenceBackend, RawDetections};
pub use models::{ModelManager, ModelSource};
pub use processor::{
    resolve_output_path, BackendFactory, BackendType, DefaultBackendFactory, FaceBlurProcessor, FaceBlurResult,
    ProcessorConfig, ProcessorConfigBuilder,
};
pub use selection::{DrawSession, PointerButton, PointerEvent, SelectionSession, ToggleSession};
pub use services::ImageIOService;
pub use types::{Ellipse, FaceDetection, FaceRegion, PixelPoint};
pub use utils::{ExecutionProviderManager, ImagePreprocessor, PreprocessingOptions, ProviderInfo};

#[cfg(feature = "cli")]
pub use tracing_config::{events, init_cli_tracing, spans, TracingConfig, TracingFormat, TracingOutput};

/// Blur known regions of an image file without any interaction
///
/// Writes to `output`, or to `<stem>_BLURRED<ext>` in the current directory.
///
/// # Examples
/// ```rust,no_run
/// use faceblur::{blur_image_file, BlurConfig, FaceRegion};
/// use std::path::Path;
///
/// # fn example() -> faceblur::Result<()> {
/// let written = blur_image_file(
///     Path::new("portrait.png"),
///     None,
///     &[FaceRegion::new(120, 80, 200, 240)],
///     &BlurConfig::default(),
/// )?;
/// assert_eq!(written, Path::new("portrait_BLURRED.png"));
/// # Ok(())
/// # }
/// ```
///
/// # Errors
/// - `InputNotFound` or decode failures for the input
/// - `OutputWriteFailure` for the result
pub fn blur_image_file(
    input: &std::path::Path,
    output: Option<&std::path::Path>,
    regions: &[FaceRegion],
    config: &BlurConfig,
) -> Result<std::path::PathBuf> {
    let image = ImageIOService::load_image(input)?.to_rgb8();
    let blurred = blur_faces(&image, regions, config);
    let output = resolve_output_path(input, output);
    ImageIOService::save_image(&blurred, &output)?;
    log::info!("Image saved to {}", output.display());
    Ok(output)
}
