//! Face blur processor
//!
//! `FaceBlurProcessor` runs one image through the whole pipeline: candidate
//! acquisition (detector, regions file or manual drawing), interactive
//! selection on a [`SelectionSurface`], masked compositing and output. The
//! CLI is a thin layer over it.

use crate::{
    compositing::blur_faces,
    config::{BlurConfig, DetectorConfig, SelectionMode},
    detection::{FaceDetector, ModelFaceDetector, StaticDetector},
    display::{SelectionSurface, RESULT_TITLE, SELECTION_TITLE},
    error::{FaceBlurError, Result},
    inference::InferenceBackend,
    models::{ModelManager, ModelSource},
    selection::{DrawSession, SelectionSession, ToggleSession},
    services::ImageIOService,
    types::FaceRegion,
};
use image::{DynamicImage, RgbImage};
use instant::Instant;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{instrument, span, Level};

/// Backend type enumeration for runtime selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BackendType {
    /// ONNX Runtime backend (supports GPU acceleration)
    #[default]
    Onnx,
    /// Tract backend (pure Rust, no external dependencies)
    Tract,
}

/// Factory trait for creating inference backends
pub trait BackendFactory: Send + Sync {
    /// Create a backend instance of the specified type with the given model manager
    ///
    /// # Errors
    /// - Backend type not compiled into this build
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>>;

    /// List available backend types
    fn available_backends(&self) -> Vec<BackendType>;
}

/// Creates whichever backends are enabled by cargo features
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>> {
        match backend_type {
            BackendType::Onnx => {
                #[cfg(feature = "onnx")]
                {
                    Ok(Box::new(crate::backends::OnnxBackend::with_model_manager(model_manager)))
                }
                #[cfg(not(feature = "onnx"))]
                {
                    drop(model_manager);
                    Err(FaceBlurError::invalid_config(
                        "ONNX backend not compiled in. Rebuild with --features onnx",
                    ))
                }
            },
            BackendType::Tract => {
                #[cfg(feature = "tract")]
                {
                    Ok(Box::new(crate::backends::TractBackend::with_model_manager(model_manager)))
                }
                #[cfg(not(feature = "tract"))]
                {
                    drop(model_manager);
                    Err(FaceBlurError::invalid_config(
                        "Tract backend not compiled in. Rebuild with --features tract",
                    ))
                }
            },
        }
    }

    fn available_backends(&self) -> Vec<BackendType> {
        let mut backends = Vec::new();
        #[cfg(feature = "onnx")]
        backends.push(BackendType::Onnx);
        #[cfg(feature = "tract")]
        backends.push(BackendType::Tract);
        backends
    }
}

/// Everything a single run needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Where candidates come from
    pub mode: SelectionMode,
    /// Compositing and overlay settings
    pub blur: BlurConfig,
    /// Detector thresholds and runtime settings
    pub detector: DetectorConfig,
    /// Backend type to use for inference
    pub backend_type: BackendType,
    /// Detector weights
    pub model_source: ModelSource,
    /// Load candidates from this JSON file instead of running the detector
    pub regions_file: Option<PathBuf>,
    /// Write the final blurred regions to this JSON file
    pub export_regions: Option<PathBuf>,
    /// Open windows for selection and preview
    pub interactive: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            mode: SelectionMode::Automatic,
            blur: BlurConfig::default(),
            detector: DetectorConfig::default(),
            backend_type: BackendType::Onnx,
            model_source: ModelSource::default(),
            regions_file: None,
            export_regions: None,
            interactive: true,
        }
    }
}

impl ProcessorConfig {
    /// Create a new processor configuration builder
    #[must_use]
    pub fn builder() -> ProcessorConfigBuilder {
        ProcessorConfigBuilder::new()
    }

    /// Whether this run needs a detector model
    #[must_use]
    pub fn needs_model(&self) -> bool {
        self.mode == SelectionMode::Automatic && self.regions_file.is_none()
    }
}

/// Builder for `ProcessorConfig`
#[derive(Debug, Default)]
pub struct ProcessorConfigBuilder {
    config: ProcessorConfig,
}

impl ProcessorConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn mode(mut self, mode: SelectionMode) -> Self {
        self.config.mode = mode;
        self
    }

    #[must_use]
    pub fn blur(mut self, blur: BlurConfig) -> Self {
        self.config.blur = blur;
        self
    }

    #[must_use]
    pub fn detector(mut self, detector: DetectorConfig) -> Self {
        self.config.detector = detector;
        self
    }

    #[must_use]
    pub fn backend_type(mut self, backend_type: BackendType) -> Self {
        self.config.backend_type = backend_type;
        self
    }

    #[must_use]
    pub fn model_source(mut self, source: ModelSource) -> Self {
        self.config.model_source = source;
        self
    }

    #[must_use]
    pub fn regions_file(mut self, path: Option<PathBuf>) -> Self {
        self.config.regions_file = path;
        self
    }

    #[must_use]
    pub fn export_regions(mut self, path: Option<PathBuf>) -> Self {
        self.config.export_regions = path;
        self
    }

    #[must_use]
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.config.interactive = interactive;
        self
    }

    /// Build the processor configuration
    ///
    /// # Errors
    /// - Invalid blur or detector settings
    /// - A regions file combined with manual mode
    pub fn build(self) -> Result<ProcessorConfig> {
        self.config.blur.validate()?;
        self.config.detector.validate()?;

        if self.config.mode == SelectionMode::Manual && self.config.regions_file.is_some() {
            return Err(FaceBlurError::invalid_config(
                "A regions file only applies to automatic mode; drop --manual or --regions",
            ));
        }

        Ok(self.config)
    }
}

/// Wall-clock time spent in each stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    pub detection_ms: u64,
    pub selection_ms: u64,
    pub compositing_ms: u64,
    pub total_ms: u64,
}

/// Outcome of blurring one image
#[derive(Debug, Clone)]
pub struct FaceBlurResult {
    /// Composited output
    pub image: RgbImage,
    /// Candidates offered for selection, in detection order
    pub candidates: Vec<FaceRegion>,
    /// Regions that were blurred, an order-preserving subsequence of the
    /// candidates in automatic mode
    pub regions: Vec<FaceRegion>,
    pub timings: ProcessingTimings,
}

/// Runs detection, selection and compositing for one image at a time
pub struct FaceBlurProcessor {
    config: ProcessorConfig,
    backend_factory: Box<dyn BackendFactory>,
    detector: Option<Box<dyn FaceDetector>>,
}

impl FaceBlurProcessor {
    /// Create a processor with the default backend factory
    ///
    /// The detector is built lazily on first use.
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn new(config: ProcessorConfig) -> Result<Self> {
        Self::with_factory(config, Box::new(DefaultBackendFactory))
    }

    /// Create a processor with a custom backend factory
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn with_factory(config: ProcessorConfig, backend_factory: Box<dyn BackendFactory>) -> Result<Self> {
        config.blur.validate()?;
        config.detector.validate()?;
        Ok(Self {
            config,
            backend_factory,
            detector: None,
        })
    }

    /// Use `detector` instead of building one from the configured model
    #[must_use]
    pub fn with_detector(mut self, detector: Box<dyn FaceDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    #[must_use]
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    fn build_detector(&self) -> Result<Box<dyn FaceDetector>> {
        if let Some(path) = &self.config.regions_file {
            let regions = ImageIOService::load_regions(path)?;
            info!("Loaded {} candidate region(s) from {}", regions.len(), path.display());
            return Ok(Box::new(StaticDetector::new(regions)));
        }

        debug!("Model source: {}", self.config.model_source.display_name());
        debug!("Backend type: {:?}", self.config.backend_type);
        debug!("Execution provider: {}", self.config.detector.execution_provider);

        let model_manager = ModelManager::from_source(&self.config.model_source)?;
        let backend = self
            .backend_factory
            .create_backend(self.config.backend_type, model_manager)?;
        Ok(Box::new(ModelFaceDetector::new(backend, self.config.detector.clone())?))
    }

    /// Produce the candidate list for `image`
    ///
    /// Manual mode has no candidates; the operator draws them.
    ///
    /// # Errors
    /// - Detector construction or inference failures
    /// - Unreadable regions file
    pub fn acquire_candidates(&mut self, image: &DynamicImage) -> Result<Vec<FaceRegion>> {
        if self.config.mode == SelectionMode::Manual {
            return Ok(Vec::new());
        }

        if self.detector.is_none() {
            self.detector = Some(self.build_detector()?);
        }
        let detector = self
            .detector
            .as_mut()
            .ok_or_else(|| FaceBlurError::internal("Detector not initialized"))?;

        let detections = detector.detect(image)?;
        for detection in &detections {
            debug!("Candidate {} (confidence {:.2})", detection.region, detection.confidence);
        }
        Ok(detections.into_iter().map(|d| d.region).collect())
    }

    /// Let the operator refine `candidates` on `surface`
    ///
    /// # Errors
    /// - Surface failures
    pub fn select(
        &self,
        surface: &mut dyn SelectionSurface,
        image: &RgbImage,
        candidates: Vec<FaceRegion>,
    ) -> Result<Vec<FaceRegion>> {
        let session: Box<dyn SelectionSession> = match self.config.mode {
            SelectionMode::Automatic => Box::new(ToggleSession::new(image.clone(), candidates, &self.config.blur)),
            SelectionMode::Manual => Box::new(DrawSession::new(image.clone(), &self.config.blur)),
        };
        surface.select(SELECTION_TITLE, session)
    }

    /// Run acquisition, selection and compositing on an in-memory image
    ///
    /// # Errors
    /// - Detector failures
    /// - Surface failures
    #[instrument(
        skip(self, image, surface),
        fields(
            mode = ?self.config.mode,
            strategy = %self.config.blur.strategy,
            dimensions = %format!("{}x{}", image.width(), image.height())
        )
    )]
    pub fn process_image(
        &mut self,
        image: &DynamicImage,
        surface: &mut dyn SelectionSurface,
    ) -> Result<FaceBlurResult> {
        let total_start = Instant::now();
        let mut timings = ProcessingTimings::default();
        let source = image.to_rgb8();

        let candidates = {
            let _span = span!(Level::INFO, "acquisition", mode = ?self.config.mode).entered();
            let start = Instant::now();
            let candidates = self.acquire_candidates(image)?;
            timings.detection_ms = start.elapsed().as_millis() as u64;
            candidates
        };

        let regions = {
            let _span = span!(Level::DEBUG, "selection", candidates = candidates.len()).entered();
            let start = Instant::now();
            let regions = self.select(surface, &source, candidates.clone())?;
            timings.selection_ms = start.elapsed().as_millis() as u64;
            regions
        };
        info!("Blurring {} face(s)", regions.len());

        let output = {
            let _span = span!(Level::DEBUG, "compositing", regions = regions.len()).entered();
            let start = Instant::now();
            let output = blur_faces(&source, &regions, &self.config.blur);
            timings.compositing_ms = start.elapsed().as_millis() as u64;
            output
        };

        timings.total_ms = total_start.elapsed().as_millis() as u64;
        debug!("Timings: {timings:?}");

        Ok(FaceBlurResult {
            image: output,
            candidates,
            regions,
            timings,
        })
    }

    /// Blur `input`, write the result to `output` and show it on `surface`
    ///
    /// # Errors
    /// - `InputNotFound` or decode failures for the input
    /// - Detector or surface failures
    /// - `OutputWriteFailure` for the image or the exported regions
    pub fn process_file(
        &mut self,
        input: &Path,
        output: &Path,
        surface: &mut dyn SelectionSurface,
    ) -> Result<FaceBlurResult> {
        let image = ImageIOService::load_image(input)?;
        info!(
            "Loaded {} ({}x{})",
            input.display(),
            image.width(),
            image.height()
        );

        let result = self.process_image(&image, surface)?;

        ImageIOService::save_image(&result.image, output)?;
        info!("Image saved to {}", output.display());

        if let Some(export_path) = &self.config.export_regions {
            ImageIOService::save_regions(&result.regions, export_path)?;
        }

        surface.present(RESULT_TITLE, &result.image)?;
        Ok(result)
    }
}

/// Default output path: `<stem>_BLURRED<ext>` in the current directory
///
/// An explicit `out` wins. Inputs without an extension get `.png`.
///
/// # Examples
/// ```rust
/// use faceblur::processor::resolve_output_path;
/// use std::path::{Path, PathBuf};
///
/// assert_eq!(
///     resolve_output_path(Path::new("/photos/team.jpg"), None),
///     PathBuf::from("team_BLURRED.jpg")
/// );
/// ```
#[must_use]
pub fn resolve_output_path(input: &Path, out: Option<&Path>) -> PathBuf {
    if let Some(out) = out {
        return out.to_path_buf();
    }

    let stem = input
        .file_stem()
        .map_or_else(|| "image".into(), |s| s.to_string_lossy());
    let extension = input
        .extension()
        .map_or_else(|| "png".into(), |e| e.to_string_lossy());
    PathBuf::from(format!("{stem}_BLURRED.{extension}"))
}
