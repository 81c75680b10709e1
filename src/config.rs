//! Configuration types for face blurring operations

use crate::error::{FaceBlurError, Result};
use serde::{Deserialize, Serialize};

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon GPU acceleration
    CoreMl,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

/// Where face candidates come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectionMode {
    /// Run the detector, then let the operator exempt faces by clicking them
    #[default]
    Automatic,
    /// Operator drags ellipses over faces by hand
    Manual,
}

/// How selected regions are obscured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlurStrategy {
    /// Blur the whole image, keep it only inside each region's inscribed ellipse
    #[default]
    EllipseMask,
    /// Blur each bounding rectangle in place
    RectangleOverwrite,
}

impl std::fmt::Display for BlurStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EllipseMask => write!(f, "ellipse"),
            Self::RectangleOverwrite => write!(f, "rectangle"),
        }
    }
}

/// Which candidates a single click toggles when regions overlap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TogglePolicy {
    /// Every region containing the click point flips
    #[default]
    All,
    /// Only the first region (in candidate order) containing the click flips
    First,
}

/// Colors and stroke used for selection overlays (RGB)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayStyle {
    /// Outline of a region that will be blurred
    pub included_color: [u8; 3],
    /// Outline of a region the operator exempted
    pub excluded_color: [u8; 3],
    /// Outline stroke width in pixels
    pub thickness: u32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            included_color: [255, 0, 0],
            excluded_color: [0, 255, 0],
            thickness: 2,
        }
    }
}

/// Largest box-blur window accepted
pub const MAX_KERNEL_SIZE: u32 = 255;

/// Selection and compositing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlurConfig {
    /// Compositing strategy
    pub strategy: BlurStrategy,
    /// Box-blur window size in pixels
    pub kernel_size: u32,
    /// Overlap behavior of the inclusion toggle
    pub toggle_policy: TogglePolicy,
    /// Overlay colors for the selection window
    pub overlay: OverlayStyle,
    /// Manually drawn regions narrower or shorter than this are dropped
    pub min_region_size: u32,
}

impl Default for BlurConfig {
    fn default() -> Self {
        Self {
            strategy: BlurStrategy::EllipseMask,
            kernel_size: 30,
            toggle_policy: TogglePolicy::All,
            overlay: OverlayStyle::default(),
            min_region_size: 1,
        }
    }
}

impl BlurConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> BlurConfigBuilder {
        BlurConfigBuilder::default()
    }

    /// Validate configuration parameters
    ///
    /// # Errors
    /// - Kernel size outside `1..=MAX_KERNEL_SIZE`
    /// - Zero overlay thickness
    pub fn validate(&self) -> Result<()> {
        if self.kernel_size == 0 || self.kernel_size > MAX_KERNEL_SIZE {
            return Err(FaceBlurError::config_value_error(
                "kernel size",
                self.kernel_size,
                &format!("1-{MAX_KERNEL_SIZE}"),
                Some(30),
            ));
        }

        if self.overlay.thickness == 0 {
            return Err(FaceBlurError::invalid_config(
                "Overlay thickness must be at least 1 pixel",
            ));
        }

        Ok(())
    }
}

/// Builder for [`BlurConfig`]
#[derive(Debug, Default)]
pub struct BlurConfigBuilder {
    config: BlurConfig,
}

impl BlurConfigBuilder {
    #[must_use]
    pub fn strategy(mut self, strategy: BlurStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    #[must_use]
    pub fn kernel_size(mut self, kernel_size: u32) -> Self {
        self.config.kernel_size = kernel_size;
        self
    }

    #[must_use]
    pub fn toggle_policy(mut self, policy: TogglePolicy) -> Self {
        self.config.toggle_policy = policy;
        self
    }

    #[must_use]
    pub fn overlay(mut self, overlay: OverlayStyle) -> Self {
        self.config.overlay = overlay;
        self
    }

    #[must_use]
    pub fn min_region_size(mut self, size: u32) -> Self {
        self.config.min_region_size = size;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<BlurConfig> {
        let config = self.config;
        config.validate()?;
        Ok(config)
    }
}

/// Largest accepted detector input side in pixels
pub const MAX_INPUT_SIDE: u32 = 4096;

/// Detector runtime configuration, handed to inference backends on initialize
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Execution provider for the ONNX backend
    pub execution_provider: ExecutionProvider,
    /// Minimum face score for a candidate to survive
    pub confidence_threshold: f32,
    /// IoU above which overlapping candidates are suppressed
    pub nms_iou_threshold: f32,
    /// Number of intra-op threads (0 = auto)
    pub intra_threads: usize,
    /// Number of inter-op threads (0 = auto)
    pub inter_threads: usize,
    /// Network input resolution as `(width, height)`; UltraFace RFB-320 takes 320x240, RFB-640 takes 640x480
    pub input_size: (u32, u32),
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            execution_provider: ExecutionProvider::Auto,
            confidence_threshold: 0.7,
            nms_iou_threshold: 0.3,
            intra_threads: 0,
            inter_threads: 0,
            input_size: (320, 240),
        }
    }
}

impl DetectorConfig {
    /// Validate thresholds
    ///
    /// # Errors
    /// - Confidence or IoU threshold outside `0.0..=1.0`
    /// - Zero or oversized input resolution
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(FaceBlurError::config_value_error(
                "confidence threshold",
                self.confidence_threshold,
                "0.0-1.0",
                Some(0.7),
            ));
        }
        if !(0.0..=1.0).contains(&self.nms_iou_threshold) {
            return Err(FaceBlurError::config_value_error(
                "NMS IoU threshold",
                self.nms_iou_threshold,
                "0.0-1.0",
                Some(0.3),
            ));
        }
        let (width, height) = self.input_size;
        if width == 0 || height == 0 || width > MAX_INPUT_SIDE || height > MAX_INPUT_SIDE {
            return Err(FaceBlurError::invalid_config(format!(
                "Detector input size {width}x{height} must be within 1-{MAX_INPUT_SIDE} on each side"
            )));
        }
        Ok(())
    }

    /// NCHW tensor shape the detector is fed
    #[must_use]
    pub fn input_shape(&self) -> (usize, usize, usize, usize) {
        let (width, height) = self.input_size;
        (1, 3, height as usize, width as usize)
    }

    /// Set both thread pools from a single count (0 = auto)
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.intra_threads = threads;
        self.inter_threads = if threads > 0 { (threads / 2).max(1) } else { 0 };
        self
    }
}
