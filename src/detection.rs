//! Face detection: candidate acquisition for automatic mode
//!
//! [`ModelFaceDetector`] runs an UltraFace-style network through any
//! [`InferenceBackend`] and decodes its anchor outputs into pixel regions:
//! confidence filter, greedy NMS, scale and clamp to the source image, then a
//! stable top-to-bottom, left-to-right ordering.

use crate::{
    config::DetectorConfig,
    error::{FaceBlurError, Result},
    inference::{InferenceBackend, RawDetections},
    types::{FaceDetection, FaceRegion},
    utils::{ImagePreprocessor, PreprocessingOptions},
};
use image::DynamicImage;
use instant::Instant;
use log::{debug, info};
use tracing::instrument;

/// Anything that proposes face rectangles for an image
pub trait FaceDetector {
    /// Detect faces in `image`, returning regions in its pixel coordinates
    ///
    /// # Errors
    /// - Preprocessing, inference or postprocessing failures
    fn detect(&mut self, image: &DynamicImage) -> Result<Vec<FaceDetection>>;
}

/// Box in source pixel coordinates, kept as floats until the final rounding
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
}

impl BoundingBox {
    #[must_use]
    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    #[must_use]
    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    /// Intersection over union with another box
    #[must_use]
    pub fn iou(&self, other: &Self) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if inter <= 0.0 {
            return 0.0;
        }
        let union = self.width() * self.height() + other.width() * other.height() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }

    /// Round corners to whole pixels; `None` when nothing remains
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    #[must_use]
    pub fn to_region(&self) -> Option<FaceRegion> {
        let x1 = self.x1.round().max(0.0) as u32;
        let y1 = self.y1.round().max(0.0) as u32;
        let x2 = self.x2.round().max(0.0) as u32;
        let y2 = self.y2.round().max(0.0) as u32;
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(FaceRegion::new(x1, y1, x2 - x1, y2 - y1))
    }
}

/// Greedy non-maximum suppression, highest confidence first
#[must_use]
pub fn nms(mut boxes: Vec<BoundingBox>, iou_threshold: f32) -> Vec<BoundingBox> {
    boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<BoundingBox> = Vec::with_capacity(boxes.len());
    for candidate in boxes {
        if kept.iter().all(|k| k.iou(&candidate) <= iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}

/// Turn raw detector heads into ordered pixel detections for a `width`x`height` image
///
/// # Errors
/// - Score and box heads disagree in shape
pub fn decode_detections(
    raw: &RawDetections,
    width: u32,
    height: u32,
    config: &DetectorConfig,
) -> Result<Vec<FaceDetection>> {
    let anchors = raw.anchors()?;
    #[allow(clippy::cast_precision_loss)]
    let (w, h) = (width as f32, height as f32);

    let mut candidates = Vec::new();
    for row in 0..anchors {
        let confidence = raw.scores[[row, 1]];
        if confidence.is_nan() || confidence < config.confidence_threshold {
            continue;
        }
        candidates.push(BoundingBox {
            x1: (raw.boxes[[row, 0]] * w).clamp(0.0, w),
            y1: (raw.boxes[[row, 1]] * h).clamp(0.0, h),
            x2: (raw.boxes[[row, 2]] * w).clamp(0.0, w),
            y2: (raw.boxes[[row, 3]] * h).clamp(0.0, h),
            confidence,
        });
    }
    debug!("{} of {anchors} anchors above confidence {}", candidates.len(), config.confidence_threshold);

    let mut detections: Vec<FaceDetection> = nms(candidates, config.nms_iou_threshold)
        .into_iter()
        .filter_map(|b| {
            b.to_region()
                .and_then(|r| r.clamp_to(width, height))
                .map(|region| FaceDetection {
                    region,
                    confidence: b.confidence,
                })
        })
        .collect();

    detections.sort_by_key(|d| (d.region.y, d.region.x));
    Ok(detections)
}

/// Detector backed by a neural network running on an [`InferenceBackend`]
pub struct ModelFaceDetector {
    backend: Box<dyn InferenceBackend>,
    config: DetectorConfig,
    preprocessing: PreprocessingOptions,
}

impl ModelFaceDetector {
    /// Wrap and initialize `backend`
    ///
    /// # Errors
    /// - Invalid thresholds
    /// - Backend initialization failures
    pub fn new(mut backend: Box<dyn InferenceBackend>, config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        if let Some(load_time) = backend.initialize(&config)? {
            info!("Detector ready in {:.0}ms", load_time.as_secs_f64() * 1000.0);
        }
        Ok(Self {
            backend,
            config,
            preprocessing: PreprocessingOptions::default(),
        })
    }

    #[must_use]
    pub fn with_preprocessing(mut self, preprocessing: PreprocessingOptions) -> Self {
        self.preprocessing = preprocessing;
        self
    }

    #[must_use]
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }
}

impl FaceDetector for ModelFaceDetector {
    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    fn detect(&mut self, image: &DynamicImage) -> Result<Vec<FaceDetection>> {
        let start = Instant::now();
        let tensor =
            ImagePreprocessor::preprocess_for_detector(image, self.backend.input_shape(), &self.preprocessing)?;

        let raw = self.backend.infer(&tensor).map_err(|e| match e {
            FaceBlurError::Inference(msg) => FaceBlurError::detector(format!("Inference failed: {msg}")),
            other => other,
        })?;
        let detections = decode_detections(&raw, image.width(), image.height(), &self.config)?;

        info!(
            "Detected {} face(s) in {:.0}ms",
            detections.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(detections)
    }
}

/// Detector that returns a fixed region list, e.g. loaded from a regions file
#[derive(Debug, Clone, Default)]
pub struct StaticDetector {
    regions: Vec<FaceRegion>,
}

impl StaticDetector {
    #[must_use]
    pub fn new(regions: Vec<FaceRegion>) -> Self {
        Self { regions }
    }
}

impl FaceDetector for StaticDetector {
    fn detect(&mut self, image: &DynamicImage) -> Result<Vec<FaceDetection>> {
        let detections: Vec<FaceDetection> = self
            .regions
            .iter()
            .filter_map(|r| r.clamp_to(image.width(), image.height()))
            .map(|region| FaceDetection {
                region,
                confidence: 1.0,
            })
            .collect();

        if detections.len() < self.regions.len() {
            debug!(
                "Dropped {} region(s) outside the {}x{} image",
                self.regions.len() - detections.len(),
                image.width(),
                image.height()
            );
        }
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::MockDetectorBackend;
    use image::RgbImage;
    use ndarray::Array2;

    fn bbox(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> BoundingBox {
        BoundingBox {
            x1,
            y1,
            x2,
            y2,
            confidence,
        }
    }

    fn raw(anchors: &[([f32; 4], f32)]) -> RawDetections {
        let mut scores = Array2::zeros((anchors.len(), 2));
        let mut boxes = Array2::zeros((anchors.len(), 4));
        for (i, (corners, score)) in anchors.iter().enumerate() {
            scores[[i, 0]] = 1.0 - score;
            scores[[i, 1]] = *score;
            for (j, v) in corners.iter().enumerate() {
                boxes[[i, j]] = *v;
            }
        }
        RawDetections { scores, boxes }
    }

    #[test]
    fn test_iou() {
        let a = bbox(0.0, 0.0, 10.0, 10.0, 1.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
        assert_eq!(a.iou(&bbox(20.0, 20.0, 30.0, 30.0, 1.0)), 0.0);

        // Half overlap: 50 / 150
        let b = bbox(5.0, 0.0, 15.0, 10.0, 1.0);
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_nms_suppresses_overlaps() {
        let boxes = vec![
            bbox(0.0, 0.0, 10.0, 10.0, 0.8),
            bbox(1.0, 1.0, 11.0, 11.0, 0.95),
            bbox(50.0, 50.0, 60.0, 60.0, 0.75),
        ];
        let kept = nms(boxes, 0.3);
        assert_eq!(kept.len(), 2);
        assert!((kept[0].confidence - 0.95).abs() < 1e-6);
        assert!((kept[1].confidence - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_decode_scales_and_clamps() {
        let raw = raw(&[([0.1, 0.2, 0.3, 0.4], 0.9), ([0.9, 0.9, 1.2, 1.3], 0.8)]);
        let detections = decode_detections(&raw, 200, 100, &DetectorConfig::default()).unwrap();

        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].region, FaceRegion::new(20, 20, 40, 20));
        // Second box spills past the image and is clamped to it
        assert_eq!(detections[1].region, FaceRegion::new(180, 90, 20, 10));
    }

    #[test]
    fn test_decode_filters_low_confidence() {
        let raw = raw(&[([0.1, 0.1, 0.2, 0.2], 0.69), ([0.5, 0.5, 0.6, 0.6], 0.7)]);
        let detections = decode_detections(&raw, 100, 100, &DetectorConfig::default()).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].region, FaceRegion::new(50, 50, 10, 10));
    }

    #[test]
    fn test_decode_orders_top_to_bottom_then_left_to_right() {
        let raw = raw(&[
            ([0.6, 0.5, 0.7, 0.6], 0.99),
            ([0.1, 0.5, 0.2, 0.6], 0.9),
            ([0.4, 0.1, 0.5, 0.2], 0.8),
        ]);
        let detections = decode_detections(&raw, 100, 100, &DetectorConfig::default()).unwrap();
        let origins: Vec<_> = detections.iter().map(|d| (d.region.x, d.region.y)).collect();
        assert_eq!(origins, vec![(40, 10), (10, 50), (60, 50)]);
    }

    #[test]
    fn test_decode_drops_empty_boxes() {
        let raw = raw(&[([0.5, 0.5, 0.5, 0.5], 0.99), ([1.5, 1.5, 2.0, 2.0], 0.99)]);
        assert!(decode_detections(&raw, 100, 100, &DetectorConfig::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_model_detector_with_mock_backend() {
        let backend = MockDetectorBackend::with_anchors(vec![([0.25, 0.25, 0.5, 0.75], 0.95)]);
        let mut detector = ModelFaceDetector::new(Box::new(backend), DetectorConfig::default()).unwrap();

        let image = DynamicImage::ImageRgb8(RgbImage::new(400, 200));
        let detections = detector.detect(&image).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].region, FaceRegion::new(100, 50, 100, 100));
    }

    #[test]
    fn test_model_detector_feeds_configured_input_size() {
        let backend = MockDetectorBackend::with_anchors(vec![([0.5, 0.5, 0.75, 1.0], 0.9)]);
        let history = backend.call_history();
        let config = DetectorConfig {
            input_size: (640, 480),
            ..DetectorConfig::default()
        };
        let mut detector = ModelFaceDetector::new(Box::new(backend), config).unwrap();
        assert_eq!(detector.backend.input_shape(), (1, 3, 480, 640));

        // The mock rejects tensors that do not match the configured shape
        let image = DynamicImage::ImageRgb8(RgbImage::new(200, 100));
        let detections = detector.detect(&image).unwrap();
        assert_eq!(detections[0].region, FaceRegion::new(100, 50, 50, 50));
        assert_eq!(*history.lock().unwrap(), vec!["initialize", "infer"]);
    }

    #[test]
    fn test_inference_failure_is_detector_failure() {
        let backend = MockDetectorBackend::new_failing_inference();
        let mut detector = ModelFaceDetector::new(Box::new(backend), DetectorConfig::default()).unwrap();
        let image = DynamicImage::ImageRgb8(RgbImage::new(10, 10));
        assert!(matches!(detector.detect(&image), Err(FaceBlurError::DetectorFailure(_))));
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let config = DetectorConfig {
            confidence_threshold: 1.5,
            ..DetectorConfig::default()
        };
        assert!(ModelFaceDetector::new(Box::new(MockDetectorBackend::new()), config).is_err());
    }

    #[test]
    fn test_static_detector_clamps_regions() {
        let mut detector = StaticDetector::new(vec![
            FaceRegion::new(10, 10, 20, 20),
            FaceRegion::new(90, 90, 30, 30),
            FaceRegion::new(200, 200, 5, 5),
        ]);
        let image = DynamicImage::ImageRgb8(RgbImage::new(100, 100));
        let regions: Vec<_> = detector.detect(&image).unwrap().into_iter().map(|d| d.region).collect();
        assert_eq!(
            regions,
            vec![FaceRegion::new(10, 10, 20, 20), FaceRegion::new(90, 90, 10, 10)]
        );
    }
}
