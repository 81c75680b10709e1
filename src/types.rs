//! Core geometric types shared by detection, selection and compositing

use serde::{Deserialize, Serialize};

/// A point in image pixel coordinates (origin top-left)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: u32,
    pub y: u32,
}

impl PixelPoint {
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned face rectangle `(x, y, width, height)` in pixel coordinates
///
/// Regions are produced by the detector, by a manual drag gesture or by a
/// regions file. `x`/`y` is always the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceRegion {
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Normalize a drag gesture into a rectangle, whatever the drag direction
    ///
    /// ```rust
    /// use faceblur::types::{FaceRegion, PixelPoint};
    ///
    /// let region = FaceRegion::from_corners(PixelPoint::new(50, 50), PixelPoint::new(10, 10));
    /// assert_eq!(region, FaceRegion::new(10, 10, 40, 40));
    /// ```
    #[must_use]
    pub fn from_corners(anchor: PixelPoint, current: PixelPoint) -> Self {
        Self {
            x: anchor.x.min(current.x),
            y: anchor.y.min(current.y),
            width: anchor.x.abs_diff(current.x),
            height: anchor.y.abs_diff(current.y),
        }
    }

    /// Inclusive containment test on both edges
    #[must_use]
    pub fn contains(&self, point: PixelPoint) -> bool {
        let (px, py) = (u64::from(point.x), u64::from(point.y));
        let (x, y) = (u64::from(self.x), u64::from(self.y));
        x <= px && px <= x + u64::from(self.width) && y <= py && py <= y + u64::from(self.height)
    }

    /// The ellipse inscribed in this rectangle
    #[must_use]
    pub fn ellipse(&self) -> Ellipse {
        Ellipse {
            center_x: self.x.saturating_add(self.width / 2),
            center_y: self.y.saturating_add(self.height / 2),
            radius_x: self.width / 2,
            radius_y: self.height / 2,
        }
    }

    /// Whether the inscribed ellipse encloses no pixels
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.width / 2 == 0 || self.height / 2 == 0
    }

    #[must_use]
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Clip the rectangle to an image of `width` x `height`
    ///
    /// Returns `None` when nothing of the region lies inside the image.
    #[must_use]
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Self> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let clipped = Self {
            x: self.x,
            y: self.y,
            width: self.width.min(width - self.x),
            height: self.height.min(height - self.y),
        };
        (clipped.width > 0 && clipped.height > 0).then_some(clipped)
    }
}

impl std::fmt::Display for FaceRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x, self.y, self.width, self.height)
    }
}

/// Ellipse inscribed in a [`FaceRegion`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ellipse {
    pub center_x: u32,
    pub center_y: u32,
    pub radius_x: u32,
    pub radius_y: u32,
}

impl Ellipse {
    /// Center as signed coordinates, the form the drawing primitives take
    #[must_use]
    pub fn center_i32(&self) -> (i32, i32) {
        (
            i32::try_from(self.center_x).unwrap_or(i32::MAX),
            i32::try_from(self.center_y).unwrap_or(i32::MAX),
        )
    }

    /// Radii as signed values, the form the drawing primitives take
    #[must_use]
    pub fn radii_i32(&self) -> (i32, i32) {
        (
            i32::try_from(self.radius_x).unwrap_or(i32::MAX),
            i32::try_from(self.radius_y).unwrap_or(i32::MAX),
        )
    }
}

/// A detector hit: a region plus the detector's confidence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    pub region: FaceRegion,
    pub confidence: f32,
}
