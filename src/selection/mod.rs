//! Interactive face selection
//!
//! A selection phase is an explicit state machine ([`SelectionSession`]) fed
//! with discrete [`PointerEvent`]s by whatever display surface is showing the
//! image. Sessions own all their state (region list, inclusion flags, drag
//! anchor, working image); nothing is shared between phases.
//!
//! - [`DrawSession`]: manual mode, the operator drags ellipses over faces and
//!   right-clicks to delete one.
//! - [`ToggleSession`]: automatic mode, every candidate starts included and a
//!   click flips the candidates under the pointer.

mod draw;
mod toggle;

pub use draw::{DrawSession, DrawState};
pub use toggle::ToggleSession;

use crate::types::{FaceRegion, PixelPoint};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_ellipse_mut;

/// Mouse button carried by a pointer event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
}

/// Pointer input in image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    Pressed { button: PointerButton, at: PixelPoint },
    Moved { at: PixelPoint },
    Released { button: PointerButton, at: PixelPoint },
}

impl PointerEvent {
    #[must_use]
    pub fn position(&self) -> PixelPoint {
        match *self {
            Self::Pressed { at, .. } | Self::Moved { at } | Self::Released { at, .. } => at,
        }
    }
}

/// One interaction phase driven by pointer events until a key press ends it
pub trait SelectionSession {
    /// Feed one pointer event; returns `true` when the overlay changed
    fn handle(&mut self, event: PointerEvent) -> bool;

    /// Image to display right now (source plus overlays)
    fn overlay(&self) -> RgbImage;

    /// Operator instructions for this phase
    fn instructions(&self) -> &'static str;

    /// Regions to blur if the phase ended now
    fn regions(&self) -> Vec<FaceRegion>;
}

/// Outline a region's inscribed ellipse with a `thickness`-pixel stroke
pub fn draw_region_outline(canvas: &mut RgbImage, region: &FaceRegion, color: [u8; 3], thickness: u32) {
    let ellipse = region.ellipse();
    let (rx, ry) = ellipse.radii_i32();
    let center = ellipse.center_i32();
    let thickness = i32::try_from(thickness).unwrap_or(1);

    // Concentric outlines grow the stroke inwards
    for inset in 0..thickness {
        let (ix, iy) = (rx - inset, ry - inset);
        if ix < 0 || iy < 0 {
            break;
        }
        draw_hollow_ellipse_mut(canvas, center, ix, iy, Rgb(color));
    }
}
