//! Inclusion toggle over detected candidates

use super::{draw_region_outline, PointerButton, PointerEvent, SelectionSession};
use crate::{
    config::{BlurConfig, OverlayStyle, TogglePolicy},
    types::{FaceRegion, PixelPoint},
};
use image::RgbImage;
use log::info;

/// Automatic mode: every candidate starts included, clicks flip inclusion
///
/// `included` is created 1:1 with `candidates` and never resized, so the two
/// stay index-aligned for the whole session.
#[derive(Debug, Clone)]
pub struct ToggleSession {
    source: RgbImage,
    candidates: Vec<FaceRegion>,
    included: Vec<bool>,
    policy: TogglePolicy,
    style: OverlayStyle,
}

impl ToggleSession {
    #[must_use]
    pub fn new(source: RgbImage, candidates: Vec<FaceRegion>, config: &BlurConfig) -> Self {
        let included = vec![true; candidates.len()];
        Self {
            source,
            candidates,
            included,
            policy: config.toggle_policy,
            style: config.overlay,
        }
    }

    #[must_use]
    pub fn candidates(&self) -> &[FaceRegion] {
        &self.candidates
    }

    #[must_use]
    pub fn included(&self) -> &[bool] {
        &self.included
    }

    /// Flip every candidate under `at` (or the first, per policy); returns how many flipped
    pub fn toggle_at(&mut self, at: PixelPoint) -> usize {
        let mut flipped = 0;
        for (region, included) in self.candidates.iter().zip(self.included.iter_mut()) {
            if !region.contains(at) {
                continue;
            }
            *included = !*included;
            flipped += 1;
            info!(
                "Face {region} will be {}",
                if *included { "blurred" } else { "exposed" }
            );
            if self.policy == TogglePolicy::First {
                break;
            }
        }
        flipped
    }
}

impl SelectionSession for ToggleSession {
    fn handle(&mut self, event: PointerEvent) -> bool {
        match event {
            PointerEvent::Pressed {
                button: PointerButton::Primary,
                at,
            } => self.toggle_at(at) > 0,
            _ => false,
        }
    }

    fn overlay(&self) -> RgbImage {
        let mut frame = self.source.clone();
        for (region, &included) in self.candidates.iter().zip(&self.included) {
            let color = if included {
                self.style.included_color
            } else {
                self.style.excluded_color
            };
            draw_region_outline(&mut frame, region, color, self.style.thickness);
        }
        frame
    }

    fn instructions(&self) -> &'static str {
        "Click on all faces you wish to expose. When done selecting, press any key to process the image."
    }

    fn regions(&self) -> Vec<FaceRegion> {
        self.candidates
            .iter()
            .zip(&self.included)
            .filter(|&(_, &included)| included)
            .map(|(region, _)| *region)
            .collect()
    }
}
