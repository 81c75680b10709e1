//! Manual free-draw session

use super::{draw_region_outline, PointerButton, PointerEvent, SelectionSession};
use crate::{
    config::{BlurConfig, OverlayStyle},
    types::{FaceRegion, PixelPoint},
};
use image::RgbImage;
use log::{debug, info};

/// Drag state of a [`DrawSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawState {
    Idle,
    Dragging {
        anchor: PixelPoint,
        current: PixelPoint,
    },
}

/// Manual mode: drag to add a region, right-click to delete one
///
/// The working image always equals the source plus one outline per region in
/// the list. The live drag preview is drawn on a copy and never persisted.
#[derive(Debug, Clone)]
pub struct DrawSession {
    source: RgbImage,
    working: RgbImage,
    regions: Vec<FaceRegion>,
    state: DrawState,
    style: OverlayStyle,
    min_region_size: u32,
}

impl DrawSession {
    #[must_use]
    pub fn new(source: RgbImage, config: &BlurConfig) -> Self {
        Self {
            working: source.clone(),
            source,
            regions: Vec::new(),
            state: DrawState::Idle,
            style: config.overlay,
            min_region_size: config.min_region_size,
        }
    }

    #[must_use]
    pub fn state(&self) -> DrawState {
        self.state
    }

    /// Source plus the persisted outlines, without any drag preview
    #[must_use]
    pub fn working_image(&self) -> &RgbImage {
        &self.working
    }

    fn finish_drag(&mut self, anchor: PixelPoint, release: PixelPoint) {
        let region = FaceRegion::from_corners(anchor, release);
        if region.width < self.min_region_size || region.height < self.min_region_size {
            debug!("Discarding {region}: smaller than {} px", self.min_region_size);
            return;
        }

        draw_region_outline(
            &mut self.working,
            &region,
            self.style.included_color,
            self.style.thickness,
        );
        self.regions.push(region);
        info!("Added region {region} ({} total)", self.regions.len());
    }

    /// Remove the first region containing `at`; returns whether one was removed
    fn delete_at(&mut self, at: PixelPoint) -> bool {
        let Some(index) = self.regions.iter().position(|r| r.contains(at)) else {
            return false;
        };

        let removed = self.regions.remove(index);
        info!("Removed region {removed} ({} left)", self.regions.len());
        self.redraw();
        true
    }

    fn redraw(&mut self) {
        self.working = self.source.clone();
        for region in &self.regions {
            draw_region_outline(
                &mut self.working,
                region,
                self.style.included_color,
                self.style.thickness,
            );
        }
    }
}

impl SelectionSession for DrawSession {
    fn handle(&mut self, event: PointerEvent) -> bool {
        match (self.state, event) {
            (
                DrawState::Idle,
                PointerEvent::Pressed {
                    button: PointerButton::Primary,
                    at,
                },
            ) => {
                self.state = DrawState::Dragging {
                    anchor: at,
                    current: at,
                };
                false
            },
            (DrawState::Dragging { anchor, .. }, PointerEvent::Moved { at }) => {
                self.state = DrawState::Dragging {
                    anchor,
                    current: at,
                };
                true
            },
            (
                DrawState::Dragging { anchor, .. },
                PointerEvent::Released {
                    button: PointerButton::Primary,
                    at,
                },
            ) => {
                self.state = DrawState::Idle;
                self.finish_drag(anchor, at);
                true
            },
            (
                _,
                PointerEvent::Pressed {
                    button: PointerButton::Secondary,
                    at,
                },
            ) => self.delete_at(at),
            _ => false,
        }
    }

    fn overlay(&self) -> RgbImage {
        let mut frame = self.working.clone();
        if let DrawState::Dragging { anchor, current } = self.state {
            let preview = FaceRegion::from_corners(anchor, current);
            draw_region_outline(
                &mut frame,
                &preview,
                self.style.included_color,
                self.style.thickness,
            );
        }
        frame
    }

    fn instructions(&self) -> &'static str {
        "Drag over each face you wish to blur. Right-click a face to remove it. When done, press any key to process the image."
    }

    fn regions(&self) -> Vec<FaceRegion> {
        self.regions.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn press(x: u32, y: u32) -> PointerEvent {
        PointerEvent::Pressed {
            button: PointerButton::Primary,
            at: PixelPoint::new(x, y),
        }
    }

    fn moved(x: u32, y: u32) -> PointerEvent {
        PointerEvent::Moved {
            at: PixelPoint::new(x, y),
        }
    }

    fn release(x: u32, y: u32) -> PointerEvent {
        PointerEvent::Released {
            button: PointerButton::Primary,
            at: PixelPoint::new(x, y),
        }
    }

    fn right_click(x: u32, y: u32) -> PointerEvent {
        PointerEvent::Pressed {
            button: PointerButton::Secondary,
            at: PixelPoint::new(x, y),
        }
    }

    fn session() -> DrawSession {
        DrawSession::new(RgbImage::from_pixel(100, 100, Rgb([30, 30, 30])), &BlurConfig::default())
    }

    fn drag(session: &mut DrawSession, from: (u32, u32), to: (u32, u32)) {
        session.handle(press(from.0, from.1));
        session.handle(moved(to.0, to.1));
        session.handle(release(to.0, to.1));
    }

    #[test]
    fn test_reverse_drag_is_normalized() {
        let mut session = session();
        drag(&mut session, (50, 50), (10, 10));
        assert_eq!(session.regions(), vec![FaceRegion::new(10, 10, 40, 40)]);
        assert_eq!(session.state(), DrawState::Idle);
    }

    #[test]
    fn test_state_transitions() {
        let mut session = session();
        assert_eq!(session.state(), DrawState::Idle);

        // Moves while idle do nothing
        assert!(!session.handle(moved(5, 5)));

        session.handle(press(20, 30));
        assert_eq!(
            session.state(),
            DrawState::Dragging {
                anchor: PixelPoint::new(20, 30),
                current: PixelPoint::new(20, 30)
            }
        );

        assert!(session.handle(moved(60, 70)));
        assert_eq!(
            session.state(),
            DrawState::Dragging {
                anchor: PixelPoint::new(20, 30),
                current: PixelPoint::new(60, 70)
            }
        );

        assert!(session.handle(release(60, 70)));
        assert_eq!(session.state(), DrawState::Idle);
        assert_eq!(session.regions(), vec![FaceRegion::new(20, 30, 40, 40)]);
    }

    #[test]
    fn test_preview_never_touches_working_image() {
        let mut session = session();
        let pristine = session.working_image().clone();

        session.handle(press(10, 10));
        session.handle(moved(60, 60));
        assert_eq!(session.working_image(), &pristine);
        assert_ne!(session.overlay(), pristine);

        session.handle(moved(40, 40));
        assert_eq!(session.working_image(), &pristine);
    }

    #[test]
    fn test_release_persists_outline() {
        let mut session = session();
        let pristine = session.working_image().clone();
        drag(&mut session, (10, 10), (60, 60));
        assert_ne!(session.working_image(), &pristine);
        assert_eq!(&session.overlay(), session.working_image());
    }

    #[test]
    fn test_plain_click_adds_nothing() {
        let mut session = session();
        session.handle(press(15, 15));
        session.handle(release(15, 15));
        assert!(session.regions().is_empty());
        assert_eq!(session.state(), DrawState::Idle);
    }

    #[test]
    fn test_right_click_removes_first_containing_region() {
        let mut session = session();
        drag(&mut session, (10, 10), (50, 50));
        drag(&mut session, (30, 30), (70, 70));
        drag(&mut session, (80, 80), (95, 95));

        // (40, 40) lies in both of the first two regions
        assert!(session.handle(right_click(40, 40)));
        assert_eq!(
            session.regions(),
            vec![FaceRegion::new(30, 30, 40, 40), FaceRegion::new(80, 80, 15, 15)]
        );

        // Clicking empty space removes nothing
        assert!(!session.handle(right_click(2, 2)));
        assert_eq!(session.regions().len(), 2);
    }

    #[test]
    fn test_delete_redraws_from_source() {
        let mut session = session();
        let pristine = session.working_image().clone();
        drag(&mut session, (10, 10), (50, 50));
        session.handle(right_click(30, 30));
        assert!(session.regions().is_empty());
        assert_eq!(session.working_image(), &pristine);
    }

    #[test]
    fn test_secondary_release_ignored() {
        let mut session = session();
        let event = PointerEvent::Released {
            button: PointerButton::Secondary,
            at: PixelPoint::new(1, 1),
        };
        assert!(!session.handle(event));
    }
}
