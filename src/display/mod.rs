//! Display surfaces that drive selection sessions and show results
//!
//! A surface owns the windowing side of an interaction: it shows the
//! session's overlay, translates operator input into [`PointerEvent`]s and
//! ends the phase on any key press.

#[cfg(feature = "gui")]
mod window;

#[cfg(feature = "gui")]
pub use window::WindowSurface;

use crate::{
    error::Result,
    selection::{PointerEvent, SelectionSession},
    types::FaceRegion,
};
use image::RgbImage;
use log::info;

/// Title of the selection window
pub const SELECTION_TITLE: &str = "Image";
/// Title of the result window
pub const RESULT_TITLE: &str = "Blurred Image";

/// Display substrate contract
pub trait SelectionSurface {
    /// Run `session` until the operator presses a key and return its regions
    fn select(&mut self, title: &str, session: Box<dyn SelectionSession>) -> Result<Vec<FaceRegion>>;

    /// Show `image` until the operator presses a key
    fn present(&mut self, title: &str, image: &RgbImage) -> Result<()>;
}

/// Non-interactive surface: accepts every session's initial result
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessSurface;

impl SelectionSurface for HeadlessSurface {
    fn select(&mut self, title: &str, session: Box<dyn SelectionSession>) -> Result<Vec<FaceRegion>> {
        let regions = session.regions();
        info!(
            "Non-interactive '{}': keeping {} region(s) as-is",
            title,
            regions.len()
        );
        Ok(regions)
    }

    fn present(&mut self, title: &str, image: &RgbImage) -> Result<()> {
        info!(
            "Non-interactive '{}': skipping preview of {}x{} image",
            title,
            image.width(),
            image.height()
        );
        Ok(())
    }
}

/// Surface that replays a fixed pointer script, for tests and scripted runs
#[derive(Debug, Default, Clone)]
pub struct ScriptedSurface {
    events: Vec<PointerEvent>,
    redraws: usize,
    presented: Vec<(String, RgbImage)>,
}

impl ScriptedSurface {
    #[must_use]
    pub fn new(events: Vec<PointerEvent>) -> Self {
        Self {
            events,
            redraws: 0,
            presented: Vec::new(),
        }
    }

    /// Number of events that changed an overlay across all sessions
    #[must_use]
    pub fn redraws(&self) -> usize {
        self.redraws
    }

    /// Images handed to [`SelectionSurface::present`], with their titles
    #[must_use]
    pub fn presented(&self) -> &[(String, RgbImage)] {
        &self.presented
    }
}

impl SelectionSurface for ScriptedSurface {
    fn select(&mut self, title: &str, mut session: Box<dyn SelectionSession>) -> Result<Vec<FaceRegion>> {
        info!("{}: {}", title, session.instructions());
        for event in self.events.drain(..) {
            if session.handle(event) {
                self.redraws += 1;
            }
        }
        Ok(session.regions())
    }

    fn present(&mut self, title: &str, image: &RgbImage) -> Result<()> {
        self.presented.push((title.to_string(), image.clone()));
        Ok(())
    }
}

/// Pick the surface for a run
///
/// Falls back to [`HeadlessSurface`] when interaction is requested but the
/// crate was built without the `gui` feature.
#[must_use]
pub fn default_surface(interactive: bool) -> Box<dyn SelectionSurface> {
    if !interactive {
        return Box::new(HeadlessSurface);
    }

    #[cfg(feature = "gui")]
    {
        Box::new(WindowSurface::default())
    }

    #[cfg(not(feature = "gui"))]
    {
        log::warn!("Built without the `gui` feature; running non-interactively");
        Box::new(HeadlessSurface)
    }
}
