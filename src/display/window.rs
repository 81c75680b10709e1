//! Native window surface built on eframe

use super::SelectionSurface;
use crate::{
    error::{FaceBlurError, Result},
    selection::{PointerButton, PointerEvent, SelectionSession},
    types::{FaceRegion, PixelPoint},
};
use eframe::egui;
use image::RgbImage;
use log::{debug, info};
use std::{cell::RefCell, rc::Rc};

type SharedSession = Rc<RefCell<Box<dyn SelectionSession>>>;

/// Opens one native window per phase and blocks until it closes
#[derive(Debug, Clone, Copy)]
pub struct WindowSurface {
    max_window_size: [f32; 2],
}

impl Default for WindowSurface {
    fn default() -> Self {
        Self {
            max_window_size: [1280.0, 900.0],
        }
    }
}

impl WindowSurface {
    #[must_use]
    pub fn with_max_window_size(mut self, width: f32, height: f32) -> Self {
        self.max_window_size = [width, height];
        self
    }

    fn run(&self, title: &str, app: ImageWindow) -> Result<()> {
        let [w, h] = app.image_size;
        #[allow(clippy::cast_precision_loss)]
        let size = [
            (w as f32).clamp(160.0, self.max_window_size[0]),
            (h as f32).clamp(120.0, self.max_window_size[1]),
        ];

        let options = eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_title(title)
                .with_inner_size(size),
            ..Default::default()
        };

        eframe::run_native(title, options, Box::new(|_cc| Ok(Box::new(app))))
            .map_err(|e| FaceBlurError::display(format!("Window '{title}' failed: {e}")))
    }
}

impl SelectionSurface for WindowSurface {
    fn select(&mut self, title: &str, session: Box<dyn SelectionSession>) -> Result<Vec<FaceRegion>> {
        info!("{}", session.instructions());
        let shared: SharedSession = Rc::new(RefCell::new(session));
        self.run(title, ImageWindow::interactive(Rc::clone(&shared)))?;

        let regions = shared.borrow().regions();
        Ok(regions)
    }

    fn present(&mut self, title: &str, image: &RgbImage) -> Result<()> {
        info!("Press any key to close '{title}'");
        self.run(title, ImageWindow::still(image.clone()))
    }
}

enum Content {
    Session(SharedSession),
    Still(RgbImage),
}

struct ImageWindow {
    content: Content,
    texture: Option<egui::TextureHandle>,
    dirty: bool,
    image_size: [usize; 2],
}

impl ImageWindow {
    fn interactive(session: SharedSession) -> Self {
        let image_size = {
            let frame = session.borrow().overlay();
            [frame.width() as usize, frame.height() as usize]
        };
        Self {
            content: Content::Session(session),
            texture: None,
            dirty: true,
            image_size,
        }
    }

    fn still(image: RgbImage) -> Self {
        let image_size = [image.width() as usize, image.height() as usize];
        Self {
            content: Content::Still(image),
            texture: None,
            dirty: true,
            image_size,
        }
    }

    fn refresh_texture(&mut self, ctx: &egui::Context) {
        if !self.dirty && self.texture.is_some() {
            return;
        }

        let frame = match &self.content {
            Content::Session(session) => session.borrow().overlay(),
            Content::Still(image) => image.clone(),
        };
        let color_image = egui::ColorImage::from_rgb(self.image_size, frame.as_raw());

        match &mut self.texture {
            Some(texture) => texture.set(color_image, egui::TextureOptions::NEAREST),
            None => {
                self.texture = Some(ctx.load_texture("faceblur-frame", color_image, egui::TextureOptions::NEAREST));
            },
        }
        self.dirty = false;
    }
}

impl eframe::App for ImageWindow {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if ctx.input(|i| i.events.iter().any(|e| matches!(e, egui::Event::Key { pressed: true, .. }))) {
            debug!("Key pressed, closing window");
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            return;
        }

        self.refresh_texture(ctx);

        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| {
                let Some(texture) = &self.texture else {
                    return;
                };

                let texture_size = texture.size_vec2();
                let available = ui.available_size();
                let scale = if texture_size.x > 0.0 && texture_size.y > 0.0 {
                    (available.x / texture_size.x)
                        .min(available.y / texture_size.y)
                        .min(1.0)
                } else {
                    1.0
                };

                let response = ui.add(
                    egui::Image::new((texture.id(), texture_size * scale)).sense(egui::Sense::click_and_drag()),
                );

                let Content::Session(session) = &self.content else {
                    return;
                };

                let mapper = PixelMapper {
                    rect: response.rect,
                    scale,
                    image_size: self.image_size,
                };
                let events: Vec<PointerEvent> =
                    ctx.input(|i| i.events.iter().filter_map(|e| mapper.translate(e)).collect());

                let mut session = session.borrow_mut();
                for event in events {
                    if session.handle(event) {
                        self.dirty = true;
                    }
                }
            });

        if self.dirty {
            ctx.request_repaint();
        }
    }
}

/// Screen-to-image coordinate mapping for the displayed texture
struct PixelMapper {
    rect: egui::Rect,
    scale: f32,
    image_size: [usize; 2],
}

impl PixelMapper {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn to_pixel(&self, pos: egui::Pos2) -> PixelPoint {
        let max_x = self.image_size[0].saturating_sub(1) as f32;
        let max_y = self.image_size[1].saturating_sub(1) as f32;
        let x = ((pos.x - self.rect.min.x) / self.scale).clamp(0.0, max_x);
        let y = ((pos.y - self.rect.min.y) / self.scale).clamp(0.0, max_y);
        PixelPoint::new(x as u32, y as u32)
    }

    /// Presses must land on the image; moves and releases are clamped to it
    fn translate(&self, event: &egui::Event) -> Option<PointerEvent> {
        match event {
            egui::Event::PointerMoved(pos) => Some(PointerEvent::Moved { at: self.to_pixel(*pos) }),
            egui::Event::PointerButton {
                pos, button, pressed, ..
            } => {
                let button = match button {
                    egui::PointerButton::Primary => PointerButton::Primary,
                    egui::PointerButton::Secondary => PointerButton::Secondary,
                    _ => return None,
                };
                if *pressed {
                    if !self.rect.contains(*pos) {
                        return None;
                    }
                    Some(PointerEvent::Pressed {
                        button,
                        at: self.to_pixel(*pos),
                    })
                } else {
                    Some(PointerEvent::Released {
                        button,
                        at: self.to_pixel(*pos),
                    })
                }
            },
            _ => None,
        }
    }
}
