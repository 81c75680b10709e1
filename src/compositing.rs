//! Masked blur compositing
//!
//! Turns the final region list into the blurred output image. Two strategies
//! are available, chosen through [`BlurStrategy`]:
//!
//! - [`BlurStrategy::EllipseMask`] blurs a full duplicate of the image and
//!   copies blurred pixels back only where the mask (one filled ellipse per
//!   region) is set. Everything outside the ellipses stays bit-identical.
//! - [`BlurStrategy::RectangleOverwrite`] blurs each bounding rectangle in
//!   place, leaving a visible rectangular patch.

use crate::{
    config::{BlurConfig, BlurStrategy},
    types::{Ellipse, FaceRegion},
};
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::{
    drawing::draw_filled_ellipse_mut,
    filter::box_filter,
    map::{blue_channel, green_channel, red_channel},
};
use instant::Instant;
use log::debug;
use tracing::{instrument, span, Level};

/// Mask value marking a pixel that takes the blurred color
pub const MASK_ON: u8 = 255;

/// Blur `regions` of `image` according to `config`
///
/// An empty region list returns an unchanged copy of the source.
#[instrument(skip(image, regions, config), fields(width = image.width(), height = image.height(), regions = regions.len(), strategy = %config.strategy))]
#[must_use]
pub fn blur_faces(image: &RgbImage, regions: &[FaceRegion], config: &BlurConfig) -> RgbImage {
    if regions.is_empty() {
        debug!("No regions selected, returning source unchanged");
        return image.clone();
    }

    let start = Instant::now();
    let output = match config.strategy {
        BlurStrategy::EllipseMask => {
            let blurred = box_blur(image, config.kernel_size);
            let mask = build_mask(image.width(), image.height(), regions);
            compose_masked(image, &blurred, &mask)
        },
        BlurStrategy::RectangleOverwrite => blur_rectangles(image, regions, config.kernel_size),
    };

    debug!(
        "Composited {} region(s) in {:.2}ms",
        regions.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );
    output
}

/// Box blur each channel with a `kernel_size` window
///
/// The window is `2 * (kernel_size / 2) + 1` pixels wide, so even sizes round
/// up to the next odd window. Edges are clamped.
#[must_use]
pub fn box_blur(image: &RgbImage, kernel_size: u32) -> RgbImage {
    let radius = kernel_size / 2;
    if radius == 0 || image.width() == 0 || image.height() == 0 {
        return image.clone();
    }

    let _span = span!(Level::DEBUG, "box_blur", kernel_size, radius).entered();

    let red = box_filter(&red_channel(image), radius, radius);
    let green = box_filter(&green_channel(image), radius, radius);
    let blue = box_filter(&blue_channel(image), radius, radius);

    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        Rgb([
            red.get_pixel(x, y)[0],
            green.get_pixel(x, y)[0],
            blue.get_pixel(x, y)[0],
        ])
    })
}

/// Build the single-channel selection mask: one filled inscribed ellipse per region
///
/// Regions whose ellipse has a zero radius enclose no pixels and are skipped.
/// Ellipses reaching past the mask edges are filled only where they overlap it.
#[must_use]
pub fn build_mask(width: u32, height: u32, regions: &[FaceRegion]) -> GrayImage {
    let mut mask = GrayImage::new(width, height);

    for region in regions {
        if region.is_degenerate() {
            debug!("Skipping degenerate region {region}");
            continue;
        }
        let ellipse = region.ellipse();
        let fits = u64::from(ellipse.center_x) + u64::from(ellipse.radius_x) < u64::from(width)
            && u64::from(ellipse.center_y) + u64::from(ellipse.radius_y) < u64::from(height);
        if fits {
            let (rx, ry) = ellipse.radii_i32();
            draw_filled_ellipse_mut(&mut mask, ellipse.center_i32(), rx, ry, Luma([MASK_ON]));
        } else {
            fill_clipped_ellipse(&mut mask, &ellipse);
        }
    }

    mask
}

/// Scanline fill of an ellipse that extends past the mask, visiting only rows and columns inside it
fn fill_clipped_ellipse(mask: &mut GrayImage, ellipse: &Ellipse) {
    let (width, height) = (i64::from(mask.width()), i64::from(mask.height()));
    let (cx, cy) = (i64::from(ellipse.center_x), i64::from(ellipse.center_y));
    let (rx, ry) = (f64::from(ellipse.radius_x), f64::from(ellipse.radius_y));

    let top = (cy - i64::from(ellipse.radius_y)).max(0);
    let bottom = (cy + i64::from(ellipse.radius_y)).min(height - 1);
    for y in top..=bottom {
        let dy = (y - cy) as f64 / ry;
        let half_width = (rx * (1.0 - dy * dy).max(0.0).sqrt()).floor() as i64;
        let left = (cx - half_width).max(0);
        let right = (cx + half_width).min(width - 1);
        for x in left..=right {
            mask.put_pixel(x as u32, y as u32, Luma([MASK_ON]));
        }
    }
}

/// Take `blurred` where `mask` is set and `source` everywhere else
#[must_use]
pub fn compose_masked(source: &RgbImage, blurred: &RgbImage, mask: &GrayImage) -> RgbImage {
    let mut output = source.clone();
    for (x, y, value) in mask.enumerate_pixels() {
        if value[0] != 0 && x < blurred.width() && y < blurred.height() {
            output.put_pixel(x, y, *blurred.get_pixel(x, y));
        }
    }
    output
}

/// Overwrite each region's rectangle with a box blur of itself
fn blur_rectangles(image: &RgbImage, regions: &[FaceRegion], kernel_size: u32) -> RgbImage {
    let mut output = image.clone();

    for region in regions {
        let Some(clipped) = region.clamp_to(image.width(), image.height()) else {
            debug!("Region {region} lies outside the image, skipping");
            continue;
        };

        let patch = image::imageops::crop_imm(
            &output,
            clipped.x,
            clipped.y,
            clipped.width,
            clipped.height,
        )
        .to_image();
        let blurred = box_blur(&patch, kernel_size);
        image::imageops::replace(
            &mut output,
            &blurred,
            i64::from(clipped.x),
            i64::from(clipped.y),
        );
    }

    output
}
