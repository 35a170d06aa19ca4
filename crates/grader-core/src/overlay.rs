//! The per-page annotation raster layer.
//!
//! An [`Overlay`] is a transparent RGBA surface the same size as its page
//! raster. Drawing tools composite into it incrementally; presentation gets
//! the page by alpha-blending the overlay over the immutable raster with
//! [`composite`]. Erasing clears overlay pixels back to transparent, so the
//! scan underneath is never damaged.

use crate::annotation::{Color, PagePoint};
use ab_glyph::FontVec;
use image::{Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_circle_mut, draw_hollow_rect_mut,
    draw_line_segment_mut, draw_text_mut, text_size,
};
use imageproc::rect::Rect;
use tracing::debug;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

fn pixel(color: Color) -> Rgba<u8> {
    Rgba([color.r, color.g, color.b, color.a])
}

#[derive(Debug, Clone)]
pub struct Overlay {
    image: RgbaImage,
}

impl Overlay {
    pub fn new(width: u32, height: u32) -> Self {
        Self { image: RgbaImage::from_pixel(width.max(1), height.max(1), TRANSPARENT) }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Number of pixels carrying any ink. Blank overlays report 0.
    pub fn ink_count(&self) -> usize {
        self.image.pixels().filter(|px| px.0[3] != 0).count()
    }

    pub fn clear(&mut self) {
        let (width, height) = (self.image.width(), self.image.height());
        self.image = RgbaImage::from_pixel(width, height, TRANSPARENT);
    }

    pub fn to_png(&self) -> Result<Vec<u8>, image::ImageError> {
        let mut bytes = Vec::new();
        self.image.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)?;
        Ok(bytes)
    }

    pub fn from_png(bytes: &[u8]) -> Result<Self, image::ImageError> {
        Ok(Self { image: image::load_from_memory(bytes)?.to_rgba8() })
    }

    /// Opaque brush pass from `from` to `to`, used by the pen and, with a
    /// narrow width, the underline.
    pub fn brush_segment(&mut self, from: PagePoint, to: PagePoint, color: Color, width: f32) {
        self.disk_pass(from, to, width, pixel(color));
    }

    /// Translucent brush pass; the alpha rides in `color` and is blended only
    /// at composite time, so repeated passes over one pixel do not stack.
    pub fn highlight_segment(&mut self, from: PagePoint, to: PagePoint, color: Color, width: f32) {
        self.disk_pass(from, to, width, pixel(color));
    }

    /// Destructive erase pass: overlay pixels return to transparent.
    pub fn erase_segment(&mut self, from: PagePoint, to: PagePoint, width: f32) {
        self.disk_pass(from, to, width, TRANSPARENT);
    }

    fn disk_pass(&mut self, from: PagePoint, to: PagePoint, width: f32, ink: Rgba<u8>) {
        let radius = ((width / 2.0).round() as i32).max(1);
        let steps = from.distance_to(&to).ceil().max(1.0) as i32;

        for step in 0..=steps {
            let t = step as f32 / steps as f32;
            let x = (from.x + (to.x - from.x) * t).round() as i32;
            let y = (from.y + (to.y - from.y) * t).round() as i32;
            draw_filled_circle_mut(&mut self.image, (x, y), radius, ink);
        }
    }

    pub fn stamp_tick(&mut self, at: PagePoint, size: f32, color: Color) {
        let s = size;
        let left = PagePoint::new(at.x - 0.45 * s, at.y - 0.05 * s);
        let low = PagePoint::new(at.x - 0.12 * s, at.y + 0.32 * s);
        let high = PagePoint::new(at.x + 0.50 * s, at.y - 0.42 * s);

        let width = (s / 7.0).max(2.0);
        self.brush_segment(left, low, color, width);
        self.brush_segment(low, high, color, width);
    }

    pub fn stamp_cross(&mut self, at: PagePoint, size: f32, color: Color) {
        let arm = 0.38 * size;
        let width = (size / 7.0).max(2.0);

        self.brush_segment(
            PagePoint::new(at.x - arm, at.y - arm),
            PagePoint::new(at.x + arm, at.y + arm),
            color,
            width,
        );
        self.brush_segment(
            PagePoint::new(at.x - arm, at.y + arm),
            PagePoint::new(at.x + arm, at.y - arm),
            color,
            width,
        );
    }

    /// Half-credit glyph: a tick with a slash through its long arm.
    pub fn stamp_partial(&mut self, at: PagePoint, size: f32, color: Color) {
        self.stamp_tick(at, size, color);
        self.brush_segment(
            PagePoint::new(at.x + 0.08 * size, at.y - 0.52 * size),
            PagePoint::new(at.x - 0.22 * size, at.y + 0.42 * size),
            color,
            (size / 9.0).max(2.0),
        );
    }

    /// Speech-bubble marker left where a comment is anchored. The comment
    /// text itself lives in the annotation record, not on the raster.
    pub fn stamp_comment_marker(&mut self, at: PagePoint, size: f32, color: Color) {
        let w = size.max(8.0).round() as u32;
        let h = (size * 0.75).max(6.0).round() as u32;
        let x = (at.x - size / 2.0).round() as i32;
        let y = (at.y - size * 0.75 / 2.0).round() as i32;

        draw_filled_rect_mut(&mut self.image, Rect::at(x, y).of_size(w, h), pixel(color));
        draw_hollow_rect_mut(&mut self.image, Rect::at(x, y).of_size(w, h), pixel(Color::BLACK));
        draw_line_segment_mut(
            &mut self.image,
            (x as f32 + 2.0, (y + h as i32) as f32),
            (x as f32 - 2.0, (y + h as i32) as f32 + size * 0.3),
            pixel(color),
        );
    }

    /// Numbered score badge: white disc, colored ring, centered value label.
    /// Without a usable font the label is skipped and the badge still stamps.
    pub fn stamp_badge(
        &mut self,
        at: PagePoint,
        radius: f32,
        color: Color,
        label: &str,
        font: Option<&FontVec>,
    ) {
        let center = (at.x.round() as i32, at.y.round() as i32);
        let r = (radius.round() as i32).max(4);

        draw_filled_circle_mut(&mut self.image, center, r, pixel(Color::WHITE));
        draw_hollow_circle_mut(&mut self.image, center, r, pixel(color));
        draw_hollow_circle_mut(&mut self.image, center, r - 1, pixel(color));

        let Some(font) = font else {
            return;
        };

        let scale = radius * 1.2;
        let (text_w, text_h) = text_size(scale, font, label);
        let x = center.0 - (text_w as i32) / 2;
        let y = center.1 - (text_h as i32) / 2;
        draw_text_mut(&mut self.image, pixel(color), x, y, scale, font, label);
    }
}

/// Blends the live overlay over the page raster for presentation.
pub fn composite(raster: &RgbaImage, overlay: &Overlay) -> RgbaImage {
    let mut out = raster.clone();
    image::imageops::overlay(&mut out, overlay.image(), 0, 0);
    out
}

/// Loads a font for badge labels from common system locations. Returns None
/// when no candidate parses; callers stamp label-free badges in that case.
pub fn load_system_font() -> Option<FontVec> {
    let candidates = [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/System/Library/Fonts/Supplemental/Arial.ttf",
        "C:\\Windows\\Fonts\\arial.ttf",
    ];

    for path in candidates {
        if let Ok(bytes) = std::fs::read(path) {
            if let Ok(font) = FontVec::try_from_vec(bytes) {
                debug!(path, "loaded badge font");
                return Some(font);
            }
        }
    }

    debug!("no system font found, badge labels will be skipped");
    None
}
