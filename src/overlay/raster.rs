//! Headless overlay rendering
//!
//! Burns outlines and label chips into a copy of the source image. Glyphs are
//! not rasterized here; headless runs report the recognized text alongside
//! the image.

use image::{Pixel, Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_rect_mut;

use super::{layout, EstimatedMetrics, OverlayShape, OverlayStyle};
use crate::vision::{Detection, Rect, SourceImage};

/// Render the overlay at the image's own resolution
pub fn render_annotated(image: &SourceImage, detections: &[Detection], style: &OverlayStyle) -> RgbaImage {
    let mut canvas: RgbaImage = image::DynamicImage::ImageRgb8(image.rgb().clone()).to_rgba8();
    let size = image.size();

    for shape in layout(size, size, detections, style, &EstimatedMetrics) {
        match shape {
            OverlayShape::Outline { rect } => stroke_rect(&mut canvas, rect, style.stroke_width, style.stroke_color),
            OverlayShape::Label { chip, .. } => fill_rounded_rect(&mut canvas, chip, style.corner_radius, style.chip_color),
        }
    }

    canvas
}

/// Stroke centered on the rect edge, `width` pixels thick
fn stroke_rect(canvas: &mut RgbaImage, rect: Rect, width: f32, color: [u8; 4]) {
    let lines = width.round().max(1.0) as i32;
    let half = lines / 2;

    for i in 0..lines {
        let inset = (i - half) as f32;
        let w = (rect.width - 2.0 * inset).round();
        let h = (rect.height - 2.0 * inset).round();
        if w < 1.0 || h < 1.0 {
            continue;
        }
        let r = imageproc::rect::Rect::at((rect.x + inset).round() as i32, (rect.y + inset).round() as i32)
            .of_size(w as u32, h as u32);
        draw_hollow_rect_mut(canvas, r, Rgba(color));
    }
}

/// Alpha-blend a rounded rectangle, clipped to the canvas
fn fill_rounded_rect(canvas: &mut RgbaImage, rect: Rect, radius: f32, color: [u8; 4]) {
    let (cw, ch) = canvas.dimensions();
    let x0 = rect.min_x().floor().max(0.0) as u32;
    let y0 = rect.min_y().floor().max(0.0) as u32;
    let x1 = (rect.max_x().ceil().max(0.0) as u32).min(cw);
    let y1 = (rect.max_y().ceil().max(0.0) as u32).min(ch);
    let radius = radius.min(rect.width / 2.0).min(rect.height / 2.0).max(0.0);
    let color = Rgba(color);

    for y in y0..y1 {
        for x in x0..x1 {
            if inside_rounded(rect, radius, x as f32 + 0.5, y as f32 + 0.5) {
                canvas.get_pixel_mut(x, y).blend(&color);
            }
        }
    }
}

fn inside_rounded(rect: Rect, radius: f32, px: f32, py: f32) -> bool {
    if px < rect.min_x() || px > rect.max_x() || py < rect.min_y() || py > rect.max_y() {
        return false;
    }
    // Distance to the nearest corner circle center
    let cx = px.clamp(rect.min_x() + radius, rect.max_x() - radius);
    let cy = py.clamp(rect.min_y() + radius, rect.max_y() - radius);
    let (dx, dy) = (px - cx, py - cy);
    dx * dx + dy * dy <= radius * radius
}
