//! Detection overlay
//!
//! Lays out a stroked box per detection and, when text was read, a rounded
//! chip above the box carrying the text. The layout is pure geometry in
//! display space; the viewer paints it with egui and [`raster`] burns it into
//! an image for headless runs.

pub mod raster;

use serde::{Deserialize, Serialize};

use crate::vision::geometry::{display_rect, to_display};
use crate::vision::{Detection, Rect, Size};

/// Visual parameters of the overlay. Colors are unmultiplied RGBA.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    /// Bounding box line width
    pub stroke_width: f32,
    pub stroke_color: [u8; 4],
    /// Text chip fill
    pub chip_color: [u8; 4],
    pub text_color: [u8; 4],
    /// Label font size (bold)
    pub font_size: f32,
    /// Distance from the chip top to the box top
    pub chip_offset: f32,
    /// Extra chip size around the measured text (horizontal, vertical)
    pub chip_padding: [f32; 2],
    pub corner_radius: f32,
    /// Text anchor (left edge, vertical center) relative to the chip origin
    pub text_inset: [f32; 2],
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            stroke_width: 3.0,
            stroke_color: [255, 0, 0, 255],
            // Yellow at 0.9 opacity
            chip_color: [255, 255, 0, 230],
            text_color: [0, 0, 0, 255],
            font_size: 16.0,
            chip_offset: 25.0,
            chip_padding: [10.0, 6.0],
            corner_radius: 5.0,
            text_inset: [5.0, 12.0],
        }
    }
}

/// Measures rendered text
pub trait TextMeasure {
    fn measure(&self, text: &str, font_size: f32) -> Size;
}

/// Font-less estimate for when no real font metrics are available
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimatedMetrics;

impl TextMeasure for EstimatedMetrics {
    fn measure(&self, text: &str, font_size: f32) -> Size {
        Size::new(text.chars().count() as f32 * font_size * 0.6, font_size * 1.2)
    }
}

/// One drawable element of the overlay, in display (canvas) pixels
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayShape {
    /// Stroked bounding box
    Outline { rect: Rect },
    /// Filled rounded chip with its text; `text_pos` is the left-center anchor
    Label { chip: Rect, text: String, text_pos: (f32, f32) },
}

/// Lay out the overlay for `detections` over an image of `image` size shown
/// aspect-fit inside `canvas`.
///
/// The display rect is recomputed on every call, so a canvas resize needs no
/// invalidation.
pub fn layout(
    canvas: Size,
    image: Size,
    detections: &[Detection],
    style: &OverlayStyle,
    measure: &dyn TextMeasure,
) -> Vec<OverlayShape> {
    let display = display_rect(canvas, image);
    if display.is_empty() {
        return Vec::new();
    }

    let mut shapes = Vec::with_capacity(detections.len() * 2);
    for detection in detections {
        let rect = to_display(detection.bounding_box, display);
        debug_assert!(display.contains_rect(&rect));
        shapes.push(OverlayShape::Outline { rect });

        if let Some(text) = &detection.recognized_text {
            let text_size = measure.measure(text, style.font_size);
            let chip = Rect::new(
                rect.min_x(),
                rect.min_y() - style.chip_offset,
                text_size.width + style.chip_padding[0],
                text_size.height + style.chip_padding[1],
            );
            shapes.push(OverlayShape::Label {
                chip,
                text: text.clone(),
                text_pos: (chip.x + style.text_inset[0], chip.y + style.text_inset[1]),
            });
        }
    }

    shapes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::{DetectedObject, NormalizedRect};

    fn detection(bounding_box: NormalizedRect, text: Option<&str>) -> Detection {
        Detection::new(
            DetectedObject {
                bounding_box,
                confidence: 0.9,
            },
            text.map(str::to_string),
        )
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_default_style() {
        let style = OverlayStyle::default();
        assert_eq!(style.stroke_width, 3.0);
        assert_eq!(style.stroke_color, [255, 0, 0, 255]);
        assert_eq!(style.chip_color[..3], [255, 255, 0]);
        assert_eq!(style.font_size, 16.0);
        assert_eq!(style.chip_offset, 25.0);
    }

    #[test]
    fn test_estimated_metrics() {
        let size = EstimatedMetrics.measure("42", 16.0);
        assert!(approx(size.width, 19.2));
        assert!(approx(size.height, 19.2));
    }

    #[test]
    fn test_outline_only_without_text() {
        let detections = [detection(NormalizedRect::new(0.1, 0.2, 0.3, 0.4), None)];
        let shapes = layout(
            Size::new(100.0, 100.0),
            Size::new(100.0, 100.0),
            &detections,
            &OverlayStyle::default(),
            &EstimatedMetrics,
        );

        assert_eq!(shapes.len(), 1);
        match &shapes[0] {
            OverlayShape::Outline { rect } => {
                assert!(approx(rect.x, 10.0) && approx(rect.y, 40.0));
                assert!(approx(rect.width, 30.0) && approx(rect.height, 40.0));
            }
            other => panic!("unexpected shape {:?}", other),
        }
    }

    #[test]
    fn test_label_chip_sits_above_box() {
        let detections = [detection(NormalizedRect::new(0.1, 0.2, 0.3, 0.4), Some("42"))];
        let style = OverlayStyle::default();
        let shapes = layout(
            Size::new(400.0, 200.0),
            Size::new(100.0, 100.0),
            &detections,
            &style,
            &EstimatedMetrics,
        );

        assert_eq!(shapes.len(), 2);
        let OverlayShape::Outline { rect } = shapes[0].clone() else {
            panic!("first shape must be the outline");
        };
        // Display rect is (100, 0, 200, 200)
        assert!(approx(rect.x, 120.0) && approx(rect.y, 80.0));

        match &shapes[1] {
            OverlayShape::Label { chip, text, text_pos } => {
                assert_eq!(text, "42");
                assert!(approx(chip.x, 120.0));
                assert!(approx(chip.y, 55.0));
                assert!(approx(chip.width, 29.2));
                assert!(approx(chip.height, 25.2));
                assert!(approx(text_pos.0, 125.0) && approx(text_pos.1, 67.0));
            }
            other => panic!("unexpected shape {:?}", other),
        }
    }

    #[test]
    fn test_degenerate_canvas_draws_nothing() {
        let detections = [detection(NormalizedRect::new(0.1, 0.2, 0.3, 0.4), Some("7"))];
        let shapes = layout(
            Size::new(0.0, 0.0),
            Size::new(100.0, 100.0),
            &detections,
            &OverlayStyle::default(),
            &EstimatedMetrics,
        );
        assert!(shapes.is_empty());
    }
}
