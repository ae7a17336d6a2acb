//! Coordinate spaces shared by the detector, recognizer and presenter
//!
//! Two spaces are in play:
//! - detector space: normalized (0..1) on both axes, origin at the bottom-left
//!   of the image ([`NormalizedRect`])
//! - display space: pixels, origin at the top-left of the canvas ([`Rect`])
//!
//! The image is shown aspect-fit inside the canvas, so the mapping goes through
//! the letterboxed display rectangle computed by [`display_rect`].

use serde::{Deserialize, Serialize};

/// Width/height pair in pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Aspect ratio (width / height), `None` for degenerate sizes
    pub fn aspect(&self) -> Option<f32> {
        if self.width > 0.0 && self.height > 0.0 {
            Some(self.width / self.height)
        } else {
            None
        }
    }
}

/// Pixel rectangle with top-left origin
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn min_x(&self) -> f32 {
        self.x
    }

    pub fn min_y(&self) -> f32 {
        self.y
    }

    pub fn max_x(&self) -> f32 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Whether `other` lies entirely inside this rect, with a small tolerance
    /// for float rounding at the edges
    pub fn contains_rect(&self, other: &Rect) -> bool {
        const EPS: f32 = 1e-3;
        other.min_x() >= self.min_x() - EPS
            && other.min_y() >= self.min_y() - EPS
            && other.max_x() <= self.max_x() + EPS
            && other.max_y() <= self.max_y() + EPS
    }
}

/// Normalized rectangle (fractions of image width/height), bottom-left origin
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl NormalizedRect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn min_x(&self) -> f32 {
        self.x
    }

    pub fn min_y(&self) -> f32 {
        self.y
    }

    pub fn max_x(&self) -> f32 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f32 {
        self.y + self.height
    }

    /// All components and both extents lie in [0, 1]
    pub fn is_normalized(&self) -> bool {
        const EPS: f32 = 1e-6;
        let in_unit = |v: f32| (-EPS..=1.0 + EPS).contains(&v);
        in_unit(self.x)
            && in_unit(self.y)
            && in_unit(self.width)
            && in_unit(self.height)
            && self.max_x() <= 1.0 + EPS
            && self.max_y() <= 1.0 + EPS
    }

    /// Clamp the rect to the unit square, keeping it non-negative
    pub fn clamped(&self) -> Self {
        let min_x = self.min_x().clamp(0.0, 1.0);
        let min_y = self.min_y().clamp(0.0, 1.0);
        let max_x = self.max_x().clamp(0.0, 1.0);
        let max_y = self.max_y().clamp(0.0, 1.0);
        Self {
            x: min_x,
            y: min_y,
            width: (max_x - min_x).max(0.0),
            height: (max_y - min_y).max(0.0),
        }
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection over union with another rect in the same space
    pub fn iou(&self, other: &NormalizedRect) -> f32 {
        let ix = (self.max_x().min(other.max_x()) - self.min_x().max(other.min_x())).max(0.0);
        let iy = (self.max_y().min(other.max_y()) - self.min_y().max(other.min_y())).max(0.0);
        let intersection = ix * iy;
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

/// Flip the vertical origin of a normalized rect (bottom-left <-> top-left).
///
/// Applying it twice returns the original rect.
pub fn flip_vertical(rect: NormalizedRect) -> NormalizedRect {
    NormalizedRect {
        x: rect.x,
        y: 1.0 - rect.max_y(),
        width: rect.width,
        height: rect.height,
    }
}

/// Compute where an image of `image` size is shown aspect-fit inside `canvas`.
///
/// The result preserves the image aspect ratio, is clamped to the canvas on
/// the constraining axis and centered on the other one.
pub fn display_rect(canvas: Size, image: Size) -> Rect {
    let (Some(image_aspect), Some(canvas_aspect)) = (image.aspect(), canvas.aspect()) else {
        return Rect::default();
    };

    let (display_width, display_height) = if image_aspect > canvas_aspect {
        // Wider than the canvas: fit to width
        (canvas.width, canvas.width / image_aspect)
    } else {
        // Taller (or equal): fit to height
        (canvas.height * image_aspect, canvas.height)
    };

    Rect {
        x: (canvas.width - display_width) / 2.0,
        y: (canvas.height - display_height) / 2.0,
        width: display_width,
        height: display_height,
    }
}

/// Map a normalized bottom-left box into the display rect (top-left pixels)
pub fn to_display(rect: NormalizedRect, display: Rect) -> Rect {
    Rect {
        x: rect.min_x() * display.width + display.min_x(),
        y: (1.0 - rect.max_y()) * display.height + display.min_y(),
        width: rect.width * display.width,
        height: rect.height * display.height,
    }
}

/// Convert a normalized bottom-left box to a top-left pixel region
/// `(x, y, width, height)` clipped to the image bounds
pub fn to_pixel_region(rect: NormalizedRect, image_width: u32, image_height: u32) -> (u32, u32, u32, u32) {
    let rect = flip_vertical(rect.clamped());
    let w = image_width as f32;
    let h = image_height as f32;

    let x0 = (rect.min_x() * w).floor().clamp(0.0, w) as u32;
    let y0 = (rect.min_y() * h).floor().clamp(0.0, h) as u32;
    let x1 = (rect.max_x() * w).ceil().clamp(0.0, w) as u32;
    let y1 = (rect.max_y() * h).ceil().clamp(0.0, h) as u32;

    (x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
}
