//! Image preprocessing for the ONNX models
//!
//! Handles letterboxing, resizing, normalization, and tensor conversion for the
//! YOLO detector and the PaddleOCR models.

use image::{imageops, Rgb, RgbImage};
use ndarray::{s, Array3, Array4};

/// Gray used to pad letterboxed detector input (YOLO convention)
pub const LETTERBOX_FILL: u8 = 114;

/// Preprocessing configuration for the OCR models
#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    /// Longest side for the text detection model (typically 640 or 960)
    pub det_target_size: u32,
    /// Target height for recognition model (typically 32 or 48)
    pub rec_target_height: u32,
    /// Maximum width for recognition
    pub rec_max_width: u32,
    /// Mean values for normalization [R, G, B]
    pub mean: [f32; 3],
    /// Std values for normalization [R, G, B]
    pub std: [f32; 3],
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            det_target_size: 960,
            rec_target_height: 48,
            rec_max_width: 640,
            // PaddleOCR maps [0, 255] -> [-1, 1]
            mean: [0.5, 0.5, 0.5],
            std: [0.5, 0.5, 0.5],
        }
    }
}

/// How a source image was placed into the square detector input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// Uniform scale applied to the source image
    pub scale: f32,
    /// Horizontal padding (left side) in input pixels
    pub pad_x: f32,
    /// Vertical padding (top side) in input pixels
    pub pad_y: f32,
}

impl Letterbox {
    /// Compute the aspect-fit placement of a `width` x `height` image into a
    /// `target` x `target` input
    pub fn fit(width: u32, height: u32, target: u32) -> Self {
        let scale = (target as f32 / width as f32).min(target as f32 / height as f32);
        let new_w = (width as f32 * scale).round();
        let new_h = (height as f32 * scale).round();
        Self {
            scale,
            pad_x: ((target as f32 - new_w) / 2.0).floor(),
            pad_y: ((target as f32 - new_h) / 2.0).floor(),
        }
    }

    /// Map a point in model input pixels back to source image pixels
    pub fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// Convert an RGB image to an HWC f32 array in 0..1
pub fn rgb_to_f32(image: &RgbImage) -> Array3<f32> {
    let (width, height) = image.dimensions();
    let mut rgb = Array3::<f32>::zeros((height as usize, width as usize, 3));

    for (x, y, pixel) in image.enumerate_pixels() {
        for c in 0..3 {
            rgb[[y as usize, x as usize, c]] = pixel[c] as f32 / 255.0;
        }
    }

    rgb
}

/// Normalize image with mean and std
pub fn normalize(image: &Array3<f32>, mean: &[f32; 3], std: &[f32; 3]) -> Array3<f32> {
    let mut normalized = image.clone();
    for c in 0..3 {
        normalized
            .slice_mut(s![.., .., c])
            .mapv_inplace(|v| (v - mean[c]) / std[c]);
    }
    normalized
}

/// Convert HWC image to NCHW tensor (batch size 1)
pub fn hwc_to_nchw(image: &Array3<f32>) -> Array4<f32> {
    let (h, w, c) = image.dim();
    let mut tensor = Array4::<f32>::zeros((1, c, h, w));

    for y in 0..h {
        for x in 0..w {
            for ch in 0..c {
                tensor[[0, ch, y, x]] = image[[y, x, ch]];
            }
        }
    }

    tensor
}

/// Scale-to-fit the image into a square `target` input without distortion,
/// padding the remainder with [`LETTERBOX_FILL`]. Returns the NCHW tensor in
/// 0..1 and the placement needed to undo it.
pub fn letterbox(image: &RgbImage, target: u32) -> (Array4<f32>, Letterbox) {
    let placement = Letterbox::fit(image.width(), image.height(), target);
    let new_w = ((image.width() as f32 * placement.scale).round() as u32).clamp(1, target);
    let new_h = ((image.height() as f32 * placement.scale).round() as u32).clamp(1, target);

    let resized = imageops::resize(image, new_w, new_h, imageops::FilterType::Triangle);
    let mut canvas = RgbImage::from_pixel(target, target, Rgb([LETTERBOX_FILL; 3]));
    imageops::replace(&mut canvas, &resized, placement.pad_x as i64, placement.pad_y as i64);

    (hwc_to_nchw(&rgb_to_f32(&canvas)), placement)
}

/// Bilinear resize of an HWC array to `new_h` x `new_w`
fn bilinear_resize(image: &Array3<f32>, new_h: usize, new_w: usize, out_h: usize, out_w: usize) -> Array3<f32> {
    let (h, w, c) = image.dim();
    let mut resized = Array3::<f32>::zeros((out_h, out_w, c));
    if h == 0 || w == 0 || new_h == 0 || new_w == 0 {
        return resized;
    }

    let scale_y = new_h as f32 / h as f32;
    let scale_x = new_w as f32 / w as f32;

    for y in 0..new_h.min(out_h) {
        for x in 0..new_w.min(out_w) {
            let src_y = (y as f32 / scale_y).min(h as f32 - 1.0);
            let src_x = (x as f32 / scale_x).min(w as f32 - 1.0);

            let y0 = src_y.floor() as usize;
            let y1 = (y0 + 1).min(h - 1);
            let x0 = src_x.floor() as usize;
            let x1 = (x0 + 1).min(w - 1);

            let fy = src_y - y0 as f32;
            let fx = src_x - x0 as f32;

            for ch in 0..c {
                let v00 = image[[y0, x0, ch]];
                let v01 = image[[y0, x1, ch]];
                let v10 = image[[y1, x0, ch]];
                let v11 = image[[y1, x1, ch]];

                let v0 = v00 * (1.0 - fx) + v01 * fx;
                let v1 = v10 * (1.0 - fx) + v11 * fx;
                resized[[y, x, ch]] = v0 * (1.0 - fy) + v1 * fy;
            }
        }
    }

    resized
}

/// Resize image so its longest side is at most `target_size`, padding both
/// dimensions up to a multiple of 32 (required by the DB text detector).
/// Returns (resized_image, scale_factor).
pub fn resize_for_detection(image: &Array3<f32>, target_size: u32) -> (Array3<f32>, f32) {
    let (h, w, _) = image.dim();
    let scale = (target_size as f32 / h.max(w) as f32).min(1.0).max(f32::MIN_POSITIVE);
    let new_h = ((h as f32 * scale) as usize).max(1);
    let new_w = ((w as f32 * scale) as usize).max(1);

    let padded_h = new_h.div_ceil(32) * 32;
    let padded_w = new_w.div_ceil(32) * 32;

    (bilinear_resize(image, new_h, new_w, padded_h, padded_w), scale)
}

/// Resize image for recognition model (fixed height, variable width)
pub fn resize_for_recognition(image: &Array3<f32>, target_height: u32, max_width: u32) -> Array3<f32> {
    let (h, w, _) = image.dim();
    let scale = target_height as f32 / h.max(1) as f32;
    let new_w = ((w as f32 * scale) as u32).clamp(4, max_width.max(4)) as usize;
    let new_h = target_height as usize;

    bilinear_resize(image, new_h, new_w, new_h, new_w)
}

/// Crop a top-left pixel region `(x, y, width, height)` from an HWC array,
/// clipped to the image bounds
pub fn crop(image: &Array3<f32>, x: usize, y: usize, width: usize, height: usize) -> Array3<f32> {
    let (img_h, img_w, c) = image.dim();
    let x1 = x.min(img_w);
    let y1 = y.min(img_h);
    let x2 = (x + width).min(img_w);
    let y2 = (y + height).min(img_h);

    if x2 <= x1 || y2 <= y1 {
        return Array3::<f32>::zeros((1, 1, c));
    }

    image.slice(s![y1..y2, x1..x2, ..]).to_owned()
}

/// Full preprocessing pipeline for text detection
pub fn preprocess_for_detection(image: &Array3<f32>, config: &PreprocessConfig) -> (Array4<f32>, f32) {
    let (resized, scale) = resize_for_detection(image, config.det_target_size);
    let normalized = normalize(&resized, &config.mean, &config.std);
    (hwc_to_nchw(&normalized), scale)
}

/// Full preprocessing pipeline for recognition
pub fn preprocess_for_recognition(image: &Array3<f32>, config: &PreprocessConfig) -> Array4<f32> {
    let resized = resize_for_recognition(image, config.rec_target_height, config.rec_max_width);
    let normalized = normalize(&resized, &config.mean, &config.std);
    hwc_to_nchw(&normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_to_f32() {
        let mut image = RgbImage::new(2, 1);
        image.put_pixel(0, 0, Rgb([255, 0, 0]));
        image.put_pixel(1, 0, Rgb([0, 255, 0]));

        let rgb = rgb_to_f32(&image);

        assert!((rgb[[0, 0, 0]] - 1.0).abs() < 0.01);
        assert!(rgb[[0, 0, 1]].abs() < 0.01);
        assert!(rgb[[0, 1, 0]].abs() < 0.01);
        assert!((rgb[[0, 1, 1]] - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_hwc_to_nchw() {
        let hwc = Array3::<f32>::from_shape_fn((10, 20, 3), |(h, w, c)| (h * 100 + w * 10 + c) as f32);

        let nchw = hwc_to_nchw(&hwc);

        assert_eq!(nchw.dim(), (1, 3, 10, 20));
        assert_eq!(nchw[[0, 1, 5, 10]], hwc[[5, 10, 1]]);
    }

    #[test]
    fn test_normalize() {
        let image = Array3::<f32>::from_elem((2, 2, 3), 0.5);
        let mean = [0.485, 0.456, 0.406];
        let std = [0.229, 0.224, 0.225];

        let normalized = normalize(&image, &mean, &std);

        assert!((normalized[[0, 0, 0]] - (0.5 - 0.485) / 0.229).abs() < 0.01);
        assert!((normalized[[1, 1, 2]] - (0.5 - 0.406) / 0.225).abs() < 0.01);
    }

    #[test]
    fn test_letterbox_preserves_aspect() {
        let image = RgbImage::from_pixel(200, 100, Rgb([255, 255, 255]));
        let (tensor, placement) = letterbox(&image, 640);

        assert_eq!(tensor.dim(), (1, 3, 640, 640));
        assert!((placement.scale - 3.2).abs() < 1e-4);
        assert_eq!(placement.pad_x, 0.0);
        assert_eq!(placement.pad_y, 160.0);

        // Padding rows are gray, image rows are white
        let gray = LETTERBOX_FILL as f32 / 255.0;
        assert!((tensor[[0, 0, 10, 320]] - gray).abs() < 1e-3);
        assert!((tensor[[0, 0, 320, 320]] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_letterbox_round_trip_point() {
        let placement = Letterbox::fit(1000, 500, 640);
        let (x, y) = placement.to_source(320.0, 320.0);
        assert!((x - 500.0).abs() < 1.0);
        assert!((y - 250.0).abs() < 1.0);
    }

    #[test]
    fn test_resize_for_detection_pads_to_32() {
        let image = Array3::<f32>::from_elem((100, 50, 3), 0.5);
        let (resized, scale) = resize_for_detection(&image, 960);
        assert_eq!(scale, 1.0);
        assert_eq!(resized.dim(), (128, 64, 3));
    }

    #[test]
    fn test_resize_for_recognition_fixed_height() {
        let image = Array3::<f32>::from_elem((24, 120, 3), 0.5);
        let resized = resize_for_recognition(&image, 48, 640);
        assert_eq!(resized.dim(), (48, 240, 3));
    }

    #[test]
    fn test_crop_clips_to_bounds() {
        let image = Array3::<f32>::from_shape_fn((10, 10, 3), |(y, x, _)| (y * 10 + x) as f32);
        let cropped = crop(&image, 8, 8, 5, 5);
        assert_eq!(cropped.dim(), (2, 2, 3));
        assert_eq!(cropped[[0, 0, 0]], 88.0);

        let empty = crop(&image, 20, 20, 5, 5);
        assert_eq!(empty.dim(), (1, 1, 3));
    }
}
