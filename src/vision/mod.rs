//! Vision Layer
//!
//! Object detection and per-region text recognition on a single still image.
//! Both stages sit behind capability traits so the pipeline and presenter never
//! see the inference engine:
//! - [`ObjectDetector`] - YOLO via ONNX Runtime ([`detection::YoloDetector`])
//! - [`TextRecognizer`] - PaddleOCR via ONNX Runtime ([`ocr::PaddleRecognizer`])

pub mod detection;
pub mod error;
pub mod geometry;
pub mod models;
pub mod ocr;
pub mod preprocess;

use async_trait::async_trait;
use image::{DynamicImage, RgbImage};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

pub use error::{describe, DetectionError, ModelDiagnosis};
pub use geometry::{NormalizedRect, Rect, Size};

/// Minimum detector score required to keep a detection (exclusive)
pub const CONFIDENCE_THRESHOLD: f32 = 0.5;

/// Strict confidence filter: exactly 0.5 is rejected
pub fn passes_threshold(confidence: f32) -> bool {
    confidence > CONFIDENCE_THRESHOLD
}

/// Decoded input image, shared read-only between concurrent stages
#[derive(Debug, Clone)]
pub struct SourceImage {
    rgb: Arc<RgbImage>,
}

impl SourceImage {
    /// Wrap a decoded image, rejecting empty buffers
    pub fn from_dynamic(image: DynamicImage) -> Result<Self, DetectionError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(DetectionError::invalid_image("image has zero width or height"));
        }
        Ok(Self {
            rgb: Arc::new(image.to_rgb8()),
        })
    }

    /// Decode an image file
    pub fn open(path: &Path) -> Result<Self, DetectionError> {
        let image = image::open(path)
            .map_err(|e| DetectionError::invalid_image(format!("{}: {}", path.display(), e)))?;
        Self::from_dynamic(image)
    }

    pub fn width(&self) -> u32 {
        self.rgb.width()
    }

    pub fn height(&self) -> u32 {
        self.rgb.height()
    }

    /// Pixel size of the image
    pub fn size(&self) -> Size {
        Size::new(self.width() as f32, self.height() as f32)
    }

    /// RGB pixel buffer
    pub fn rgb(&self) -> &RgbImage {
        &self.rgb
    }

    /// Whether both handles share the same pixel buffer
    pub fn same_as(&self, other: &SourceImage) -> bool {
        Arc::ptr_eq(&self.rgb, &other.rgb)
    }
}

/// Raw detector output that passed the confidence threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedObject {
    /// Normalized box, bottom-left origin
    pub bounding_box: NormalizedRect,
    /// Detector score in (0.5, 1]
    pub confidence: f32,
}

/// A detected bus label with its recognized text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub id: Uuid,
    /// Normalized box, bottom-left origin
    pub bounding_box: NormalizedRect,
    pub confidence: f32,
    /// `None` when no text was found (never an empty string)
    pub recognized_text: Option<String>,
}

impl Detection {
    pub fn new(object: DetectedObject, recognized_text: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            bounding_box: object.bounding_box,
            confidence: object.confidence,
            recognized_text: recognized_text.filter(|text| !text.is_empty()),
        }
    }
}

/// Finds objects in an image
#[async_trait]
pub trait ObjectDetector: Send + Sync {
    /// Detect objects; every returned box has confidence > 0.5 and lies in [0, 1]
    async fn detect(&self, image: &SourceImage) -> Result<Vec<DetectedObject>, DetectionError>;
}

/// Reads text inside one region of an image
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Recognize the text inside `region` (normalized, bottom-left origin).
    /// Returns `None` when nothing was read.
    async fn recognize(&self, image: &SourceImage, region: NormalizedRect) -> Result<Option<String>, DetectionError>;
}

/// Space-join the top candidate of every text line; `None` when the result is empty
pub fn join_top_candidates<I, S>(lines: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = lines
        .into_iter()
        .map(|line| line.as_ref().trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}
