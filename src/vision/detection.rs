//! Bus label detection
//!
//! Runs a single-class YOLO export (v8/v11 head) through ONNX Runtime. The
//! image is letterboxed into the square model input, the raw anchors are
//! thresholded and suppressed here, and the surviving boxes are mapped back
//! to normalized detector space (bottom-left origin).

use async_trait::async_trait;
use ndarray::{ArrayD, Axis, Ix3};
use std::sync::Arc;
use tracing::{debug, info};

use super::geometry::{flip_vertical, NormalizedRect};
use super::models::{ModelType, OnnxSession};
use super::preprocess::{letterbox, Letterbox};
use super::{passes_threshold, DetectedObject, DetectionError, ObjectDetector, SourceImage};
use crate::assets::AssetBundle;
use crate::config::DetectorConfig;

/// Number of box coordinates (cx, cy, w, h) ahead of the class scores
const BOX_CHANNELS: usize = 4;

/// Post-processing parameters
#[derive(Debug, Clone, Copy)]
struct Params {
    input_size: u32,
    iou_threshold: f32,
    max_detections: usize,
}

/// YOLO object detector backed by an ONNX session
pub struct YoloDetector {
    session: Arc<OnnxSession>,
    params: Params,
}

impl YoloDetector {
    /// Locate the model in the asset bundle and load it
    pub fn load(bundle: &AssetBundle, config: &DetectorConfig) -> Result<Self, DetectionError> {
        let path = bundle.locate_model(&config.model_file)?;
        let session = OnnxSession::new(&path, ModelType::ObjectDetector)?;
        Ok(Self::from_session(session, config))
    }

    /// Wrap an already loaded session. A fixed square model input takes
    /// precedence over the configured size.
    pub fn from_session(session: OnnxSession, config: &DetectorConfig) -> Self {
        let input_size = match session.fixed_input_hw() {
            Some((h, w)) if h == w => h,
            _ => config.input_size,
        };
        info!("YOLO detector ready (input {}x{})", input_size, input_size);

        Self {
            session: Arc::new(session),
            params: Params {
                input_size,
                iou_threshold: config.iou_threshold,
                max_detections: config.max_detections,
            },
        }
    }
}

#[async_trait]
impl ObjectDetector for YoloDetector {
    async fn detect(&self, image: &SourceImage) -> Result<Vec<DetectedObject>, DetectionError> {
        let session = Arc::clone(&self.session);
        let image = image.clone();
        let params = self.params;

        tokio::task::spawn_blocking(move || run_inference(&session, &image, params))
            .await
            .map_err(|e| DetectionError::TaskFailed(e.to_string()))?
    }
}

fn run_inference(
    session: &OnnxSession,
    image: &SourceImage,
    params: Params,
) -> Result<Vec<DetectedObject>, DetectionError> {
    let (tensor, placement) = letterbox(image.rgb(), params.input_size);
    let output = session.run(tensor)?;

    let candidates = decode_output(&output, &placement, image.width(), image.height())?;
    let kept = non_max_suppression(candidates, params.iou_threshold, params.max_detections);
    debug!("{} detections after NMS", kept.len());

    Ok(kept)
}

/// Decode a raw YOLO head into thresholded detections.
///
/// Accepts `[1, 4 + classes, anchors]` and the transposed
/// `[1, anchors, 4 + classes]`; any other result is rejected.
pub fn decode_output(
    output: &ArrayD<f32>,
    placement: &Letterbox,
    image_width: u32,
    image_height: u32,
) -> Result<Vec<DetectedObject>, DetectionError> {
    let unexpected = || DetectionError::UnexpectedOutputShape {
        observed: format!("tensor f32 {:?}", output.shape()),
    };

    let view = output.view().into_dimensionality::<Ix3>().map_err(|_| unexpected())?;
    let (batch, d1, d2) = view.dim();
    if batch != 1 || d1.min(d2) <= BOX_CHANNELS {
        return Err(unexpected());
    }

    // The channel axis is the short one: 84 x 8400 for COCO, 5 x 8400 for one class
    let rows = view.index_axis(Axis(0), 0);
    let rows = if d1 < d2 { rows.reversed_axes() } else { rows };

    let (w, h) = (image_width as f32, image_height as f32);
    let mut detections = Vec::new();

    for row in rows.outer_iter() {
        let score = row
            .iter()
            .skip(BOX_CHANNELS)
            .copied()
            .fold(f32::NEG_INFINITY, f32::max);
        if !passes_threshold(score) {
            continue;
        }

        let (cx, cy, bw, bh) = (row[0], row[1], row[2], row[3]);
        let (x1, y1) = placement.to_source(cx - bw / 2.0, cy - bh / 2.0);
        let (x2, y2) = placement.to_source(cx + bw / 2.0, cy + bh / 2.0);

        // Top-left normalized, then into detector space
        let top_left = NormalizedRect::new(x1 / w, y1 / h, (x2 - x1) / w, (y2 - y1) / h);
        let bounding_box = flip_vertical(top_left).clamped();
        if bounding_box.area() <= 0.0 {
            continue;
        }
        debug_assert!(bounding_box.is_normalized());

        detections.push(DetectedObject {
            bounding_box,
            confidence: score.min(1.0),
        });
    }

    Ok(detections)
}

/// Greedy non-maximum suppression, highest confidence first
pub fn non_max_suppression(
    mut detections: Vec<DetectedObject>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<DetectedObject> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<DetectedObject> = Vec::new();
    for candidate in detections {
        if kept.len() >= max_detections {
            break;
        }
        if kept
            .iter()
            .all(|k| k.bounding_box.iou(&candidate.bounding_box) <= iou_threshold)
        {
            kept.push(candidate);
        }
    }

    kept
}
