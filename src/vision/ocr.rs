//! Region text recognition
//!
//! Uses PaddleOCR models via ONNX Runtime. Recognition is restricted to one
//! region of interest at a time: the region is cropped, text lines are found
//! with the DB detection model, and each line is decoded with the CTC
//! recognition model. No language model is ever applied, so route numbers and
//! codes come out exactly as read.

use async_trait::async_trait;
use image::imageops;
use ndarray::{Array3, ArrayD, ArrayView2, Axis, Ix3, Ix4};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::geometry::{to_pixel_region, NormalizedRect};
use super::models::{ModelType, OnnxSession};
use super::preprocess::{crop, preprocess_for_detection, preprocess_for_recognition, rgb_to_f32, PreprocessConfig};
use super::{join_top_candidates, DetectionError, SourceImage, TextRecognizer};
use crate::assets::AssetBundle;
use crate::config::RecognizerConfig;

/// Speed/accuracy trade-off of the recognizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognitionLevel {
    Fast,
    #[default]
    Accurate,
}

impl RecognitionLevel {
    /// Longest side fed to the text line detector
    pub fn detection_size(&self) -> u32 {
        match self {
            RecognitionLevel::Fast => 640,
            RecognitionLevel::Accurate => 960,
        }
    }
}

/// Effective recognition options
#[derive(Debug, Clone)]
pub struct RecognitionOptions {
    pub level: RecognitionLevel,
    /// Always `false`: no dictionary-based correction of the decoded text
    pub language_correction: bool,
    /// Probability above which a DB map pixel counts as text
    pub text_threshold: f32,
    /// Components smaller than this (in detector pixels) are dropped
    pub min_line_area: usize,
}

impl RecognitionOptions {
    pub fn from_config(config: &RecognizerConfig) -> Self {
        if config.language_correction {
            warn!("recognizer.language_correction is not supported and is ignored");
        }
        Self {
            level: config.level,
            language_correction: false,
            text_threshold: config.text_threshold,
            min_line_area: config.min_line_area,
        }
    }
}

/// Axis-aligned text line in detector input pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineBox {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
    pub area: usize,
}

/// PaddleOCR recognizer (DB text detection + CTC recognition)
pub struct PaddleRecognizer {
    det_session: Arc<OnnxSession>,
    rec_session: Arc<OnnxSession>,
    dictionary: Arc<Vec<String>>,
    options: Arc<RecognitionOptions>,
}

impl std::fmt::Debug for PaddleRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaddleRecognizer")
            .field("dictionary_size", &self.dictionary.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl PaddleRecognizer {
    /// Locate the detection, recognition and dictionary artifacts and load them
    pub fn load(bundle: &AssetBundle, config: &RecognizerConfig) -> Result<Self, DetectionError> {
        let det_path = bundle.locate_model(&config.det_model_file)?;
        let rec_path = bundle.locate_model(&config.rec_model_file)?;
        let dict_path = bundle.locate_file(&config.dictionary_file)?;

        let det_session = OnnxSession::new(&det_path, ModelType::TextDetection)?;
        let rec_session = OnnxSession::new(&rec_path, ModelType::TextRecognition)?;
        let dictionary = load_dictionary(&dict_path)?;
        info!("Loaded character dictionary with {} entries", dictionary.len());

        let options = RecognitionOptions::from_config(config);
        info!(
            "Recognizer level {:?}, language correction {}",
            options.level, options.language_correction
        );

        Ok(Self {
            det_session: Arc::new(det_session),
            rec_session: Arc::new(rec_session),
            dictionary: Arc::new(dictionary),
            options: Arc::new(options),
        })
    }
}

#[async_trait]
impl TextRecognizer for PaddleRecognizer {
    async fn recognize(&self, image: &SourceImage, region: NormalizedRect) -> Result<Option<String>, DetectionError> {
        let det = Arc::clone(&self.det_session);
        let rec = Arc::clone(&self.rec_session);
        let dictionary = Arc::clone(&self.dictionary);
        let options = Arc::clone(&self.options);
        let image = image.clone();

        tokio::task::spawn_blocking(move || recognize_region(&det, &rec, &dictionary, &options, &image, region))
            .await
            .map_err(|e| DetectionError::TaskFailed(e.to_string()))?
    }
}

fn recognize_region(
    det: &OnnxSession,
    rec: &OnnxSession,
    dictionary: &[String],
    options: &RecognitionOptions,
    image: &SourceImage,
    region: NormalizedRect,
) -> Result<Option<String>, DetectionError> {
    let (x, y, w, h) = to_pixel_region(region, image.width(), image.height());
    if w == 0 || h == 0 {
        debug!("Empty region of interest {:?}", region);
        return Ok(None);
    }

    let roi = imageops::crop_imm(image.rgb(), x, y, w, h).to_image();
    let roi = rgb_to_f32(&roi);

    let config = PreprocessConfig {
        det_target_size: options.level.detection_size(),
        ..PreprocessConfig::default()
    };

    let (det_input, scale) = preprocess_for_detection(&roi, &config);
    let det_output = det.run(det_input)?;
    let prob_map = probability_map(&det_output)?;

    let crops = line_crops(&roi, prob_map.view(), options, scale);
    debug!("{} text lines in region {:?}", crops.len(), region);
    if crops.is_empty() {
        return Ok(None);
    }

    let mut texts = Vec::with_capacity(crops.len());
    for line in &crops {
        let rec_input = preprocess_for_recognition(line, &config);
        let rec_output = rec.run(rec_input)?;
        texts.push(ctc_greedy_decode(&rec_output, dictionary)?);
    }

    Ok(join_top_candidates(texts))
}

/// Extract the `[H, W]` probability map from a DB output `[1, 1, H, W]`
fn probability_map(output: &ArrayD<f32>) -> Result<ndarray::Array2<f32>, DetectionError> {
    let view = output.view().into_dimensionality::<Ix4>().map_err(|_| {
        DetectionError::runtime(
            ModelType::TextDetection.display_name(),
            format!("unexpected output shape {:?}", output.shape()),
        )
    })?;
    Ok(view.index_axis(Axis(0), 0).index_axis(Axis(0), 0).to_owned())
}

/// Crops of every text line the DB map shows; empty when the region holds
/// no text
fn line_crops(roi: &Array3<f32>, prob: ArrayView2<f32>, options: &RecognitionOptions, scale: f32) -> Vec<Array3<f32>> {
    find_text_lines(prob, options.text_threshold, options.min_line_area)
        .iter()
        .map(|line| crop_line(roi, line, scale))
        .collect()
}

/// Map a detector-space line back onto the region crop, with some padding
/// since DB shrinks text kernels
fn crop_line(roi: &Array3<f32>, line: &LineBox, scale: f32) -> Array3<f32> {
    let pad = line.height as f32 * 0.5;
    let x0 = ((line.x as f32 - pad).max(0.0) / scale) as usize;
    let y0 = ((line.y as f32 - pad).max(0.0) / scale) as usize;
    let x1 = ((line.x + line.width) as f32 + pad) / scale;
    let y1 = ((line.y + line.height) as f32 + pad) / scale;

    crop(
        roi,
        x0,
        y0,
        (x1.ceil() as usize).saturating_sub(x0),
        (y1.ceil() as usize).saturating_sub(y0),
    )
}

/// Connected components of the thresholded probability map, sorted
/// top-to-bottom then left-to-right
pub fn find_text_lines(prob: ArrayView2<f32>, threshold: f32, min_area: usize) -> Vec<LineBox> {
    let (height, width) = prob.dim();
    let mut visited = vec![false; height * width];
    let mut lines = Vec::new();

    for y in 0..height {
        for x in 0..width {
            if visited[y * width + x] || prob[[y, x]] < threshold {
                continue;
            }

            let line = flood_fill(&prob, &mut visited, x, y, threshold);
            if line.area >= min_area {
                lines.push(line);
            }
        }
    }

    lines.sort_by_key(|line| (line.y, line.x));
    lines
}

fn flood_fill(prob: &ArrayView2<f32>, visited: &mut [bool], start_x: usize, start_y: usize, threshold: f32) -> LineBox {
    let (height, width) = prob.dim();
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (start_x, start_y, start_x, start_y);
    let mut area = 0;
    let mut stack = vec![(start_x, start_y)];
    visited[start_y * width + start_x] = true;

    while let Some((x, y)) = stack.pop() {
        area += 1;
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);

        let mut visit = |nx: usize, ny: usize| {
            let idx = ny * width + nx;
            if !visited[idx] && prob[[ny, nx]] >= threshold {
                visited[idx] = true;
                stack.push((nx, ny));
            }
        };

        if x > 0 {
            visit(x - 1, y);
        }
        if x + 1 < width {
            visit(x + 1, y);
        }
        if y > 0 {
            visit(x, y - 1);
        }
        if y + 1 < height {
            visit(x, y + 1);
        }
    }

    LineBox {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
        area,
    }
}

/// Best-path CTC decoding of a `[1, T, C]` recognition output.
///
/// Index 0 is the blank token; repeats are collapsed unless separated by a
/// blank.
pub fn ctc_greedy_decode(output: &ArrayD<f32>, dictionary: &[String]) -> Result<String, DetectionError> {
    let view = output.view().into_dimensionality::<Ix3>().map_err(|_| {
        DetectionError::runtime(
            ModelType::TextRecognition.display_name(),
            format!("unexpected output shape {:?}", output.shape()),
        )
    })?;

    let mut text = String::new();
    let mut prev_index: Option<usize> = None;

    for step in view.index_axis(Axis(0), 0).outer_iter() {
        let (max_index, _) = step
            .iter()
            .enumerate()
            .fold((0usize, f32::NEG_INFINITY), |best, (i, &p)| if p > best.1 { (i, p) } else { best });

        if max_index != 0 && Some(max_index) != prev_index {
            if let Some(token) = dictionary.get(max_index) {
                text.push_str(token);
            }
        }

        prev_index = if max_index == 0 { None } else { Some(max_index) };
    }

    Ok(text.trim().to_string())
}

/// Load the character dictionary: one token per line, index 0 reserved for
/// the CTC blank, and a trailing space token
pub fn load_dictionary(path: &Path) -> Result<Vec<String>, DetectionError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        DetectionError::runtime(
            ModelType::Dictionary.display_name(),
            format!("failed to read {}: {}", path.display(), e),
        )
    })?;

    let mut dictionary = vec![String::new()];
    dictionary.extend(
        content
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.is_empty())
            .map(str::to_string),
    );
    dictionary.push(" ".to_string());

    Ok(dictionary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, IxDyn};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn dictionary() -> Vec<String> {
        ["", "4", "2", "A", " "].iter().map(|s| s.to_string()).collect()
    }

    /// One-hot `[1, T, C]` output from a sequence of class indices
    fn one_hot(indices: &[usize], classes: usize) -> ArrayD<f32> {
        let mut out = ArrayD::<f32>::zeros(IxDyn(&[1, indices.len(), classes]));
        for (t, &c) in indices.iter().enumerate() {
            out[IxDyn(&[0, t, c])] = 1.0;
        }
        out
    }

    #[test]
    fn test_ctc_collapses_repeats_and_blanks() {
        let output = one_hot(&[0, 1, 1, 0, 2, 2, 0, 2, 3], 5);
        assert_eq!(ctc_greedy_decode(&output, &dictionary()).unwrap(), "422A");
    }

    #[test]
    fn test_ctc_all_blank_is_empty() {
        let output = one_hot(&[0, 0, 0], 5);
        assert_eq!(ctc_greedy_decode(&output, &dictionary()).unwrap(), "");
    }

    #[test]
    fn test_ctc_rejects_bad_shape() {
        let output = ArrayD::<f32>::zeros(IxDyn(&[10, 5]));
        assert!(matches!(
            ctc_greedy_decode(&output, &dictionary()),
            Err(DetectionError::Runtime { .. })
        ));
    }

    #[test]
    fn test_find_text_lines_sorted_and_filtered() {
        let mut prob = Array2::<f32>::zeros((20, 30));
        // Lower line
        prob.slice_mut(ndarray::s![12..16, 2..20]).fill(0.9);
        // Upper line, further right
        prob.slice_mut(ndarray::s![2..6, 10..28]).fill(0.8);
        // Speck below min area
        prob[[18, 28]] = 0.95;

        let lines = find_text_lines(prob.view(), 0.3, 4);
        assert_eq!(lines.len(), 2);
        assert_eq!((lines[0].x, lines[0].y, lines[0].width, lines[0].height), (10, 2, 18, 4));
        assert_eq!((lines[1].x, lines[1].y), (2, 12));
        assert_eq!(lines[1].area, 4 * 18);
    }

    #[test]
    fn test_region_without_text_lines_has_no_crops() {
        let options = RecognitionOptions::from_config(&RecognizerConfig::default());
        let roi = Array3::<f32>::zeros((20, 30, 3));

        let blank = Array2::<f32>::from_elem((20, 30), 0.1);
        assert!(line_crops(&roi, blank.view(), &options, 1.0).is_empty());

        let mut prob = blank;
        prob.slice_mut(ndarray::s![8..12, 4..24]).fill(0.9);
        let crops = line_crops(&roi, prob.view(), &options, 1.0);
        assert_eq!(crops.len(), 1);
        // Padded by half the line height on each side
        assert_eq!(crops[0].dim(), (8, 24, 3));
    }

    #[test]
    fn test_load_dictionary_reserves_blank() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "0\n1\nB").unwrap();

        let dict = load_dictionary(file.path()).unwrap();
        assert_eq!(dict, vec!["", "0", "1", "B", " "]);
    }

    #[test]
    fn test_missing_dictionary_is_runtime_error() {
        let err = load_dictionary(Path::new("/nonexistent/dict.txt")).unwrap_err();
        assert!(matches!(err, DetectionError::Runtime { .. }));
    }

    #[test]
    fn test_language_correction_is_never_enabled() {
        let config = RecognizerConfig {
            language_correction: true,
            ..RecognizerConfig::default()
        };
        let options = RecognitionOptions::from_config(&config);
        assert!(!options.language_correction);
        assert_eq!(options.level, RecognitionLevel::Accurate);
        assert_eq!(options.level.detection_size(), 960);
        assert!(RecognitionLevel::Fast.detection_size() < options.level.detection_size());
    }
}
