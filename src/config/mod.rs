//! Application Configuration
//!
//! Asset locations, model parameters and overlay style stored in TOML format.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::overlay::OverlayStyle;
use crate::pipeline::RecognitionPolicy;
use crate::vision::models::ModelType;
use crate::vision::ocr::RecognitionLevel;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Bundled resources
    pub assets: AssetsConfig,
    /// Bus label detector
    pub detector: DetectorConfig,
    /// Region text recognizer
    pub recognizer: RecognizerConfig,
    /// Detection cycle behavior
    pub pipeline: PipelineConfig,
    /// Overlay drawing
    pub overlay: OverlayStyle,
}

/// Where models and the test image live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Asset bundle directory
    pub dir: PathBuf,
    /// Image loaded on startup and by "Load Test Image"
    pub test_image: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("assets"),
            test_image: "6371-883.jpg".to_string(),
        }
    }
}

/// YOLO detector settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Compiled model file name inside the asset bundle
    pub model_file: String,
    /// Square input size, used when the model does not fix it
    pub input_size: u32,
    /// Overlap above which the weaker of two boxes is suppressed
    pub iou_threshold: f32,
    /// Upper bound on boxes per image
    pub max_detections: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_file: ModelType::ObjectDetector.filename().to_string(),
            input_size: 640,
            iou_threshold: 0.45,
            max_detections: 100,
        }
    }
}

/// PaddleOCR recognizer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    pub det_model_file: String,
    pub rec_model_file: String,
    pub dictionary_file: String,
    pub level: RecognitionLevel,
    /// Not supported; a `true` value is ignored with a warning
    pub language_correction: bool,
    /// DB probability threshold for text pixels
    pub text_threshold: f32,
    /// Minimum text line area in detector pixels
    pub min_line_area: usize,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            det_model_file: ModelType::TextDetection.filename().to_string(),
            rec_model_file: ModelType::TextRecognition.filename().to_string(),
            dictionary_file: ModelType::Dictionary.filename().to_string(),
            level: RecognitionLevel::Accurate,
            language_correction: false,
            text_threshold: 0.3,
            min_line_area: 16,
        }
    }
}

/// Detection cycle settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub policy: RecognitionPolicy,
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "buslabel", "BusLabelDetector")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    let config_dir = proj_dirs.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}
