//! Detection error taxonomy
//!
//! Every failure of a detection cycle ends up as a [`DetectionError`]. The
//! orchestrator turns it into a single message with [`describe`], which is
//! what the UI shows and what gets logged.

use thiserror::Error;

/// Extension of the compiled (runnable) model artifact
pub const COMPILED_MODEL_EXTENSION: &str = "onnx";
/// Extension of the uncompiled source artifact (training weights)
pub const SOURCE_MODEL_EXTENSION: &str = "pt";

/// Why a model artifact could not be located.
///
/// Each variant maps to a different fix on the operator side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelDiagnosis {
    /// No `.onnx` or `.pt` artifacts anywhere in the asset bundle
    NothingFound,
    /// Source weights are present but were never exported to ONNX
    UncompiledOnly { sources: Vec<String> },
    /// ONNX artifacts exist, just not under the expected name
    MisnamedCompiled {
        compiled: Vec<String>,
        sources: Vec<String>,
    },
}

impl ModelDiagnosis {
    /// Build the diagnosis from the artifact names found in the bundle
    pub fn from_discovery(compiled: Vec<String>, sources: Vec<String>) -> Self {
        if compiled.is_empty() && sources.is_empty() {
            ModelDiagnosis::NothingFound
        } else if compiled.is_empty() {
            ModelDiagnosis::UncompiledOnly { sources }
        } else {
            ModelDiagnosis::MisnamedCompiled { compiled, sources }
        }
    }

    /// Operator-facing explanation for an expected `artifact`
    pub fn details(&self, artifact: &str) -> String {
        match self {
            ModelDiagnosis::NothingFound => format!(
                "No .{} or .{} artifacts found in the asset bundle. Export the model to {} and place it in the assets directory.",
                COMPILED_MODEL_EXTENSION, SOURCE_MODEL_EXTENSION, artifact
            ),
            ModelDiagnosis::UncompiledOnly { sources } => format!(
                "Found {} but no compiled .{} model exists. The weights were never exported; run the ONNX export for {} and rebuild the asset bundle.",
                sources.join(", "),
                COMPILED_MODEL_EXTENSION,
                artifact
            ),
            ModelDiagnosis::MisnamedCompiled { compiled, sources } => {
                let mut parts = vec![format!(".{} found: {}.", COMPILED_MODEL_EXTENSION, compiled.join(", "))];
                if !sources.is_empty() {
                    parts.push(format!(".{} found: {}.", SOURCE_MODEL_EXTENSION, sources.join(", ")));
                }
                parts.push(format!("Ensure the compiled model name is exactly {}.", artifact));
                parts.join(" ")
            }
        }
    }
}

fn model_details(artifact: &str, diagnosis: &ModelDiagnosis) -> String {
    diagnosis.details(artifact)
}

/// Errors produced by a detection cycle
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Unable to process the image: {reason}")]
    InvalidImage { reason: String },

    #[error("Model '{artifact}' not found in asset bundle. {}", model_details(.artifact, .diagnosis))]
    ModelUnavailable {
        artifact: String,
        diagnosis: ModelDiagnosis,
    },

    #[error("Support file '{file}' missing from {dir}")]
    SupportFileMissing { file: String, dir: String },

    #[error("Invalid detection results from model. Runtime returned: {observed}. This usually means the model is not an object detection model.")]
    UnexpectedOutputShape { observed: String },

    #[error("{stage} failed: {message}")]
    Runtime { stage: &'static str, message: String },

    #[error("Recognition task failed: {0}")]
    TaskFailed(String),
}

impl DetectionError {
    pub fn invalid_image(reason: impl Into<String>) -> Self {
        DetectionError::InvalidImage { reason: reason.into() }
    }

    pub fn runtime(stage: &'static str, err: impl std::fmt::Display) -> Self {
        DetectionError::Runtime {
            stage,
            message: err.to_string(),
        }
    }

    /// Subsystem the error originates from
    pub fn domain(&self) -> &'static str {
        match self {
            DetectionError::InvalidImage { .. } => "image",
            DetectionError::ModelUnavailable { .. } | DetectionError::SupportFileMissing { .. } => "assets",
            DetectionError::UnexpectedOutputShape { .. } | DetectionError::Runtime { .. } => "onnxruntime",
            DetectionError::TaskFailed(_) => "pipeline",
        }
    }

    /// Stable numeric code, one per variant
    pub fn code(&self) -> u32 {
        match self {
            DetectionError::InvalidImage { .. } => 1,
            DetectionError::ModelUnavailable { .. } => 2,
            DetectionError::UnexpectedOutputShape { .. } => 3,
            DetectionError::Runtime { .. } => 4,
            DetectionError::TaskFailed(_) => 5,
            DetectionError::SupportFileMissing { .. } => 6,
        }
    }

    /// Underlying failure reason, when it adds to the description
    pub fn reason(&self) -> Option<String> {
        match self {
            DetectionError::Runtime { message, .. } if !message.is_empty() => Some(message.clone()),
            DetectionError::TaskFailed(msg) if !msg.is_empty() => Some(msg.clone()),
            _ => None,
        }
    }

    /// What the operator can do about it
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            DetectionError::InvalidImage { .. } => Some("Use a PNG, JPEG or WebP image with non-zero dimensions."),
            DetectionError::ModelUnavailable { .. } => Some("Check `assets.dir` and the model file names in config.toml."),
            DetectionError::SupportFileMissing { .. } => {
                Some("Copy the file into the assets directory or fix its name in config.toml.")
            }
            DetectionError::UnexpectedOutputShape { .. } => {
                Some("Load a YOLO detection export with output layout [1, 4 + classes, anchors].")
            }
            DetectionError::Runtime { .. } | DetectionError::TaskFailed(_) => None,
        }
    }
}

/// Turn an error into the single human-readable message shown to the user
pub fn describe(error: &DetectionError) -> String {
    let mut parts: Vec<String> = Vec::new();

    let description = error.to_string();
    parts.push(if description.is_empty() {
        "Unknown error".to_string()
    } else {
        description
    });

    parts.push(format!("(domain: {}, code: {})", error.domain(), error.code()));

    if let Some(reason) = error.reason() {
        parts.push(format!("Reason: {}", reason));
    }
    if let Some(suggestion) = error.suggestion() {
        parts.push(format!("Suggestion: {}", suggestion));
    }

    format!("Detection failed: {}", parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_names_artifact_and_both_kinds() {
        let err = DetectionError::ModelUnavailable {
            artifact: "yolov11n.onnx".to_string(),
            diagnosis: ModelDiagnosis::from_discovery(vec![], vec![]),
        };
        let msg = describe(&err);
        assert!(msg.contains("yolov11n.onnx"));
        assert!(msg.contains("No .onnx or .pt artifacts found"));
    }

    #[test]
    fn test_uncompiled_only_diagnosis() {
        let diagnosis = ModelDiagnosis::from_discovery(vec![], vec!["yolov11n.pt".to_string()]);
        assert!(matches!(diagnosis, ModelDiagnosis::UncompiledOnly { .. }));
        let details = diagnosis.details("yolov11n.onnx");
        assert!(details.contains("yolov11n.pt"));
        assert!(details.contains("never exported"));
    }

    #[test]
    fn test_misnamed_compiled_diagnosis() {
        let diagnosis = ModelDiagnosis::from_discovery(
            vec!["best.onnx".to_string()],
            vec!["best.pt".to_string()],
        );
        let details = diagnosis.details("yolov11n.onnx");
        assert!(details.contains("best.onnx"));
        assert!(details.contains("best.pt"));
        assert!(details.contains("exactly yolov11n.onnx"));
    }

    #[test]
    fn test_nothing_found_advice_names_the_artifact() {
        let details = ModelDiagnosis::NothingFound.details("det.onnx");
        assert!(details.contains("Export the model to det.onnx"));
        assert!(!details.contains("detector"));
    }

    #[test]
    fn test_support_file_missing_has_no_export_advice() {
        let err = DetectionError::SupportFileMissing {
            file: "dict.txt".to_string(),
            dir: "assets".to_string(),
        };
        let msg = describe(&err);
        assert!(msg.contains("Support file 'dict.txt' missing from assets"));
        assert!(msg.contains("domain: assets, code: 6"));
        assert!(!msg.contains("Export"));
        assert!(!msg.contains(".onnx"));
    }

    #[test]
    fn test_describe_includes_reason_and_code() {
        let err = DetectionError::runtime("Text recognition", "session poisoned");
        let msg = describe(&err);
        assert!(msg.starts_with("Detection failed: "));
        assert!(msg.contains("domain: onnxruntime, code: 4"));
        assert!(msg.contains("Reason: session poisoned"));
        assert!(!msg.contains("Suggestion"));
    }

    #[test]
    fn test_unexpected_output_carries_observed_type() {
        let err = DetectionError::UnexpectedOutputShape {
            observed: "tensor f32 [1, 1000]".to_string(),
        };
        let msg = describe(&err);
        assert!(msg.contains("tensor f32 [1, 1000]"));
        assert!(msg.contains("Suggestion:"));
    }
}
