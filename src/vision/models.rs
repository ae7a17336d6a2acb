//! Model artifacts and ONNX Runtime sessions
//!
//! Loading is done once per artifact; inference goes through [`OnnxSession::run`]
//! which keeps the `ort` specifics in one place.

use ndarray::{Array4, ArrayD};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use parking_lot::Mutex;
use std::path::Path;
use tracing::{debug, info};

use super::DetectionError;

/// Bundled model artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    /// Bus label detector (YOLO export)
    ObjectDetector,
    /// Text line detection model (DBNet)
    TextDetection,
    /// Text recognition model (CRNN/SVTR, CTC head)
    TextRecognition,
    /// Character dictionary for recognition
    Dictionary,
}

impl ModelType {
    /// Default file name of this artifact inside the asset bundle
    pub fn filename(&self) -> &'static str {
        match self {
            ModelType::ObjectDetector => "yolov11n.onnx",
            ModelType::TextDetection => "det.onnx",
            ModelType::TextRecognition => "rec.onnx",
            ModelType::Dictionary => "dict.txt",
        }
    }

    /// Display name for logs and diagnostics
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelType::ObjectDetector => "Bus Label Detector",
            ModelType::TextDetection => "Text Detection",
            ModelType::TextRecognition => "Text Recognition",
            ModelType::Dictionary => "Character Dictionary",
        }
    }
}

/// ONNX Runtime session wrapper
pub struct OnnxSession {
    model_type: ModelType,
    session: Mutex<Session>,
    input_names: Vec<String>,
    output_names: Vec<String>,
    /// Declared shape of the first input (dynamic axes are -1)
    input_shape: Vec<i64>,
}

impl std::fmt::Debug for OnnxSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxSession")
            .field("model_type", &self.model_type)
            .field("input_names", &self.input_names)
            .field("output_names", &self.output_names)
            .finish_non_exhaustive()
    }
}

impl OnnxSession {
    /// Create a new ONNX session from a model file
    pub fn new(model_path: &Path, model_type: ModelType) -> Result<Self, DetectionError> {
        let stage = model_type.display_name();
        info!("Loading {} model from {:?}", stage, model_path);

        let session = Session::builder()
            .and_then(|builder| builder.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|builder| builder.with_intra_threads(4))
            .and_then(|builder| builder.commit_from_file(model_path))
            .map_err(|e| DetectionError::runtime(stage, format!("failed to load {:?}: {}", model_path, e)))?;

        let input_names: Vec<String> = session.inputs.iter().map(|input| input.name.clone()).collect();
        let output_names: Vec<String> = session.outputs.iter().map(|output| output.name.clone()).collect();
        let input_shape = session
            .inputs
            .first()
            .map(|input| extract_shape(&input.input_type))
            .unwrap_or_default();

        info!(
            "{} model loaded. Inputs: {:?} {:?}, Outputs: {:?}",
            stage, input_names, input_shape, output_names
        );

        Ok(Self {
            model_type,
            session: Mutex::new(session),
            input_names,
            output_names,
            input_shape,
        })
    }

    /// Fixed spatial input size `(height, width)` of the first input, if the
    /// model declares one
    pub fn fixed_input_hw(&self) -> Option<(u32, u32)> {
        match self.input_shape.as_slice() {
            [_, _, h, w] if *h > 0 && *w > 0 => Some((*h as u32, *w as u32)),
            _ => None,
        }
    }

    /// Run a single NCHW float tensor through the model and return its first
    /// output as an owned float array.
    ///
    /// A first output that is not a float tensor is diagnosed according to
    /// the model type.
    pub fn run(&self, input: Array4<f32>) -> Result<ArrayD<f32>, DetectionError> {
        let stage = self.model_type.display_name();
        let input_name = self
            .input_names
            .first()
            .cloned()
            .unwrap_or_else(|| "images".to_string());

        let value = Value::from_array(input).map_err(|e| DetectionError::runtime(stage, e))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![input_name.as_str() => value])
            .map_err(|e| DetectionError::runtime(stage, e))?;

        let output = &outputs[0];
        let array = output
            .try_extract_array::<f32>()
            .map_err(|_| non_float_output(self.model_type, format!("{:?}", output.dtype())))?;

        debug!("{} output shape: {:?}", stage, array.shape());
        Ok(array.to_owned())
    }
}

/// Error for a first output that is not a float tensor. Only the object
/// detector gets the "not a detection model" diagnosis; the text models report
/// a runtime failure of their stage.
fn non_float_output(model_type: ModelType, observed: String) -> DetectionError {
    match model_type {
        ModelType::ObjectDetector => DetectionError::UnexpectedOutputShape { observed },
        _ => DetectionError::runtime(
            model_type.display_name(),
            format!("expected a float tensor output, got {}", observed),
        ),
    }
}

/// Extract shape from ONNX value type
fn extract_shape(value_type: &ort::value::ValueType) -> Vec<i64> {
    if let Some(shape) = value_type.tensor_shape() {
        shape.iter().copied().collect()
    } else {
        vec![]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_type_filenames() {
        assert_eq!(ModelType::ObjectDetector.filename(), "yolov11n.onnx");
        assert_eq!(ModelType::TextDetection.filename(), "det.onnx");
        assert_eq!(ModelType::TextRecognition.filename(), "rec.onnx");
        assert_eq!(ModelType::Dictionary.filename(), "dict.txt");
    }

    #[test]
    fn test_non_float_output_is_diagnosed_per_model() {
        let detector = non_float_output(ModelType::ObjectDetector, "Tensor<i64>".to_string());
        assert!(matches!(detector, DetectionError::UnexpectedOutputShape { .. }));

        for model in [ModelType::TextDetection, ModelType::TextRecognition] {
            match non_float_output(model, "Tensor<i64>".to_string()) {
                DetectionError::Runtime { stage, message } => {
                    assert_eq!(stage, model.display_name());
                    assert!(message.contains("Tensor<i64>"));
                }
                other => panic!("unexpected error {:?}", other),
            }
        }
    }

    #[test]
    fn test_missing_model_file_is_runtime_error() {
        let result = OnnxSession::new(Path::new("/nonexistent/model.onnx"), ModelType::ObjectDetector);
        assert!(matches!(result, Err(DetectionError::Runtime { .. })));
    }
}
