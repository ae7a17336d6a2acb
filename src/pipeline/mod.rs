//! Detection pipeline
//!
//! One cycle: run the object detector once, then recognize text in every
//! detected region concurrently and pair each box with its text.

pub mod driver;
pub mod state;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::vision::{DetectedObject, Detection, DetectionError, ObjectDetector, SourceImage, TextRecognizer};

pub use driver::Driver;
pub use state::{DetectionState, DetectionStatus};

/// What a failed region recognition does to the whole cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionPolicy {
    /// The first failure aborts the remaining recognitions and fails the
    /// cycle; completed results are discarded
    #[default]
    FailFast,
    /// Failed regions are kept with no text
    PartialResults,
}

/// Detector + recognizer pair
pub struct DetectionPipeline {
    detector: Arc<dyn ObjectDetector>,
    recognizer: Arc<dyn TextRecognizer>,
    policy: RecognitionPolicy,
}

impl DetectionPipeline {
    pub fn new(
        detector: Arc<dyn ObjectDetector>,
        recognizer: Arc<dyn TextRecognizer>,
        policy: RecognitionPolicy,
    ) -> Self {
        Self {
            detector,
            recognizer,
            policy,
        }
    }

    pub fn policy(&self) -> RecognitionPolicy {
        self.policy
    }

    /// Run one detection cycle. The order of the returned detections is
    /// unspecified.
    pub async fn run(&self, image: &SourceImage) -> Result<Vec<Detection>, DetectionError> {
        let objects = self.detector.detect(image).await?;
        info!("Detector returned {} regions", objects.len());

        if objects.is_empty() {
            return Ok(Vec::new());
        }

        let mut tasks = JoinSet::new();
        let mut pending: HashMap<tokio::task::Id, DetectedObject> = HashMap::with_capacity(objects.len());

        for object in objects {
            let recognizer = Arc::clone(&self.recognizer);
            let image = image.clone();
            let handle = tasks.spawn(async move {
                let text = recognizer.recognize(&image, object.bounding_box).await;
                (object, text)
            });
            pending.insert(handle.id(), object);
        }

        let mut detections = Vec::with_capacity(pending.len());

        while let Some(joined) = tasks.join_next().await {
            let (object, outcome) = match joined {
                Ok(pair) => pair,
                Err(join_error) => {
                    let Some(object) = pending.get(&join_error.id()).copied() else {
                        continue;
                    };
                    (object, Err(DetectionError::TaskFailed(join_error.to_string())))
                }
            };

            match outcome {
                Ok(text) => {
                    debug!("Region {:?} -> {:?}", object.bounding_box, text);
                    detections.push(Detection::new(object, text));
                }
                Err(err) if self.policy == RecognitionPolicy::PartialResults => {
                    warn!("Recognition failed for region {:?}: {}", object.bounding_box, err);
                    detections.push(Detection::new(object, None));
                }
                Err(err) => {
                    tasks.abort_all();
                    return Err(err);
                }
            }
        }

        Ok(detections)
    }
}
