//! Detection state shared between the driver and the viewer

use crate::vision::{Detection, SourceImage};

/// Lifecycle of the current detection cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectionStatus {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// What the viewer renders.
///
/// Status, results and error message only ever change together through
/// [`begin`](Self::begin), [`succeed`](Self::succeed) and [`fail`](Self::fail).
#[derive(Debug, Clone, Default)]
pub struct DetectionState {
    status: DetectionStatus,
    detections: Vec<Detection>,
    error_message: Option<String>,
    image: Option<SourceImage>,
}

impl DetectionState {
    /// Start a cycle for `image`: results and error are cleared
    pub fn begin(&mut self, image: SourceImage) {
        self.status = DetectionStatus::Running;
        self.detections.clear();
        self.error_message = None;
        self.image = Some(image);
    }

    /// Publish the results of the current cycle
    pub fn succeed(&mut self, detections: Vec<Detection>) {
        self.status = DetectionStatus::Succeeded;
        self.detections = detections;
        self.error_message = None;
    }

    /// Publish a failure; no partial results are kept
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = DetectionStatus::Failed;
        self.detections.clear();
        self.error_message = Some(message.into());
    }

    pub fn status(&self) -> DetectionStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == DetectionStatus::Running
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn image(&self) -> Option<&SourceImage> {
        self.image.as_ref()
    }
}
