//! Detection driver
//!
//! Starts detection cycles on the tokio runtime and publishes their outcome
//! into the shared [`DetectionState`]. Every failure ends here: it is turned
//! into one message with [`describe`], logged, and shown by the viewer.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::{DetectionPipeline, DetectionState};
use crate::vision::{describe, DetectionError, SourceImage};

type RepaintNotifier = Arc<dyn Fn() + Send + Sync>;

/// Owns the pipeline and the shared detection state
pub struct Driver {
    /// `Err` holds the described load failure, reported on every request
    pipeline: Result<Arc<DetectionPipeline>, String>,
    runtime: Handle,
    state: Arc<RwLock<DetectionState>>,
    generation: Arc<AtomicU64>,
    notifier: Option<RepaintNotifier>,
}

impl Driver {
    pub fn new(pipeline: Result<DetectionPipeline, DetectionError>, runtime: Handle) -> Self {
        if let Ok(pipeline) = &pipeline {
            info!("Detection pipeline ready (policy {:?})", pipeline.policy());
        }
        let pipeline = pipeline.map(Arc::new).map_err(|e| {
            let message = describe(&e);
            error!("{}", message);
            message
        });

        Self {
            pipeline,
            runtime,
            state: Arc::new(RwLock::new(DetectionState::default())),
            generation: Arc::new(AtomicU64::new(0)),
            notifier: None,
        }
    }

    /// Call `notify` after every state change (e.g. to wake the UI)
    pub fn with_repaint_notifier(mut self, notify: impl Fn() + Send + Sync + 'static) -> Self {
        self.notifier = Some(Arc::new(notify));
        self
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> DetectionState {
        self.state.read().clone()
    }

    /// Start a detection cycle for `image`. A newer request supersedes any
    /// cycle still in flight: only the latest one publishes.
    pub fn request(&self, image: SourceImage) -> JoinHandle<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.write().begin(image.clone());
        self.notify();
        info!("Detection request #{} ({}x{})", generation, image.width(), image.height());

        let pipeline = self.pipeline.clone();
        let state = Arc::clone(&self.state);
        let latest = Arc::clone(&self.generation);
        let notifier = self.notifier.clone();

        self.runtime.spawn(async move {
            let outcome = match pipeline {
                Ok(pipeline) => pipeline.run(&image).await.map_err(|e| describe(&e)),
                Err(message) => Err(message),
            };

            {
                let mut state = state.write();
                if latest.load(Ordering::SeqCst) != generation {
                    debug!("Detection request #{} superseded", generation);
                    return;
                }

                match outcome {
                    Ok(detections) => {
                        info!("Detection request #{} found {} labels", generation, detections.len());
                        state.succeed(detections);
                    }
                    Err(message) => {
                        error!("{}", message);
                        state.fail(message);
                    }
                }
            }

            if let Some(notify) = notifier {
                notify();
            }
        })
    }

    /// Surface a failure that happened before a cycle could start (e.g. the
    /// test image is missing). Supersedes any cycle in flight.
    pub fn report_error(&self, message: impl Into<String>) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let message = message.into();
        error!("{}", message);
        self.state.write().fail(message);
        self.notify();
    }

    fn notify(&self) {
        if let Some(notify) = &self.notifier {
            notify();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::{image, region, FakeDetector, FakeRecognizer};
    use crate::pipeline::{DetectionStatus, RecognitionPolicy};
    use crate::vision::{DetectedObject, ObjectDetector};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    fn driver(detector: impl ObjectDetector + 'static, recognizer_fails_at: Option<f32>) -> Driver {
        let pipeline = DetectionPipeline::new(
            Arc::new(detector),
            Arc::new(FakeRecognizer::new(recognizer_fails_at)),
            RecognitionPolicy::FailFast,
        );
        Driver::new(Ok(pipeline), Handle::current())
    }

    /// Holds back images narrower than 4 px until released; returns one
    /// region per pixel of width
    struct GatedDetector {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl ObjectDetector for GatedDetector {
        async fn detect(&self, image: &SourceImage) -> Result<Vec<DetectedObject>, DetectionError> {
            if image.width() < 4 {
                self.gate.notified().await;
            }
            Ok((0..image.width()).map(|i| region(0.1 * i as f32 + 0.1)).collect())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_request_publishes_results() {
        let driver = driver(FakeDetector { result: Ok(vec![region(0.3)]) }, None);
        driver.request(image(8)).await.unwrap();

        let state = driver.snapshot();
        assert_eq!(state.status(), DetectionStatus::Succeeded);
        assert_eq!(state.detections().len(), 1);
        assert_eq!(state.detections()[0].recognized_text.as_deref(), Some("0.3"));
        assert!(state.error_message().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_recognition_failure_yields_no_detections() {
        let driver = driver(
            FakeDetector {
                result: Ok(vec![region(0.2), region(0.5)]),
            },
            Some(0.5),
        );
        driver.request(image(8)).await.unwrap();

        let state = driver.snapshot();
        assert_eq!(state.status(), DetectionStatus::Failed);
        assert!(state.detections().is_empty());
        let message = state.error_message().unwrap();
        assert!(message.starts_with("Detection failed: "));
        assert!(message.contains("region unreadable"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_load_failure_is_reported_per_request() {
        let err = DetectionError::ModelUnavailable {
            artifact: "yolov11n.onnx".to_string(),
            diagnosis: crate::vision::ModelDiagnosis::NothingFound,
        };
        let driver = Driver::new(Err(err), Handle::current());
        driver.request(image(8)).await.unwrap();

        let state = driver.snapshot();
        assert_eq!(state.status(), DetectionStatus::Failed);
        assert!(state.error_message().unwrap().contains("yolov11n.onnx"));
        assert!(state.image().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_newer_request_supersedes_older() {
        let gate = Arc::new(Notify::new());
        let driver = driver(GatedDetector { gate: gate.clone() }, None);

        let stale = driver.request(image(2));
        let fresh = driver.request(image(5));
        fresh.await.unwrap();
        assert_eq!(driver.snapshot().detections().len(), 5);

        gate.notify_one();
        stale.await.unwrap();

        let state = driver.snapshot();
        assert_eq!(state.status(), DetectionStatus::Succeeded);
        assert_eq!(state.detections().len(), 5);
        assert_eq!(state.image().map(|i| i.width()), Some(5));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_report_error_and_notifier() {
        let repaints = Arc::new(AtomicUsize::new(0));
        let counter = repaints.clone();
        let driver = driver(FakeDetector { result: Ok(vec![]) }, None).with_repaint_notifier(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        driver.request(image(8)).await.unwrap();
        assert_eq!(repaints.load(Ordering::SeqCst), 2);
        assert_eq!(driver.snapshot().status(), DetectionStatus::Succeeded);

        driver.report_error("Test image 'bus.jpg' not found in assets");
        let state = driver.snapshot();
        assert_eq!(state.status(), DetectionStatus::Failed);
        assert_eq!(state.error_message(), Some("Test image 'bus.jpg' not found in assets"));
        assert_eq!(repaints.load(Ordering::SeqCst), 3);
    }
}
