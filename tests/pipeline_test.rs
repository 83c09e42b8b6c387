//! End-to-end pipeline scenarios over a fake camera backend, fake
//! estimators and a counting fake transport.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageBuffer, Rgb};

use trackcast::capture::{CameraBackend, CaptureManager, PixelSource};
use trackcast::config::AppConfig;
use trackcast::error::{CaptureError, InferenceError, PipelineError, StreamError};
use trackcast::estimator::{EstimationMode, Estimator, FaceEstimator, HandEstimator};
use trackcast::pipeline::{Orchestrator, PipelineHandle, PipelineState};
use trackcast::sink::{KeypointKind, StateSink};
use trackcast::streaming::{ChannelTransport, LandmarkPublisher, LinkState};
use trackcast::types::{FaceMesh, Frame, Hand, Landmark};

// ── Fakes ────────────────────────────────────────────────────────

struct FakeSource;

impl PixelSource for FakeSource {
    fn native_dimensions(&self) -> (u32, u32) {
        (640, 480)
    }
    fn grab(&mut self) -> Result<ImageBuffer<Rgb<u8>, Vec<u8>>, CaptureError> {
        Ok(ImageBuffer::from_pixel(640, 480, Rgb([30, 30, 30])))
    }
    fn close(&mut self) {}
}

struct FakeBackend;

impl CameraBackend for FakeBackend {
    fn open(
        &mut self,
        _device: &str,
        _width: u32,
        _height: u32,
    ) -> Result<Box<dyn PixelSource>, CaptureError> {
        Ok(Box::new(FakeSource))
    }
}

/// One hand, 21 landmarks at predictable raw coordinates.
struct FixedHand;

impl HandEstimator for FixedHand {
    fn estimate_hands(&mut self, _frame: &Frame) -> Result<Vec<Hand>, InferenceError> {
        Ok(vec![Hand {
            score: 0.95,
            landmarks: (0..21)
                .map(|i| Landmark::new(i as f32 * 10.0, i as f32 * 5.0, 0.0))
                .collect(),
        }])
    }
}

struct FailingFace;

impl FaceEstimator for FailingFace {
    fn estimate_faces(&mut self, _frame: &Frame) -> Result<Vec<FaceMesh>, InferenceError> {
        Err(InferenceError::InferenceFailure {
            name: "face_mesh",
            reason: "model blew up".into(),
        })
    }
}

/// Requests a pipeline stop from inside the estimate call, simulating a
/// `stop()` racing an in-flight inference.
struct StoppingHand {
    handle: Arc<Mutex<Option<PipelineHandle>>>,
}

impl HandEstimator for StoppingHand {
    fn estimate_hands(&mut self, _frame: &Frame) -> Result<Vec<Hand>, InferenceError> {
        if let Some(handle) = self.handle.lock().unwrap().as_ref() {
            handle.stop();
        }
        FixedHand.estimate_hands(_frame)
    }
}

#[derive(Default)]
struct TransportLog {
    joins: usize,
    emits: Vec<serde_json::Value>,
}

struct FakeTransport {
    log: Arc<Mutex<TransportLog>>,
}

impl FakeTransport {
    fn new() -> (Box<dyn ChannelTransport>, Arc<Mutex<TransportLog>>) {
        let log = Arc::new(Mutex::new(TransportLog::default()));
        (
            Box::new(Self {
                log: Arc::clone(&log),
            }),
            log,
        )
    }
}

#[async_trait]
impl ChannelTransport for FakeTransport {
    async fn connect(&mut self) -> Result<(), StreamError> {
        Ok(())
    }
    async fn join(&mut self, _room: &str) -> Result<(), StreamError> {
        self.log.lock().unwrap().joins += 1;
        Ok(())
    }
    async fn emit(&mut self, _event: &str, data: serde_json::Value) -> Result<(), StreamError> {
        self.log.lock().unwrap().emits.push(data);
        Ok(())
    }
    async fn close(&mut self) {}
}

type SinkLog = Arc<Mutex<Vec<(KeypointKind, Option<Vec<String>>)>>>;

struct RecordingSink {
    log: SinkLog,
}

impl RecordingSink {
    fn new() -> (Box<dyn StateSink>, SinkLog) {
        let log: SinkLog = Arc::default();
        (
            Box::new(Self {
                log: Arc::clone(&log),
            }),
            log,
        )
    }
}

impl StateSink for RecordingSink {
    fn update_keypoints(
        &mut self,
        kind: KeypointKind,
        value: Option<&trackcast::types::LandmarkSet>,
    ) {
        let parts =
            value.map(|set| set.parts().iter().map(|p| p.name.to_string()).collect());
        self.log.lock().unwrap().push((kind, parts));
    }
}

// ── Helpers ──────────────────────────────────────────────────────

async fn connected_publisher() -> (LandmarkPublisher, Arc<Mutex<TransportLog>>) {
    let (transport, log) = FakeTransport::new();
    let mut publisher = LandmarkPublisher::new();
    publisher.connect(transport, "webclient").unwrap();
    for _ in 0..200 {
        if publisher.state() == LinkState::Connected {
            return (publisher, log);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("publisher never connected");
}

fn orchestrator_with(
    hand: Option<Box<dyn HandEstimator>>,
    face: Option<Box<dyn FaceEstimator>>,
    publisher: LandmarkPublisher,
) -> (Orchestrator, SinkLog) {
    let capture = CaptureManager::new(Box::new(FakeBackend));
    let estimator = Estimator::new(hand, face, None);
    let (sink, sink_log) = RecordingSink::new();
    let orchestrator =
        Orchestrator::new(capture, estimator, publisher, sink, &AppConfig::default());
    (orchestrator, sink_log)
}

// ── Scenarios ────────────────────────────────────────────────────

#[tokio::test]
async fn hand_frame_publishes_five_finger_parts_in_order() {
    let (publisher, log) = connected_publisher().await;
    let (mut orchestrator, sink_log) =
        orchestrator_with(Some(Box::new(FixedHand)), None, publisher);

    orchestrator.start("cam0", EstimationMode::Hand).unwrap();
    assert!(orchestrator.step());
    tokio::time::sleep(Duration::from_millis(50)).await;

    let log = log.lock().unwrap();
    assert_eq!(log.emits.len(), 5, "one publish per finger");
    let parts: Vec<&str> = log
        .emits
        .iter()
        .map(|v| v["part"].as_str().unwrap())
        .collect();
    assert_eq!(
        parts,
        vec!["thumb", "indexFinger", "middleFinger", "ringFinger", "pinky"]
    );
    for emit in &log.emits {
        assert_eq!(emit["points"].as_array().unwrap().len(), 5);
        // Wrist-adjacent point leads every finger.
        assert_eq!(emit["points"][0][0], 0.0);
        assert_eq!(emit["points"][0][1], 0.0);
    }
    // Mirror mode is on by default, yet the wire carries raw device pixel
    // coordinates: thumb's second point is landmark 1 at (10, 5).
    assert_eq!(log.emits[0]["points"][1][0], 10.0);
    assert_eq!(log.emits[0]["points"][1][1], 5.0);

    let sink_log = sink_log.lock().unwrap();
    assert_eq!(sink_log.len(), 1);
    let (kind, parts) = &sink_log[0];
    assert_eq!(*kind, KeypointKind::Hand);
    assert_eq!(parts.as_ref().unwrap().len(), 5);
}

#[tokio::test]
async fn failing_face_model_does_not_abort_full_body() {
    let (publisher, log) = connected_publisher().await;
    let (mut orchestrator, sink_log) = orchestrator_with(
        Some(Box::new(FixedHand)),
        Some(Box::new(FailingFace)),
        publisher,
    );

    orchestrator.start("cam0", EstimationMode::FullBody).unwrap();
    assert!(orchestrator.step(), "pipeline must keep running");
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(log.lock().unwrap().emits.len(), 5, "hand results survive");

    let sink_log = sink_log.lock().unwrap();
    let face_update = sink_log
        .iter()
        .find(|(kind, _)| *kind == KeypointKind::Face)
        .unwrap();
    assert!(face_update.1.is_none(), "failed model reports no landmarks");
}

#[tokio::test]
async fn second_start_is_rejected_and_first_session_keeps_running() {
    let (publisher, _log) = connected_publisher().await;
    let (mut orchestrator, _) = orchestrator_with(Some(Box::new(FixedHand)), None, publisher);

    orchestrator.start("cam0", EstimationMode::Hand).unwrap();
    let err = orchestrator.start("cam1", EstimationMode::Hand).unwrap_err();
    assert!(matches!(err, PipelineError::AlreadyRunning));
    assert_eq!(orchestrator.state(), PipelineState::Running);
    assert!(orchestrator.step(), "first session is untouched");
}

#[tokio::test]
async fn stop_is_idempotent_and_restart_works() {
    let (publisher, _log) = connected_publisher().await;
    let (mut orchestrator, _) = orchestrator_with(Some(Box::new(FixedHand)), None, publisher);

    orchestrator.stop();
    orchestrator.stop();
    assert_eq!(orchestrator.state(), PipelineState::Stopped);

    orchestrator.start("cam0", EstimationMode::Hand).unwrap();
    orchestrator.stop();
    assert_eq!(orchestrator.state(), PipelineState::Stopped);

    // Restart discipline: stop() then start() is the supported sequence.
    orchestrator.start("cam0", EstimationMode::Hand).unwrap();
    assert!(orchestrator.step());
}

#[tokio::test]
async fn publisher_link_survives_pipeline_stop() {
    let (publisher, _log) = connected_publisher().await;
    let (mut orchestrator, _) = orchestrator_with(Some(Box::new(FixedHand)), None, publisher);

    orchestrator.start("cam0", EstimationMode::Hand).unwrap();
    orchestrator.stop();
    // The capture session is gone but the link lifecycle is independent;
    // a restart reuses it without reconnecting.
    orchestrator.start("cam0", EstimationMode::Hand).unwrap();
    assert!(orchestrator.step());
}

#[tokio::test]
async fn stop_during_inference_discards_results() {
    let (publisher, log) = connected_publisher().await;
    let handle_slot: Arc<Mutex<Option<PipelineHandle>>> = Arc::default();
    let (mut orchestrator, sink_log) = orchestrator_with(
        Some(Box::new(StoppingHand {
            handle: Arc::clone(&handle_slot),
        })),
        None,
        publisher,
    );
    orchestrator.start("cam0", EstimationMode::Hand).unwrap();
    *handle_slot.lock().unwrap() = Some(orchestrator.handle());

    // The estimator flips the stop flag mid-frame: the iteration must end
    // the loop and throw its results away.
    assert!(!orchestrator.step());
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(log.lock().unwrap().emits.len(), 0);
    assert!(sink_log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn run_loop_exits_once_the_flag_clears() {
    let (publisher, _log) = connected_publisher().await;
    let handle_slot: Arc<Mutex<Option<PipelineHandle>>> = Arc::default();
    let (mut orchestrator, _) = orchestrator_with(
        Some(Box::new(StoppingHand {
            handle: Arc::clone(&handle_slot),
        })),
        None,
        publisher,
    );
    orchestrator.start("cam0", EstimationMode::Hand).unwrap();
    *handle_slot.lock().unwrap() = Some(orchestrator.handle());

    tokio::time::timeout(Duration::from_secs(2), orchestrator.run())
        .await
        .expect("run() must exit after the stop request");
    assert_eq!(orchestrator.state(), PipelineState::Stopped);
}
