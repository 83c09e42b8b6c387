//! Frame pipeline orchestrator.
//!
//! Drives the cooperative per-frame loop: pull the current camera frame,
//! run the selected models, render the overlay, publish landmark parts and
//! update the state sink. One iteration is in flight at a time; the
//! running flag is the sole loop-exit condition and is checked at the top
//! of every iteration.
//!
//! There is no timeout on a model call: a hung model stalls the loop. That
//! is a known limitation; stopping is effective within one pending
//! inference call's latency.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::capture::CaptureManager;
use crate::config::AppConfig;
use crate::error::PipelineError;
use crate::estimator::{Estimate, EstimationMode, Estimator};
use crate::head_pose::{estimate_head_orientation, rotation_to_euler};
use crate::sink::{KeypointKind, StateSink};
use crate::streaming::{LandmarkPublisher, PartMessage};
use crate::types::{Landmark, LandmarkSet};
use crate::vis::{
    self, draw_axis, draw_face, draw_hand, draw_pose, finger_landmark_set, Color, DrawSurface,
    FrameSurface,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Clonable stop control for a running pipeline. Flipping the flag takes
/// effect at the next iteration boundary; results of an in-flight
/// inference are discarded, not rendered or published.
#[derive(Clone)]
pub struct PipelineHandle {
    running: Arc<AtomicBool>,
}

impl PipelineHandle {
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

struct RenderStyle {
    keypoint_color: Color,
    hand_color: Color,
    mesh_color: Color,
    point_radius: f32,
    scale: f32,
    axis_length: f32,
    min_pose_confidence: f32,
    min_part_confidence: f32,
}

/// Composes capture, inference, rendering and publishing into the
/// per-frame loop, and owns start/stop state plus the draw surface.
pub struct Orchestrator {
    capture: CaptureManager,
    estimator: Estimator,
    publisher: LandmarkPublisher,
    sink: Box<dyn StateSink>,
    surface: FrameSurface,
    state: PipelineState,
    mode: EstimationMode,
    running: Arc<AtomicBool>,
    requested: (u32, u32),
    frame_interval: Duration,
    style: RenderStyle,
}

impl Orchestrator {
    pub fn new(
        capture: CaptureManager,
        estimator: Estimator,
        publisher: LandmarkPublisher,
        sink: Box<dyn StateSink>,
        config: &AppConfig,
    ) -> Self {
        let mut surface = FrameSurface::new(config.capture.width, config.capture.height);
        surface.set_mirror(config.ui.mirror);
        Self {
            capture,
            estimator,
            publisher,
            sink,
            surface,
            state: PipelineState::Stopped,
            mode: EstimationMode::Hand,
            running: Arc::new(AtomicBool::new(false)),
            requested: (config.capture.width, config.capture.height),
            frame_interval: Duration::from_secs(1) / config.capture.fps.max(1),
            style: RenderStyle {
                keypoint_color: vis::parse_hex(&config.ui.keypoint_color_hex),
                hand_color: vis::parse_hex(&config.ui.hand_color_hex),
                mesh_color: vis::parse_hex(&config.ui.mesh_color_hex),
                point_radius: config.ui.point_radius,
                scale: config.ui.overlay_scale,
                axis_length: config.ui.axis_length,
                min_pose_confidence: config.estimation.min_pose_confidence,
                min_part_confidence: config.estimation.min_part_confidence,
            },
        }
    }

    /// Open the capture device and size the draw surface to the negotiated
    /// frame dimensions. Rejected while starting or running: callers must
    /// `stop()` first; a running session is never merged or replaced.
    pub fn start(&mut self, device: &str, mode: EstimationMode) -> Result<(), PipelineError> {
        if matches!(self.state, PipelineState::Starting | PipelineState::Running) {
            return Err(PipelineError::AlreadyRunning);
        }
        self.state = PipelineState::Starting;

        let (w, h) = match self.capture.start(device, self.requested.0, self.requested.1) {
            Ok(dims) => dims,
            Err(e) => {
                self.state = PipelineState::Stopped;
                return Err(e.into());
            }
        };
        self.surface.resize(w, h);
        self.mode = mode;
        self.running.store(true, Ordering::SeqCst);
        self.state = PipelineState::Running;
        info!(device, ?mode, width = w, height = h, "pipeline started");
        Ok(())
    }

    /// Flip the running flag and release the capture device. The publisher
    /// link stays up: its lifecycle is independent of the capture session.
    pub fn stop(&mut self) {
        if self.state == PipelineState::Stopped {
            return;
        }
        self.state = PipelineState::Stopping;
        self.running.store(false, Ordering::SeqCst);
        self.capture.stop();
        self.state = PipelineState::Stopped;
        info!("pipeline stopped");
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn handle(&self) -> PipelineHandle {
        PipelineHandle {
            running: Arc::clone(&self.running),
        }
    }

    /// The draw surface, exclusively owned by the orchestrator while
    /// running. Hosts blit this to their display after each `step`.
    pub fn surface(&self) -> &FrameSurface {
        &self.surface
    }

    /// One frame iteration. Returns whether the loop should continue; the
    /// running check at the top is the sole exit condition.
    pub fn step(&mut self) -> bool {
        if !self.running.load(Ordering::SeqCst) || !self.capture.is_running() {
            return false;
        }

        let frame = match self.capture.current_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "frame grab failed, skipping iteration");
                return self.running.load(Ordering::SeqCst);
            }
        };
        self.surface.blit_frame(&frame);

        let estimate = self.estimator.estimate(&frame, self.mode);

        // A stop requested during inference discards this frame's results.
        if !self.running.load(Ordering::SeqCst) {
            return false;
        }

        self.render_and_publish(&estimate);
        true
    }

    /// Drive `step` until the running flag clears, paced at the configured
    /// frame rate, then release the capture device.
    pub async fn run(&mut self) {
        let mut ticker = tokio::time::interval(self.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        while self.step() {
            ticker.tick().await;
        }
        self.stop();
    }

    fn render_and_publish(&mut self, estimate: &Estimate) {
        if self.mode.wants_hands() {
            let hand_set = estimate.hands.first().map(|hand| {
                draw_hand(
                    &mut self.surface,
                    hand,
                    self.style.scale,
                    self.style.hand_color,
                    self.style.point_radius,
                );
                finger_landmark_set(hand)
            });
            if let Some(set) = &hand_set {
                for part in set.parts() {
                    self.publisher.publish(PartMessage::from_part(part));
                }
            }
            self.sink.update_keypoints(KeypointKind::Hand, hand_set.as_ref());
        }

        if self.mode.wants_faces() {
            let face_set = estimate.faces.first().map(|face| {
                draw_face(&mut self.surface, &face.mesh, self.style.mesh_color);
                match estimate_head_orientation(&face.mesh) {
                    Ok(orientation) => {
                        draw_axis(
                            &mut self.surface,
                            orientation.origin,
                            &orientation.rotation,
                            self.style.axis_length,
                        );
                        let angles = rotation_to_euler(&orientation.rotation);
                        let hud = format!(
                            "P {:.0} Y {:.0} R {:.0}",
                            angles.pitch, angles.yaw, angles.roll
                        );
                        self.surface
                            .draw_text(10.0, 10.0, &hud, 2, self.style.keypoint_color);
                    }
                    Err(e) => debug!(error = %e, "head orientation unavailable"),
                }
                mesh_landmark_set(&face.mesh)
            });
            self.sink.update_keypoints(KeypointKind::Face, face_set.as_ref());
        }

        if self.mode.wants_poses() {
            let pose_set = estimate
                .poses
                .iter()
                .find(|pose| pose.score >= self.style.min_pose_confidence)
                .map(|pose| {
                    draw_pose(
                        &mut self.surface,
                        pose,
                        self.style.min_pose_confidence,
                        self.style.min_part_confidence,
                        self.style.scale,
                        self.style.keypoint_color,
                    );
                    pose.landmark_set()
                });
            self.sink.update_keypoints(KeypointKind::Pose, pose_set.as_ref());
        }
    }
}

fn mesh_landmark_set(mesh: &[Landmark]) -> LandmarkSet {
    let mut set = LandmarkSet::new();
    set.push_part("mesh", mesh.to_vec());
    set
}
