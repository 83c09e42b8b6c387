//! Inference adapter: one interface over the opaque landmark models.
//!
//! The estimation mode is a closed enum; dispatch is an exhaustive match.
//! Each underlying model call is independent: a failing model is logged
//! and yields an empty result field while the others still complete
//! (fail-open, no retry).

use tracing::warn;

use crate::config::EstimationConfig;
use crate::error::InferenceError;
use crate::inference::{FaceMeshModel, HandLandmarkModel, PoseModel};
use crate::types::{FaceMesh, Frame, Hand, Pose};

/// Which model(s) to run per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimationMode {
    Hand,
    Pose,
    Face,
    /// All three models.
    FullBody,
}

impl EstimationMode {
    pub fn wants_hands(self) -> bool {
        matches!(self, Self::Hand | Self::FullBody)
    }

    pub fn wants_faces(self) -> bool {
        matches!(self, Self::Face | Self::FullBody)
    }

    pub fn wants_poses(self) -> bool {
        matches!(self, Self::Pose | Self::FullBody)
    }
}

/// Hand landmark capability: `estimate(frame) -> hands`.
pub trait HandEstimator {
    fn estimate_hands(&mut self, frame: &Frame) -> Result<Vec<Hand>, InferenceError>;
}

/// Face mesh capability.
pub trait FaceEstimator {
    fn estimate_faces(&mut self, frame: &Frame) -> Result<Vec<FaceMesh>, InferenceError>;
}

/// Body pose capability.
pub trait PoseEstimator {
    fn estimate_poses(&mut self, frame: &Frame) -> Result<Vec<Pose>, InferenceError>;
}

/// Per-frame estimation result. Fields for models that were not invoked or
/// that failed stay empty.
#[derive(Debug, Default)]
pub struct Estimate {
    pub hands: Vec<Hand>,
    pub faces: Vec<FaceMesh>,
    pub poses: Vec<Pose>,
}

impl Estimate {
    pub fn is_empty(&self) -> bool {
        self.hands.is_empty() && self.faces.is_empty() && self.poses.is_empty()
    }
}

/// Wraps the loaded models behind one `estimate` call.
pub struct Estimator {
    hand: Option<Box<dyn HandEstimator>>,
    face: Option<Box<dyn FaceEstimator>>,
    pose: Option<Box<dyn PoseEstimator>>,
}

impl Estimator {
    pub fn new(
        hand: Option<Box<dyn HandEstimator>>,
        face: Option<Box<dyn FaceEstimator>>,
        pose: Option<Box<dyn PoseEstimator>>,
    ) -> Self {
        Self { hand, face, pose }
    }

    /// Load the ONNX models the given mode needs.
    pub fn load(config: &EstimationConfig, mode: EstimationMode) -> Result<Self, InferenceError> {
        let hand = if mode.wants_hands() {
            Some(Box::new(HandLandmarkModel::new(&config.hand_model)?) as Box<dyn HandEstimator>)
        } else {
            None
        };
        let face = if mode.wants_faces() {
            Some(Box::new(FaceMeshModel::new(
                &config.face_mesh_model,
                &config.face_detector_model,
            )?) as Box<dyn FaceEstimator>)
        } else {
            None
        };
        let pose = if mode.wants_poses() {
            Some(Box::new(PoseModel::new(&config.pose_model)?) as Box<dyn PoseEstimator>)
        } else {
            None
        };
        Ok(Self::new(hand, face, pose))
    }

    /// Run the models selected by `mode` on one frame.
    ///
    /// A model failure never aborts the whole estimate: the error is
    /// logged and that field is left empty, as if nothing was detected.
    pub fn estimate(&mut self, frame: &Frame, mode: EstimationMode) -> Estimate {
        let mut estimate = Estimate::default();

        if mode.wants_hands() {
            if let Some(model) = self.hand.as_mut() {
                match model.estimate_hands(frame) {
                    Ok(hands) => estimate.hands = hands,
                    Err(e) => warn!(error = %e, "hand estimation failed, continuing"),
                }
            }
        }
        if mode.wants_faces() {
            if let Some(model) = self.face.as_mut() {
                match model.estimate_faces(frame) {
                    Ok(faces) => estimate.faces = faces,
                    Err(e) => warn!(error = %e, "face estimation failed, continuing"),
                }
            }
        }
        if mode.wants_poses() {
            if let Some(model) = self.pose.as_mut() {
                match model.estimate_poses(frame) {
                    Ok(poses) => estimate.poses = poses,
                    Err(e) => warn!(error = %e, "pose estimation failed, continuing"),
                }
            }
        }
        estimate
    }
}
