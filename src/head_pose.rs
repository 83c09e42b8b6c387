//! Head orientation derived from face-mesh landmarks.
//!
//! A 3x3 rotation matrix is built from a canonical subset of anchor points
//! (eye corners, chin, nose tip) and decomposed into pitch/yaw/roll for
//! consumers. Works for any mesh size as long as the anchors are present.

use nalgebra::{Matrix3, Vector3};

use crate::error::GeometryError;
use crate::types::Landmark;

/// Canonical anchor indices into the 468-point face mesh.
pub const NOSE_TIP: usize = 1;
pub const CHIN: usize = 152;
pub const LEFT_EYE_OUTER: usize = 33;
pub const RIGHT_EYE_OUTER: usize = 263;

/// Minimum mesh length for which every anchor is addressable.
const REQUIRED_LANDMARKS: usize = RIGHT_EYE_OUTER + 1;

/// Origin point plus 3x3 rotation matrix.
///
/// Rows are the head's local axes in device space: row 0 points toward the
/// head's right, row 1 down toward the chin, row 2 out of the face.
#[derive(Debug, Clone)]
pub struct HeadOrientation {
    pub origin: (f32, f32),
    pub rotation: Matrix3<f32>,
}

/// Pitch/yaw/roll in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EulerAngles {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

/// Derive the head orientation from the canonical anchors.
///
/// Fails with [`GeometryError::InsufficientLandmarks`] when the mesh is too
/// short to contain the anchors, or when the anchors are degenerate
/// (coincident points give no usable axes).
pub fn estimate_head_orientation(mesh: &[Landmark]) -> Result<HeadOrientation, GeometryError> {
    let insufficient = GeometryError::InsufficientLandmarks {
        required: REQUIRED_LANDMARKS,
        actual: mesh.len(),
    };
    if mesh.len() < REQUIRED_LANDMARKS {
        return Err(insufficient);
    }

    let point = |i: usize| {
        let lm = &mesh[i];
        Vector3::new(lm.x, lm.y, lm.z)
    };
    let left_eye = point(LEFT_EYE_OUTER);
    let right_eye = point(RIGHT_EYE_OUTER);
    let chin = point(CHIN);
    let nose = point(NOSE_TIP);

    let x_axis = match (right_eye - left_eye).try_normalize(1e-6) {
        Some(v) => v,
        None => return Err(insufficient),
    };
    let eye_mid = (left_eye + right_eye) / 2.0;
    let down = match (chin - eye_mid).try_normalize(1e-6) {
        Some(v) => v,
        None => return Err(insufficient),
    };
    let z_axis = match x_axis.cross(&down).try_normalize(1e-6) {
        Some(v) => v,
        None => return Err(insufficient),
    };
    let y_axis = z_axis.cross(&x_axis);

    Ok(HeadOrientation {
        origin: (nose.x, nose.y),
        rotation: Matrix3::from_rows(&[
            x_axis.transpose(),
            y_axis.transpose(),
            z_axis.transpose(),
        ]),
    })
}

/// Standard rotation-matrix decomposition into pitch/yaw/roll degrees.
///
/// At the gimbal-lock boundary (pitch within ~1e-6 of +-90 degrees) the
/// decomposition is underdetermined; yaw is pinned to 0 and roll is
/// recovered from the remaining matrix entries, so the result is always
/// finite.
pub fn rotation_to_euler(r: &Matrix3<f32>) -> EulerAngles {
    let sy = (r[(0, 0)] * r[(0, 0)] + r[(1, 0)] * r[(1, 0)]).sqrt();
    let pitch = (-r[(2, 0)]).atan2(sy);
    let (yaw, roll) = if sy >= 1e-6 {
        (r[(1, 0)].atan2(r[(0, 0)]), r[(2, 1)].atan2(r[(2, 2)]))
    } else {
        (0.0, (-r[(1, 2)]).atan2(r[(1, 1)]))
    };
    EulerAngles {
        pitch: pitch.to_degrees(),
        yaw: yaw.to_degrees(),
        roll: roll.to_degrees(),
    }
}
