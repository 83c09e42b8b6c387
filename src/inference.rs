//! ONNX-backed landmark models.
//!
//! Three sessions, one per capability: MediaPipe-style hand landmarks
//! (21 points), face mesh (468 points, fed by the UltraFace region
//! detector), and MoveNet-style single pose (17 COCO keypoints).

use image::{imageops, imageops::FilterType, ImageBuffer, Rgb};
use ort::session::{builder::GraphOptimizationLevel, Session};

use crate::detector::{FaceDetector, FaceRegion};
use crate::error::InferenceError;
use crate::estimator::{FaceEstimator, HandEstimator, PoseEstimator};
use crate::types::{FaceMesh, Frame, Hand, Keypoint, Landmark, Pose};
use crate::vis::POSE_PART_NAMES;

const HAND_INPUT: u32 = 224;
const HAND_LANDMARKS: usize = 21;
const MIN_HAND_SCORE: f32 = 0.8;

const MESH_INPUT: u32 = 192;
const MESH_LANDMARKS: usize = 468;
const MESH_ROI_PAD: f32 = 0.25;

const POSE_INPUT: u32 = 192;
const POSE_KEYPOINTS: usize = 17;

fn build_session(path: &str) -> ort::Result<Session> {
    Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(4)?
        .commit_from_file(path)
}

fn load_session(path: &str, name: &'static str) -> Result<Session, InferenceError> {
    build_session(path).map_err(|e| InferenceError::ModelLoad {
        name,
        reason: e.to_string(),
    })
}

/// HWC image to interleaved NHWC floats with a per-pixel normalizer.
fn interleaved_normalized(
    image: &ImageBuffer<Rgb<u8>, Vec<u8>>,
    normalize: impl Fn(u8) -> f32,
) -> Vec<f32> {
    let mut data = Vec::with_capacity((image.width() * image.height() * 3) as usize);
    for pixel in image.pixels() {
        data.push(normalize(pixel[0]));
        data.push(normalize(pixel[1]));
        data.push(normalize(pixel[2]));
    }
    data
}

// ── Hand ─────────────────────────────────────────────────────────

pub struct HandLandmarkModel {
    session: Session,
}

impl HandLandmarkModel {
    pub fn new(model_path: &str) -> Result<Self, InferenceError> {
        Ok(Self {
            session: load_session(model_path, "hand_landmark")?,
        })
    }

    fn run(&mut self, input: Vec<f32>) -> ort::Result<(Vec<f32>, f32)> {
        let tensor = ort::value::Tensor::from_array((vec![1, 224, 224, 3], input))?;
        let outputs = self.session.run(ort::inputs![tensor])?;
        let (_, landmarks) = outputs[0].try_extract_tensor::<f32>()?;
        let (_, score) = outputs[1].try_extract_tensor::<f32>()?;
        Ok((landmarks.to_vec(), score.first().copied().unwrap_or(0.0)))
    }
}

impl HandEstimator for HandLandmarkModel {
    fn estimate_hands(&mut self, frame: &Frame) -> Result<Vec<Hand>, InferenceError> {
        let resized = imageops::resize(&frame.pixels, HAND_INPUT, HAND_INPUT, FilterType::Triangle);
        let input = interleaved_normalized(&resized, |p| p as f32 / 255.0);

        let (raw, score) = self
            .run(input)
            .map_err(|e| InferenceError::InferenceFailure {
                name: "hand_landmark",
                reason: e.to_string(),
            })?;

        if score < MIN_HAND_SCORE {
            return Ok(Vec::new());
        }
        if raw.len() < HAND_LANDMARKS * 3 {
            return Err(InferenceError::MalformedOutput {
                name: "hand_landmark",
                got: raw.len(),
                expected: HAND_LANDMARKS * 3,
            });
        }

        // Model space is the 224x224 input; scale back to frame pixels.
        let sx = frame.width() as f32 / HAND_INPUT as f32;
        let sy = frame.height() as f32 / HAND_INPUT as f32;
        let landmarks = (0..HAND_LANDMARKS)
            .map(|i| Landmark::new(raw[i * 3] * sx, raw[i * 3 + 1] * sy, raw[i * 3 + 2]))
            .collect();

        Ok(vec![Hand { score, landmarks }])
    }
}

// ── Face mesh ────────────────────────────────────────────────────

pub struct FaceMeshModel {
    session: Session,
    detector: FaceDetector,
}

impl FaceMeshModel {
    pub fn new(mesh_path: &str, detector_path: &str) -> Result<Self, InferenceError> {
        Ok(Self {
            session: load_session(mesh_path, "face_mesh")?,
            detector: FaceDetector::new(detector_path)?,
        })
    }

    fn run(&mut self, input: Vec<f32>) -> ort::Result<Vec<f32>> {
        let tensor = ort::value::Tensor::from_array((vec![1, 192, 192, 3], input))?;
        let outputs = self.session.run(ort::inputs![tensor])?;
        let (_, mesh) = outputs[0].try_extract_tensor::<f32>()?;
        Ok(mesh.to_vec())
    }
}

impl FaceEstimator for FaceMeshModel {
    fn estimate_faces(&mut self, frame: &Frame) -> Result<Vec<FaceMesh>, InferenceError> {
        let Some(region) = self.detector.detect(&frame.pixels)? else {
            return Ok(Vec::new());
        };
        let (crop, ox, oy) = padded_crop(&frame.pixels, region, MESH_ROI_PAD);
        let sx = crop.width() as f32 / MESH_INPUT as f32;
        let sy = crop.height() as f32 / MESH_INPUT as f32;

        let resized = imageops::resize(&crop, MESH_INPUT, MESH_INPUT, FilterType::Triangle);
        let input = interleaved_normalized(&resized, |p| p as f32 / 127.5 - 1.0);

        let raw = self
            .run(input)
            .map_err(|e| InferenceError::InferenceFailure {
                name: "face_mesh",
                reason: e.to_string(),
            })?;

        if raw.len() < MESH_LANDMARKS * 3 {
            return Err(InferenceError::MalformedOutput {
                name: "face_mesh",
                got: raw.len(),
                expected: MESH_LANDMARKS * 3,
            });
        }

        // Mesh local (0..192) -> crop -> full frame.
        let mesh = (0..MESH_LANDMARKS)
            .map(|i| {
                Landmark::new(
                    ox + raw[i * 3] * sx,
                    oy + raw[i * 3 + 1] * sy,
                    raw[i * 3 + 2],
                )
            })
            .collect();

        Ok(vec![FaceMesh { mesh }])
    }
}

/// Expand a region by `pad` on each side, clip to the frame, and crop.
/// Returns the crop plus its top-left offset in frame coordinates.
fn padded_crop(
    frame: &ImageBuffer<Rgb<u8>, Vec<u8>>,
    region: FaceRegion,
    pad: f32,
) -> (ImageBuffer<Rgb<u8>, Vec<u8>>, f32, f32) {
    let pad_w = region.width * pad;
    let pad_h = region.height * pad;
    let x = (region.x - pad_w / 2.0).max(0.0);
    let y = (region.y - pad_h / 2.0).max(0.0);
    let w = (region.width + pad_w).min(frame.width() as f32 - x);
    let h = (region.height + pad_h).min(frame.height() as f32 - y);
    let crop = imageops::crop_imm(frame, x as u32, y as u32, w.max(1.0) as u32, h.max(1.0) as u32)
        .to_image();
    (crop, x, y)
}

// ── Pose ─────────────────────────────────────────────────────────

pub struct PoseModel {
    session: Session,
}

impl PoseModel {
    pub fn new(model_path: &str) -> Result<Self, InferenceError> {
        Ok(Self {
            session: load_session(model_path, "pose")?,
        })
    }

    fn run(&mut self, input: Vec<f32>) -> ort::Result<Vec<f32>> {
        let tensor = ort::value::Tensor::from_array((vec![1, 192, 192, 3], input))?;
        let outputs = self.session.run(ort::inputs![tensor])?;
        let (_, keypoints) = outputs[0].try_extract_tensor::<f32>()?;
        Ok(keypoints.to_vec())
    }
}

impl PoseEstimator for PoseModel {
    fn estimate_poses(&mut self, frame: &Frame) -> Result<Vec<Pose>, InferenceError> {
        let resized = imageops::resize(&frame.pixels, POSE_INPUT, POSE_INPUT, FilterType::Triangle);
        let input = interleaved_normalized(&resized, |p| p as f32);

        let raw = self
            .run(input)
            .map_err(|e| InferenceError::InferenceFailure {
                name: "pose",
                reason: e.to_string(),
            })?;

        if raw.len() < POSE_KEYPOINTS * 3 {
            return Err(InferenceError::MalformedOutput {
                name: "pose",
                got: raw.len(),
                expected: POSE_KEYPOINTS * 3,
            });
        }

        // Output rows are (y, x, score) normalized to 0..1.
        let w = frame.width() as f32;
        let h = frame.height() as f32;
        let keypoints: Vec<Keypoint> = (0..POSE_KEYPOINTS)
            .map(|i| Keypoint {
                part: POSE_PART_NAMES[i],
                y: raw[i * 3] * h,
                x: raw[i * 3 + 1] * w,
                score: raw[i * 3 + 2],
            })
            .collect();
        let score = keypoints.iter().map(|k| k.score).sum::<f32>() / POSE_KEYPOINTS as f32;

        Ok(vec![Pose { score, keypoints }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interleaved_layout_is_pixel_major() {
        let mut img = ImageBuffer::from_pixel(2, 1, Rgb([10u8, 20, 30]));
        img.put_pixel(1, 0, Rgb([11, 21, 31]));
        let data = interleaved_normalized(&img, |p| p as f32);
        assert_eq!(data, vec![10.0, 20.0, 30.0, 11.0, 21.0, 31.0]);
    }

    #[test]
    fn padded_crop_clips_to_frame() {
        let frame = ImageBuffer::from_pixel(100, 100, Rgb([0u8, 0, 0]));
        let region = FaceRegion {
            x: 90.0,
            y: 90.0,
            width: 20.0,
            height: 20.0,
        };
        let (crop, ox, oy) = padded_crop(&frame, region, 0.25);
        assert!(ox >= 0.0 && oy >= 0.0);
        assert!(ox + crop.width() as f32 <= 100.0);
        assert!(oy + crop.height() as f32 <= 100.0);
    }

    #[test]
    fn padded_crop_offset_tracks_region() {
        let frame = ImageBuffer::from_pixel(100, 100, Rgb([0u8, 0, 0]));
        let region = FaceRegion {
            x: 40.0,
            y: 40.0,
            width: 20.0,
            height: 20.0,
        };
        let (crop, ox, oy) = padded_crop(&frame, region, 0.0);
        assert_eq!((ox, oy), (40.0, 40.0));
        assert_eq!((crop.width(), crop.height()), (20, 20));
    }
}
