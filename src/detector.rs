//! UltraFace-style face region detector.
//!
//! Feeds the face-mesh model: the mesh runs on a padded crop of the best
//! detection instead of the full frame.

use image::{imageops::FilterType, ImageBuffer, Rgb};
use ort::session::{builder::GraphOptimizationLevel, Session};

use crate::error::InferenceError;

const INPUT_W: u32 = 320;
const INPUT_H: u32 = 240;
const SCORE_THRESHOLD: f32 = 0.7;
const CENTER_VARIANCE: f32 = 0.1;
const SIZE_VARIANCE: f32 = 0.2;

/// Axis-aligned face region in frame pixel coordinates.
#[derive(Debug, Clone, Copy)]
pub struct FaceRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

pub struct FaceDetector {
    session: Session,
    anchors: Vec<(f32, f32, f32, f32)>, // cx, cy, w, h (normalized)
}

impl FaceDetector {
    pub fn new(model_path: &str) -> Result<Self, InferenceError> {
        let session = build_session(model_path).map_err(|e| InferenceError::ModelLoad {
            name: "face_detector",
            reason: e.to_string(),
        })?;
        Ok(Self {
            session,
            anchors: generate_anchors(INPUT_W as usize, INPUT_H as usize),
        })
    }

    /// Best face in the frame, or `None` when nothing clears the score
    /// threshold.
    pub fn detect(
        &mut self,
        frame: &ImageBuffer<Rgb<u8>, Vec<u8>>,
    ) -> Result<Option<FaceRegion>, InferenceError> {
        let resized = image::imageops::resize(frame, INPUT_W, INPUT_H, FilterType::Triangle);
        let input = planar_normalized(&resized, |p| (p as f32 - 127.0) / 128.0);

        let best = self
            .run(input)
            .map_err(|e| InferenceError::InferenceFailure {
                name: "face_detector",
                reason: e.to_string(),
            })?;

        Ok(best.map(|r| {
            let sx = frame.width() as f32 / INPUT_W as f32;
            let sy = frame.height() as f32 / INPUT_H as f32;
            FaceRegion {
                x: r.x * sx,
                y: r.y * sy,
                width: r.width * sx,
                height: r.height * sy,
            }
        }))
    }

    fn run(&mut self, input: Vec<f32>) -> ort::Result<Option<FaceRegion>> {
        let tensor = ort::value::Tensor::from_array((vec![1, 3, 240, 320], input))?;
        let outputs = self.session.run(ort::inputs![tensor])?;
        let (_, scores) = outputs["scores"].try_extract_tensor::<f32>()?;
        let (_, boxes) = outputs["boxes"].try_extract_tensor::<f32>()?;
        Ok(decode_best_box(&self.anchors, scores, boxes, SCORE_THRESHOLD))
    }
}

fn build_session(path: &str) -> ort::Result<Session> {
    Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(4)?
        .commit_from_file(path)
}

/// HWC image to planar NCHW floats with a per-pixel normalizer.
pub(crate) fn planar_normalized(
    image: &ImageBuffer<Rgb<u8>, Vec<u8>>,
    normalize: impl Fn(u8) -> f32,
) -> Vec<f32> {
    let (w, h) = (image.width(), image.height());
    let mut data = Vec::with_capacity((3 * w * h) as usize);
    for channel in 0..3 {
        for y in 0..h {
            for x in 0..w {
                data.push(normalize(image.get_pixel(x, y)[channel]));
            }
        }
    }
    data
}

fn decode_best_box(
    anchors: &[(f32, f32, f32, f32)],
    scores: &[f32],
    boxes: &[f32],
    threshold: f32,
) -> Option<FaceRegion> {
    let mut best_score = threshold;
    let mut best = None;

    for (i, &(ax, ay, aw, ah)) in anchors.iter().enumerate() {
        let score = scores[i * 2 + 1];
        if score <= best_score {
            continue;
        }
        let cx = boxes[i * 4] * CENTER_VARIANCE * aw + ax;
        let cy = boxes[i * 4 + 1] * CENTER_VARIANCE * ah + ay;
        let w = (boxes[i * 4 + 2] * SIZE_VARIANCE).exp() * aw;
        let h = (boxes[i * 4 + 3] * SIZE_VARIANCE).exp() * ah;

        best_score = score;
        best = Some(FaceRegion {
            x: (cx - w / 2.0) * INPUT_W as f32,
            y: (cy - h / 2.0) * INPUT_H as f32,
            width: w * INPUT_W as f32,
            height: h * INPUT_H as f32,
        });
    }
    best
}

fn generate_anchors(width: usize, height: usize) -> Vec<(f32, f32, f32, f32)> {
    let shrinkages = [8usize, 16, 32, 64];
    let min_boxes: [&[f32]; 4] = [
        &[10.0, 16.0, 24.0],
        &[32.0, 48.0],
        &[64.0, 96.0],
        &[128.0, 192.0, 256.0],
    ];

    let w = width as f32;
    let h = height as f32;
    let mut anchors = Vec::new();
    for (i, &shrink) in shrinkages.iter().enumerate() {
        let feature_w = (w / shrink as f32).ceil() as usize;
        let feature_h = (h / shrink as f32).ceil() as usize;
        for v in 0..feature_h {
            for u in 0..feature_w {
                let cx = (u as f32 * shrink as f32 + shrink as f32 / 2.0) / w;
                let cy = (v as f32 * shrink as f32 + shrink as f32 / 2.0) / h;
                for &min_box in min_boxes[i] {
                    anchors.push((cx, cy, min_box / w, min_box / h));
                }
            }
        }
    }
    anchors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_count_matches_ultraface_grid() {
        // 40x30 + 20x15 + 10x8 + 5x4 cells with 3/2/2/3 boxes each.
        let anchors = generate_anchors(320, 240);
        let expected = 40 * 30 * 3 + 20 * 15 * 2 + 10 * 8 * 2 + 5 * 4 * 3;
        assert_eq!(anchors.len(), expected);
    }

    #[test]
    fn decode_picks_highest_scoring_box() {
        let anchors = vec![(0.5, 0.5, 0.1, 0.1), (0.25, 0.25, 0.1, 0.1)];
        let scores = vec![0.1, 0.8, 0.1, 0.95];
        let boxes = vec![0.0; 8];
        let region = decode_best_box(&anchors, &scores, &boxes, 0.7).unwrap();
        // Second anchor wins; box offsets are zero so center is the anchor.
        assert!((region.x + region.width / 2.0 - 0.25 * 320.0).abs() < 1e-3);
    }

    #[test]
    fn decode_returns_none_below_threshold() {
        let anchors = vec![(0.5, 0.5, 0.1, 0.1)];
        let scores = vec![0.9, 0.2];
        let boxes = vec![0.0; 4];
        assert!(decode_best_box(&anchors, &scores, &boxes, 0.7).is_none());
    }

    #[test]
    fn planar_layout_is_channel_major() {
        let mut img = ImageBuffer::from_pixel(2, 1, Rgb([10u8, 20, 30]));
        img.put_pixel(1, 0, Rgb([11, 21, 31]));
        let data = planar_normalized(&img, |p| p as f32);
        assert_eq!(data, vec![10.0, 11.0, 20.0, 21.0, 30.0, 31.0]);
    }
}
