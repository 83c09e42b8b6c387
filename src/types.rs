//! Core data model shared by capture, inference, rendering and streaming.

use std::time::Instant;

use image::{ImageBuffer, Rgb};

/// A single estimated coordinate of a tracked anatomical point.
///
/// 2-D screen space for pose keypoints, 3-D model space for face mesh and
/// hand landmarks. Immutable once produced by inference.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub score: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            x,
            y,
            z,
            score: 1.0,
        }
    }

    pub fn with_score(x: f32, y: f32, score: f32) -> Self {
        Self { x, y, z: 0.0, score }
    }
}

/// One named group of landmarks inside a [`LandmarkSet`].
#[derive(Debug, Clone)]
pub struct Part {
    pub name: &'static str,
    pub points: Vec<Landmark>,
}

/// Named, ordered collection of landmarks grouped by anatomical part.
///
/// Insertion order defines rendering and publish order and is preserved
/// end-to-end: downstream consumers rely on positional indices to
/// reconstruct topology (index 0 of every finger part is the wrist-adjacent
/// point).
#[derive(Debug, Clone, Default)]
pub struct LandmarkSet {
    parts: Vec<Part>,
}

impl LandmarkSet {
    pub fn new() -> Self {
        Self { parts: Vec::new() }
    }

    pub fn push_part(&mut self, name: &'static str, points: Vec<Landmark>) {
        self.parts.push(Part { name, points });
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn part(&self, name: &str) -> Option<&Part> {
        self.parts.iter().find(|p| p.name == name)
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// A timestamped raw pixel buffer with its dimensions.
///
/// Owned by the capture manager for its lifetime; inference and rendering
/// borrow it and never mutate it.
#[derive(Debug, Clone)]
pub struct Frame {
    pub pixels: ImageBuffer<Rgb<u8>, Vec<u8>>,
    pub captured_at: Instant,
}

impl Frame {
    pub fn new(pixels: ImageBuffer<Rgb<u8>, Vec<u8>>) -> Self {
        Self {
            pixels,
            captured_at: Instant::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// One detected hand: overall confidence plus 21 raw landmarks in the
/// canonical wrist-first ordering.
#[derive(Debug, Clone)]
pub struct Hand {
    pub score: f32,
    pub landmarks: Vec<Landmark>,
}

/// One detected face: 468 mesh landmarks in device pixel space (z is model
/// depth).
#[derive(Debug, Clone)]
pub struct FaceMesh {
    pub mesh: Vec<Landmark>,
}

/// One named body keypoint.
#[derive(Debug, Clone, Copy)]
pub struct Keypoint {
    pub part: &'static str,
    pub x: f32,
    pub y: f32,
    pub score: f32,
}

/// Full-body joint estimate: aggregate confidence plus 17 COCO keypoints.
/// Valid only when `score` meets the configured confidence threshold.
#[derive(Debug, Clone)]
pub struct Pose {
    pub score: f32,
    pub keypoints: Vec<Keypoint>,
}

impl Pose {
    /// The keypoints as an ordered LandmarkSet, one part per joint.
    pub fn landmark_set(&self) -> LandmarkSet {
        let mut set = LandmarkSet::new();
        for kp in &self.keypoints {
            set.push_part(kp.part, vec![Landmark::with_score(kp.x, kp.y, kp.score)]);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landmark_set_preserves_insertion_order() {
        let mut set = LandmarkSet::new();
        set.push_part("thumb", vec![Landmark::new(0.0, 0.0, 0.0)]);
        set.push_part("indexFinger", vec![Landmark::new(1.0, 1.0, 0.0)]);
        set.push_part("pinky", vec![Landmark::new(2.0, 2.0, 0.0)]);

        let names: Vec<&str> = set.parts().iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["thumb", "indexFinger", "pinky"]);
    }

    #[test]
    fn part_lookup_by_name() {
        let mut set = LandmarkSet::new();
        set.push_part("mesh", vec![Landmark::new(3.0, 4.0, 5.0)]);
        let part = set.part("mesh").unwrap();
        assert_eq!(part.points[0].x, 3.0);
        assert!(set.part("thumb").is_none());
    }
}
