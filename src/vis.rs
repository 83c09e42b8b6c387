//! Coordinate and visualization engine.
//!
//! Pure drawing logic over a [`DrawSurface`] abstraction plus the fixed
//! anatomical lookup tables (finger segments, pose-joint adjacency, face
//! triangulation). [`FrameSurface`] is the software implementation that the
//! orchestrator owns: an RGB8 buffer the camera frame is blitted into and
//! the overlay drawn on top.
//!
//! Mirroring convention: the surface applies a horizontal flip so the
//! preview matches a front camera's natural mirror view. Landmark
//! coordinates themselves stay in raw device pixel space; the publish path
//! reads them before any mirroring, so streamed data is never flipped.

use crate::types::{Hand, Landmark, LandmarkSet, Pose};
use nalgebra::Matrix3;

pub type Color = (u8, u8, u8);

/// Finger polylines as indices into the 21-point hand landmark list.
/// Index 0 (the wrist) starts every finger.
pub const FINGER_SEGMENTS: [(&str, [usize; 5]); 5] = [
    ("thumb", [0, 1, 2, 3, 4]),
    ("indexFinger", [0, 5, 6, 7, 8]),
    ("middleFinger", [0, 9, 10, 11, 12]),
    ("ringFinger", [0, 13, 14, 15, 16]),
    ("pinky", [0, 17, 18, 19, 20]),
];

/// COCO-order pose keypoint names.
pub const POSE_PART_NAMES: [&str; 17] = [
    "nose",
    "leftEye",
    "rightEye",
    "leftEar",
    "rightEar",
    "leftShoulder",
    "rightShoulder",
    "leftElbow",
    "rightElbow",
    "leftWrist",
    "rightWrist",
    "leftHip",
    "rightHip",
    "leftKnee",
    "rightKnee",
    "leftAnkle",
    "rightAnkle",
];

/// Anatomically adjacent pose-joint pairs, as indices into
/// [`POSE_PART_NAMES`]. Fixed lookup data, not computed.
pub const POSE_ADJACENCY: [(usize, usize); 12] = [
    (5, 6),   // shoulders
    (5, 7),   // left upper arm
    (7, 9),   // left forearm
    (6, 8),   // right upper arm
    (8, 10),  // right forearm
    (5, 11),  // left flank
    (6, 12),  // right flank
    (11, 12), // hips
    (11, 13), // left thigh
    (13, 15), // left shin
    (12, 14), // right thigh
    (14, 16), // right shin
];

/// Reduced face-mesh tessellation: triples of indices into the 468-point
/// mesh, covering the contour region. Each triple is drawn as one closed
/// polyline by [`draw_mesh`].
pub const FACE_TRIANGULATION: [usize; 192] = [
    127, 34, 139, 11, 0, 37, 232, 231, 120, 72, 37, 39, 128, 121, 47, 232, 121, 128, 104, 69, 67,
    175, 171, 148, 157, 154, 155, 118, 50, 101, 73, 39, 40, 9, 151, 108, 48, 115, 131, 194, 204,
    211, 74, 40, 185, 80, 42, 183, 40, 92, 186, 230, 229, 118, 202, 212, 214, 83, 18, 17, 76, 61,
    146, 160, 29, 30, 56, 157, 173, 106, 204, 194, 135, 214, 192, 203, 165, 98, 21, 71, 68, 51,
    45, 4, 144, 24, 23, 77, 146, 91, 205, 50, 187, 201, 200, 18, 91, 106, 182, 90, 91, 181, 85,
    84, 17, 206, 203, 36, 148, 171, 140, 92, 40, 39, 193, 189, 244, 159, 158, 28, 247, 246, 161,
    236, 3, 196, 54, 68, 104, 193, 168, 8, 117, 228, 31, 189, 193, 55, 98, 97, 99, 126, 47, 100,
    166, 79, 218, 155, 154, 26, 209, 49, 131, 135, 136, 150, 47, 126, 217, 223, 52, 53, 45, 51,
    134, 211, 170, 140, 67, 69, 108, 43, 106, 91, 230, 119, 120, 226, 130, 247, 63, 53, 52, 238,
    20, 242, 46, 70, 156, 78, 62, 96,
];

/// Primitive draw calls a rendering target must support.
pub trait DrawSurface {
    fn dimensions(&self) -> (u32, u32);
    fn draw_point(&mut self, x: f32, y: f32, radius: f32, color: Color);
    fn draw_segment(&mut self, ax: f32, ay: f32, bx: f32, by: f32, width: f32, color: Color);
    fn draw_arrow(&mut self, ax: f32, ay: f32, bx: f32, by: f32, width: f32, color: Color);
    fn draw_path(&mut self, points: &[(f32, f32)], close: bool, color: Color);
    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color);
    fn draw_text(&mut self, x: f32, y: f32, text: &str, scale: usize, color: Color);
}

/// Draw every landmark at or above `min_confidence` as a dot at
/// `(x * scale, y * scale)`.
pub fn draw_keypoints(
    surface: &mut dyn DrawSurface,
    landmarks: &[Landmark],
    min_confidence: f32,
    scale: f32,
    color: Color,
) {
    for lm in landmarks {
        if lm.score < min_confidence {
            continue;
        }
        surface.draw_point(lm.x * scale, lm.y * scale, 3.0, color);
    }
}

/// Connect anatomically adjacent pose joints. A segment is drawn only when
/// both endpoints meet `min_confidence`.
pub fn draw_skeleton(
    surface: &mut dyn DrawSurface,
    landmarks: &[Landmark],
    min_confidence: f32,
    scale: f32,
    color: Color,
) {
    for &(a, b) in POSE_ADJACENCY.iter() {
        let (Some(pa), Some(pb)) = (landmarks.get(a), landmarks.get(b)) else {
            continue;
        };
        if pa.score < min_confidence || pb.score < min_confidence {
            continue;
        }
        surface.draw_segment(
            pa.x * scale,
            pa.y * scale,
            pb.x * scale,
            pb.y * scale,
            2.0,
            color,
        );
    }
}

/// Keypoints plus skeleton, gated on the aggregate pose score.
pub fn draw_pose(
    surface: &mut dyn DrawSurface,
    pose: &Pose,
    min_pose_confidence: f32,
    min_part_confidence: f32,
    scale: f32,
    color: Color,
) {
    if pose.score < min_pose_confidence {
        return;
    }
    let landmarks: Vec<Landmark> = pose
        .keypoints
        .iter()
        .map(|kp| Landmark::with_score(kp.x, kp.y, kp.score))
        .collect();
    draw_keypoints(surface, &landmarks, min_part_confidence, scale, color);
    draw_skeleton(surface, &landmarks, min_part_confidence, scale, color);
}

/// One open polyline per finger (fixed lookup order) plus a dot per
/// landmark.
pub fn draw_hand(
    surface: &mut dyn DrawSurface,
    hand: &Hand,
    scale: f32,
    color: Color,
    point_radius: f32,
) {
    for (_, indices) in FINGER_SEGMENTS.iter() {
        let points: Vec<(f32, f32)> = indices
            .iter()
            .filter_map(|&i| hand.landmarks.get(i))
            .map(|lm| (lm.x * scale, lm.y * scale))
            .collect();
        if points.len() == indices.len() {
            surface.draw_path(&points, false, color);
        }
    }
    for lm in &hand.landmarks {
        surface.draw_point(lm.x * scale, lm.y * scale, point_radius, color);
    }
}

/// Group 21 raw hand landmarks into the five finger parts, in fixed lookup
/// order. Fingers whose indices fall outside the landmark list are skipped.
pub fn finger_landmark_set(hand: &Hand) -> LandmarkSet {
    let mut set = LandmarkSet::new();
    for (name, indices) in FINGER_SEGMENTS.iter() {
        let points: Vec<Landmark> = indices
            .iter()
            .filter_map(|&i| hand.landmarks.get(i).copied())
            .collect();
        if points.len() == indices.len() {
            set.push_part(name, points);
        }
    }
    set
}

/// Every mesh point as a 2x2 filled rect.
pub fn draw_face(surface: &mut dyn DrawSurface, mesh: &[Landmark], color: Color) {
    for lm in mesh {
        surface.fill_rect(lm.x.round(), lm.y.round(), 2.0, 2.0, color);
    }
}

/// Closed triangle polylines from the fixed triangulation table. Triples
/// referencing points beyond the mesh are skipped.
pub fn draw_mesh(surface: &mut dyn DrawSurface, mesh: &[Landmark], color: Color) {
    for tri in FACE_TRIANGULATION.chunks(3) {
        let points: Vec<(f32, f32)> = tri
            .iter()
            .filter_map(|&i| mesh.get(i))
            .map(|lm| (lm.x, lm.y))
            .collect();
        if points.len() == 3 {
            surface.draw_path(&points, true, color);
        }
    }
}

/// Head-orientation axes as three arrows from the origin: rotation-matrix
/// row 0 in red, row 1 in green, row 2 in blue.
pub fn draw_axis(
    surface: &mut dyn DrawSurface,
    origin: (f32, f32),
    rotation: &Matrix3<f32>,
    axis_len: f32,
) {
    let colors: [Color; 3] = [(255, 0, 0), (0, 255, 0), (0, 0, 255)];
    // Rows 0 and 2 point away from the camera, row 1 toward the chin.
    let signs = [-1.0, 1.0, -1.0];
    for (row, (&sign, &color)) in signs.iter().zip(colors.iter()).enumerate() {
        let ex = origin.0 + sign * rotation[(row, 0)] * axis_len;
        let ey = origin.1 + sign * rotation[(row, 1)] * axis_len;
        surface.draw_arrow(origin.0, origin.1, ex, ey, 3.0, color);
    }
}

/// Parse a `#RRGGBB` hex string, falling back to red.
pub fn parse_hex(hex: &str) -> Color {
    if hex.len() == 7 && hex.starts_with('#') {
        let r = u8::from_str_radix(&hex[1..3], 16).unwrap_or(255);
        let g = u8::from_str_radix(&hex[3..5], 16).unwrap_or(0);
        let b = u8::from_str_radix(&hex[5..7], 16).unwrap_or(0);
        (r, g, b)
    } else {
        (255, 0, 0)
    }
}

/// Software canvas over a packed RGB8 buffer.
///
/// When `mirror` is set every primitive's x coordinates are flipped, and
/// [`FrameSurface::blit_frame`] flips the camera image; together these give
/// the `scale(-1, 1)` mirror view without touching landmark data.
pub struct FrameSurface {
    buffer: Vec<u8>,
    width: usize,
    height: usize,
    mirror: bool,
}

impl FrameSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buffer: vec![0; width as usize * height as usize * 3],
            width: width as usize,
            height: height as usize,
            mirror: false,
        }
    }

    pub fn set_mirror(&mut self, mirror: bool) {
        self.mirror = mirror;
    }

    pub fn mirrored(&self) -> bool {
        self.mirror
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width as usize;
        self.height = height as usize;
        self.buffer.clear();
        self.buffer.resize(self.width * self.height * 3, 0);
    }

    /// Copy a camera frame into the buffer, clearing any prior overlay.
    /// Applies the horizontal flip when mirroring is on.
    pub fn blit_frame(&mut self, frame: &crate::types::Frame) {
        let fw = frame.width() as usize;
        let fh = frame.height() as usize;
        let w = self.width.min(fw);
        let h = self.height.min(fh);
        self.buffer.fill(0);
        for y in 0..h {
            for x in 0..w {
                let sx = if self.mirror { w - 1 - x } else { x } as u32;
                let px = frame.pixels.get_pixel(sx, y as u32);
                let idx = (y * self.width + x) * 3;
                self.buffer[idx] = px[0];
                self.buffer[idx + 1] = px[1];
                self.buffer[idx + 2] = px[2];
            }
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.buffer
    }

    pub fn width(&self) -> u32 {
        self.width as u32
    }

    pub fn height(&self) -> u32 {
        self.height as u32
    }

    fn map_x(&self, x: f32) -> f32 {
        if self.mirror {
            self.width as f32 - 1.0 - x
        } else {
            x
        }
    }

    fn put_pixel(&mut self, x: i32, y: i32, color: Color) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let idx = (y as usize * self.width + x as usize) * 3;
        self.buffer[idx] = color.0;
        self.buffer[idx + 1] = color.1;
        self.buffer[idx + 2] = color.2;
    }

    fn raw_segment(&mut self, ax: f32, ay: f32, bx: f32, by: f32, width: f32, color: Color) {
        let steps = ((bx - ax).abs().max((by - ay).abs()).ceil() as usize).max(1);
        let half = (width / 2.0).ceil() as i32;
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let px = ax + (bx - ax) * t;
            let py = ay + (by - ay) * t;
            for dy in -half..=half {
                for dx in -half..=half {
                    self.put_pixel(px as i32 + dx, py as i32 + dy, color);
                }
            }
        }
    }
}

impl DrawSurface for FrameSurface {
    fn dimensions(&self) -> (u32, u32) {
        (self.width as u32, self.height as u32)
    }

    fn draw_point(&mut self, x: f32, y: f32, radius: f32, color: Color) {
        let cx = self.map_x(x);
        let r = radius.ceil() as i32;
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy <= r * r {
                    self.put_pixel(cx as i32 + dx, y as i32 + dy, color);
                }
            }
        }
    }

    fn draw_segment(&mut self, ax: f32, ay: f32, bx: f32, by: f32, width: f32, color: Color) {
        let (ax, bx) = (self.map_x(ax), self.map_x(bx));
        self.raw_segment(ax, ay, bx, by, width, color);
    }

    fn draw_arrow(&mut self, ax: f32, ay: f32, bx: f32, by: f32, width: f32, color: Color) {
        let (ax, bx) = (self.map_x(ax), self.map_x(bx));
        self.raw_segment(ax, ay, bx, by, width, color);

        let head_len = 10.0;
        let angle = (by - ay).atan2(bx - ax);
        for offset in [-std::f32::consts::FRAC_PI_6, std::f32::consts::FRAC_PI_6] {
            let hx = bx - head_len * (angle + offset).cos();
            let hy = by - head_len * (angle + offset).sin();
            self.raw_segment(bx, by, hx, hy, width, color);
        }
    }

    fn draw_path(&mut self, points: &[(f32, f32)], close: bool, color: Color) {
        if points.len() < 2 {
            return;
        }
        for pair in points.windows(2) {
            self.draw_segment(pair[0].0, pair[0].1, pair[1].0, pair[1].1, 2.0, color);
        }
        if close {
            let first = points[0];
            let last = points[points.len() - 1];
            self.draw_segment(last.0, last.1, first.0, first.1, 2.0, color);
        }
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color) {
        let x = self.map_x(x);
        for dy in 0..h.ceil() as i32 {
            for dx in 0..w.ceil() as i32 {
                self.put_pixel(x as i32 + dx, y as i32 + dy, color);
            }
        }
    }

    fn draw_text(&mut self, x: f32, y: f32, text: &str, scale: usize, color: Color) {
        let mut cx = self.map_x(x) as usize;
        if self.mirror {
            // Text stays readable: anchor at the mirrored x, glyphs unflipped.
            cx = cx.saturating_sub(text.len() * 4 * scale);
        }
        let y = y as usize;
        for c in text.chars() {
            draw_char(
                &mut self.buffer,
                self.width,
                self.height,
                cx,
                y,
                c,
                color,
                scale,
            );
            cx += 4 * scale;
        }
    }
}

// 3x5 bitmap glyphs, 3 bits per row. Enough for HUD labels and digits.
fn glyph_rows(c: char) -> [u8; 5] {
    match c.to_ascii_uppercase() {
        '0' => [0x7, 0x5, 0x5, 0x5, 0x7],
        '1' => [0x2, 0x6, 0x2, 0x2, 0x7],
        '2' => [0x7, 0x1, 0x7, 0x4, 0x7],
        '3' => [0x7, 0x1, 0x7, 0x1, 0x7],
        '4' => [0x5, 0x5, 0x7, 0x1, 0x1],
        '5' => [0x7, 0x4, 0x7, 0x1, 0x7],
        '6' => [0x7, 0x4, 0x7, 0x5, 0x7],
        '7' => [0x7, 0x1, 0x2, 0x4, 0x4],
        '8' => [0x7, 0x5, 0x7, 0x5, 0x7],
        '9' => [0x7, 0x5, 0x7, 0x1, 0x7],
        ' ' => [0x0, 0x0, 0x0, 0x0, 0x0],
        ':' => [0x0, 0x2, 0x0, 0x2, 0x0],
        '.' => [0x0, 0x0, 0x0, 0x0, 0x2],
        '-' => [0x0, 0x0, 0x7, 0x0, 0x0],
        ',' => [0x0, 0x0, 0x0, 0x2, 0x4],
        'A' => [0x2, 0x5, 0x7, 0x5, 0x5],
        'C' => [0x7, 0x4, 0x4, 0x4, 0x7],
        'D' => [0x6, 0x5, 0x5, 0x5, 0x6],
        'E' => [0x7, 0x4, 0x6, 0x4, 0x7],
        'F' => [0x7, 0x4, 0x6, 0x4, 0x4],
        'H' => [0x5, 0x5, 0x7, 0x5, 0x5],
        'I' => [0x7, 0x2, 0x2, 0x2, 0x7],
        'L' => [0x4, 0x4, 0x4, 0x4, 0x7],
        'M' => [0x5, 0x7, 0x5, 0x5, 0x5],
        'N' => [0x6, 0x5, 0x5, 0x5, 0x5],
        'O' => [0x7, 0x5, 0x5, 0x5, 0x7],
        'P' => [0x7, 0x5, 0x7, 0x4, 0x4],
        'R' => [0x6, 0x5, 0x6, 0x5, 0x5],
        'S' => [0x3, 0x4, 0x2, 0x1, 0x6],
        'T' => [0x7, 0x2, 0x2, 0x2, 0x2],
        'U' => [0x5, 0x5, 0x5, 0x5, 0x7],
        'W' => [0x5, 0x5, 0x5, 0x7, 0x5],
        'Y' => [0x5, 0x5, 0x2, 0x2, 0x2],
        _ => [0x7, 0x7, 0x7, 0x7, 0x7],
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_char(
    buffer: &mut [u8],
    width: usize,
    height: usize,
    x: usize,
    y: usize,
    c: char,
    color: Color,
    scale: usize,
) {
    let rows = glyph_rows(c);
    for (row, bits) in rows.iter().enumerate() {
        for col in 0..3 {
            if (bits >> (2 - col)) & 1 == 1 {
                for dy in 0..scale {
                    for dx in 0..scale {
                        let px = x + col * scale + dx;
                        let py = y + row * scale + dy;
                        if px < width && py < height {
                            let idx = (py * width + px) * 3;
                            if idx + 2 < buffer.len() {
                                buffer[idx] = color.0;
                                buffer[idx + 1] = color.1;
                                buffer[idx + 2] = color.2;
                            }
                        }
                    }
                }
            }
        }
    }
}
