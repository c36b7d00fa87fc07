//! Skeleton overlays drawn onto a copy of a keyframe.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use fairway_core::landmarks::{Landmark, LandmarkSet, PoseLandmark, MIN_VISIBILITY};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};

use PoseLandmark::*;

/// Bone segments drawn on the overlay.
pub const BONES: [(PoseLandmark, PoseLandmark); 26] = [
    // face
    (LeftEar, LeftEye),
    (LeftEye, Nose),
    (Nose, RightEye),
    (RightEye, RightEar),
    // torso
    (LeftShoulder, RightShoulder),
    (LeftShoulder, LeftHip),
    (RightShoulder, RightHip),
    (LeftHip, RightHip),
    // left arm
    (LeftShoulder, LeftElbow),
    (LeftElbow, LeftWrist),
    (LeftWrist, LeftPinky),
    (LeftWrist, LeftIndex),
    (LeftWrist, LeftThumb),
    // right arm
    (RightShoulder, RightElbow),
    (RightElbow, RightWrist),
    (RightWrist, RightPinky),
    (RightWrist, RightIndex),
    (RightWrist, RightThumb),
    // left leg
    (LeftHip, LeftKnee),
    (LeftKnee, LeftAnkle),
    (LeftAnkle, LeftHeel),
    (LeftHeel, LeftFootIndex),
    // right leg
    (RightHip, RightKnee),
    (RightKnee, RightAnkle),
    (RightAnkle, RightHeel),
    (RightHeel, RightFootIndex),
];

const BONE_COLOR: Rgb<u8> = Rgb([0, 230, 118]);
const JOINT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const JPEG_QUALITY: u8 = 90;

#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Overlay task failed: {0}")]
    Task(String),
}

/// What was drawn, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverlayStats {
    pub bones: usize,
    pub joints: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OverlayRenderer;

impl OverlayRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Decode `source`, draw `landmarks` and write a new JPEG to `output`.
    /// `source` is only read.
    pub async fn render(
        &self,
        source: &Path,
        output: &Path,
        landmarks: &LandmarkSet,
    ) -> Result<OverlayStats, OverlayError> {
        let source: PathBuf = source.to_path_buf();
        let output: PathBuf = output.to_path_buf();
        let landmarks = landmarks.clone();

        tokio::task::spawn_blocking(move || {
            let mut canvas = image::open(&source)?.to_rgb8();
            let stats = draw_skeleton(&mut canvas, &landmarks);
            let writer = BufWriter::new(File::create(&output)?);
            canvas.write_with_encoder(JpegEncoder::new_with_quality(writer, JPEG_QUALITY))?;
            Ok::<_, OverlayError>(stats)
        })
        .await
        .map_err(|e| OverlayError::Task(e.to_string()))?
    }
}

/// Draw every bone whose endpoints are both visible, then every visible
/// joint. Landmarks below [`MIN_VISIBILITY`] are skipped entirely.
pub fn draw_skeleton(canvas: &mut RgbImage, landmarks: &LandmarkSet) -> OverlayStats {
    let (w, h) = canvas.dimensions();
    let thickness = (w.min(h) / 300).max(1) as i64;
    let to_px = |lm: &Landmark| {
        (
            (lm.x * w as f64).round() as i64,
            (lm.y * h as f64).round() as i64,
        )
    };
    let visible = |lm: &Landmark| lm.is_visible(MIN_VISIBILITY);

    let mut stats = OverlayStats::default();
    let mut joints = [false; fairway_core::landmarks::LANDMARK_COUNT];

    for (from, to) in BONES {
        let (a, b) = (landmarks.get(from), landmarks.get(to));
        if !visible(a) || !visible(b) {
            continue;
        }
        draw_line(canvas, to_px(a), to_px(b), thickness, BONE_COLOR);
        joints[from.index()] = true;
        joints[to.index()] = true;
        stats.bones += 1;
    }

    for (i, drawn) in joints.iter().enumerate() {
        if *drawn {
            fill_disc(canvas, to_px(&landmarks.points()[i]), thickness + 2, JOINT_COLOR);
            stats.joints += 1;
        }
    }

    stats
}

fn draw_line(canvas: &mut RgbImage, from: (i64, i64), to: (i64, i64), radius: i64, color: Rgb<u8>) {
    let steps = (to.0 - from.0).abs().max((to.1 - from.1).abs()).max(1);
    for s in 0..=steps {
        let x = from.0 + (to.0 - from.0) * s / steps;
        let y = from.1 + (to.1 - from.1) * s / steps;
        fill_disc(canvas, (x, y), radius, color);
    }
}

fn fill_disc(canvas: &mut RgbImage, center: (i64, i64), radius: i64, color: Rgb<u8>) {
    let (w, h) = (canvas.width() as i64, canvas.height() as i64);
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy > radius * radius {
                continue;
            }
            let (x, y) = (center.0 + dx, center.1 + dy);
            if (0..w).contains(&x) && (0..h).contains(&y) {
                canvas.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
