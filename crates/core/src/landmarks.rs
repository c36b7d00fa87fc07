//! Pose landmark topology and per-frame landmark sets.
//!
//! Uses the 33-point BlazePose layout. Coordinates are normalized to the
//! frame (`0.0..=1.0`, origin top-left, y grows downward); `z` is relative
//! depth and `visibility` is the detector's confidence when it reports one.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Millis;

/// Number of landmarks in a complete pose.
pub const LANDMARK_COUNT: usize = 33;

/// Visibility below which a landmark is treated as noise.
pub const MIN_VISIBILITY: f64 = 0.5;

// ---------------------------------------------------------------------------
// Landmark
// ---------------------------------------------------------------------------

/// A single tracked anatomical point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f64>,
}

impl Landmark {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            visibility: None,
        }
    }

    pub fn with_visibility(mut self, visibility: f64) -> Self {
        self.visibility = Some(visibility);
        self
    }

    /// Whether the landmark meets `threshold`. A landmark with no reported
    /// visibility counts as visible.
    pub fn is_visible(&self, threshold: f64) -> bool {
        self.visibility.map_or(true, |v| v >= threshold)
    }

    /// Euclidean distance in the image plane (ignores `z`).
    pub fn planar_distance(&self, other: &Landmark) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Point halfway between `self` and `other`.
    pub fn midpoint(&self, other: &Landmark) -> Landmark {
        Landmark::new(
            (self.x + other.x) / 2.0,
            (self.y + other.y) / 2.0,
            (self.z + other.z) / 2.0,
        )
    }
}

// ---------------------------------------------------------------------------
// Topology
// ---------------------------------------------------------------------------

/// Index of each landmark within a [`LandmarkSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoseLandmark {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl PoseLandmark {
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// The landmarks of one side of the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodySide {
    pub shoulder: PoseLandmark,
    pub elbow: PoseLandmark,
    pub wrist: PoseLandmark,
    pub index: PoseLandmark,
    pub hip: PoseLandmark,
    pub knee: PoseLandmark,
    pub ankle: PoseLandmark,
}

impl BodySide {
    pub const LEFT: BodySide = BodySide {
        shoulder: PoseLandmark::LeftShoulder,
        elbow: PoseLandmark::LeftElbow,
        wrist: PoseLandmark::LeftWrist,
        index: PoseLandmark::LeftIndex,
        hip: PoseLandmark::LeftHip,
        knee: PoseLandmark::LeftKnee,
        ankle: PoseLandmark::LeftAnkle,
    };

    pub const RIGHT: BodySide = BodySide {
        shoulder: PoseLandmark::RightShoulder,
        elbow: PoseLandmark::RightElbow,
        wrist: PoseLandmark::RightWrist,
        index: PoseLandmark::RightIndex,
        hip: PoseLandmark::RightHip,
        knee: PoseLandmark::RightKnee,
        ankle: PoseLandmark::RightAnkle,
    };
}

/// Which hand the golfer plays with. Determines the lead side: a
/// right-handed golfer leads with the left arm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handedness {
    #[default]
    Right,
    Left,
}

impl Handedness {
    /// Parse from a configuration value (`"right"` / `"left"`).
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "right" => Ok(Self::Right),
            "left" => Ok(Self::Left),
            other => Err(CoreError::Validation(format!(
                "Unknown handedness '{other}'. Must be one of: right, left"
            ))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Right => "right",
            Self::Left => "left",
        }
    }

    /// The lead (target-side) half of the body.
    pub fn lead(self) -> BodySide {
        match self {
            Self::Right => BodySide::LEFT,
            Self::Left => BodySide::RIGHT,
        }
    }
}

// ---------------------------------------------------------------------------
// LandmarkSet
// ---------------------------------------------------------------------------

/// A complete 33-point pose for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Landmark>", into = "Vec<Landmark>")]
pub struct LandmarkSet(Vec<Landmark>);

impl LandmarkSet {
    /// Build a set, rejecting anything other than exactly [`LANDMARK_COUNT`] points.
    pub fn new(points: Vec<Landmark>) -> Result<Self, CoreError> {
        if points.len() != LANDMARK_COUNT {
            return Err(CoreError::Validation(format!(
                "Expected {LANDMARK_COUNT} landmarks, got {}",
                points.len()
            )));
        }
        if points
            .iter()
            .any(|p| !p.x.is_finite() || !p.y.is_finite() || !p.z.is_finite())
        {
            return Err(CoreError::Validation(
                "Landmark coordinates must be finite".to_string(),
            ));
        }
        Ok(Self(points))
    }

    pub fn get(&self, landmark: PoseLandmark) -> &Landmark {
        &self.0[landmark.index()]
    }

    pub fn points(&self) -> &[Landmark] {
        &self.0
    }

    /// Midpoint of the two hips.
    pub fn hip_midpoint(&self) -> Landmark {
        self.get(PoseLandmark::LeftHip)
            .midpoint(self.get(PoseLandmark::RightHip))
    }

    /// Planar distance between the two shoulders.
    pub fn inter_shoulder_distance(&self) -> f64 {
        self.get(PoseLandmark::LeftShoulder)
            .planar_distance(self.get(PoseLandmark::RightShoulder))
    }
}

impl TryFrom<Vec<Landmark>> for LandmarkSet {
    type Error = CoreError;

    fn try_from(points: Vec<Landmark>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

impl From<LandmarkSet> for Vec<Landmark> {
    fn from(set: LandmarkSet) -> Self {
        set.0
    }
}

/// A landmark set anchored to its position in the source video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseFrame {
    pub t_ms: Millis,
    pub landmarks: LandmarkSet,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(x: f64, y: f64) -> Vec<Landmark> {
        vec![Landmark::new(x, y, 0.0); LANDMARK_COUNT]
    }

    #[test]
    fn set_requires_exactly_33_points() {
        assert!(LandmarkSet::new(uniform(0.5, 0.5)).is_ok());
        assert!(LandmarkSet::new(vec![Landmark::new(0.5, 0.5, 0.0); 17]).is_err());
        assert!(LandmarkSet::new(Vec::new()).is_err());
    }

    #[test]
    fn set_rejects_non_finite_coordinates() {
        let mut points = uniform(0.5, 0.5);
        points[3].y = f64::NAN;
        assert!(LandmarkSet::new(points).is_err());
    }

    #[test]
    fn missing_visibility_counts_as_visible() {
        let lm = Landmark::new(0.1, 0.2, 0.0);
        assert!(lm.is_visible(MIN_VISIBILITY));
        assert!(!lm.with_visibility(0.49).is_visible(MIN_VISIBILITY));
        assert!(lm.with_visibility(0.5).is_visible(MIN_VISIBILITY));
    }

    #[test]
    fn lead_side_follows_handedness() {
        assert_eq!(Handedness::Right.lead().wrist, PoseLandmark::LeftWrist);
        assert_eq!(Handedness::Left.lead().wrist, PoseLandmark::RightWrist);
        assert_eq!(Handedness::from_name("LEFT").unwrap(), Handedness::Left);
        assert!(Handedness::from_name("both").is_err());
    }

    #[test]
    fn hip_midpoint_and_shoulder_distance() {
        let mut points = uniform(0.5, 0.5);
        points[PoseLandmark::LeftHip.index()] = Landmark::new(0.4, 0.6, 0.0);
        points[PoseLandmark::RightHip.index()] = Landmark::new(0.6, 0.6, 0.0);
        points[PoseLandmark::LeftShoulder.index()] = Landmark::new(0.3, 0.3, 0.0);
        points[PoseLandmark::RightShoulder.index()] = Landmark::new(0.6, 0.7, 0.0);
        let set = LandmarkSet::new(points).unwrap();

        let mid = set.hip_midpoint();
        assert!((mid.x - 0.5).abs() < 1e-9);
        assert!((mid.y - 0.6).abs() < 1e-9);
        assert!((set.inter_shoulder_distance() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn set_deserializes_from_plain_array() {
        let json = serde_json::to_value(uniform(0.25, 0.75)).unwrap();
        let set: LandmarkSet = serde_json::from_value(json).unwrap();
        assert_eq!(set.points().len(), LANDMARK_COUNT);

        let short = serde_json::json!([{ "x": 0.1, "y": 0.2 }]);
        assert!(serde_json::from_value::<LandmarkSet>(short).is_err());
    }
}
