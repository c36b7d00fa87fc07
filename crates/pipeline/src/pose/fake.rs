//! Deterministic stand-in detector.
//!
//! Produces a synthetic right-handed swing as a function of the keyframe's
//! position in a reference clip, so the full pipeline can run without a
//! model. Individual timestamps can be scripted to report no pose.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use fairway_core::error::CoreError;
use fairway_core::landmarks::{Landmark, LandmarkSet, PoseLandmark, LANDMARK_COUNT};
use fairway_core::types::Millis;

use super::{PoseEngine, PoseError};
use crate::sampler::Keyframe;

/// Clip length the synthetic swing is laid out over.
pub const REFERENCE_DURATION_MS: Millis = 3000;

/// Call counters, shareable with the test that built the engine.
#[derive(Debug, Default)]
pub struct FakeEngineStats {
    pub initialize_calls: AtomicUsize,
    pub loads: AtomicUsize,
    pub detect_calls: AtomicUsize,
    pub dispose_calls: AtomicUsize,
}

impl FakeEngineStats {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

pub struct FakePoseEngine {
    failures: HashSet<Millis>,
    fail_initialize: bool,
    initialized: bool,
    stats: Arc<FakeEngineStats>,
}

impl FakePoseEngine {
    pub fn new() -> Self {
        Self {
            failures: HashSet::new(),
            fail_initialize: false,
            initialized: false,
            stats: Arc::new(FakeEngineStats::default()),
        }
    }

    /// Report no pose for these timestamps.
    pub fn failing_at(mut self, timestamps: impl IntoIterator<Item = Millis>) -> Self {
        self.failures.extend(timestamps);
        self
    }

    pub fn failing_initialize(mut self) -> Self {
        self.fail_initialize = true;
        self
    }

    pub fn stats(&self) -> Arc<FakeEngineStats> {
        self.stats.clone()
    }
}

impl Default for FakePoseEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PoseEngine for FakePoseEngine {
    fn name(&self) -> &str {
        "fake"
    }

    async fn initialize(&mut self) -> Result<(), PoseError> {
        self.stats.initialize_calls.fetch_add(1, Ordering::SeqCst);
        if self.initialized {
            return Ok(());
        }
        if self.fail_initialize {
            return Err(PoseError::Initialization("fake engine configured to fail".into()));
        }
        self.stats.loads.fetch_add(1, Ordering::SeqCst);
        self.initialized = true;
        Ok(())
    }

    async fn detect(&self, frame: &Keyframe) -> Result<LandmarkSet, PoseError> {
        self.stats.detect_calls.fetch_add(1, Ordering::SeqCst);
        if !self.initialized {
            return Err(PoseError::NotInitialized);
        }
        if self.failures.contains(&frame.t_ms) {
            return Err(PoseError::PoseNotDetected { t_ms: frame.t_ms });
        }
        let progress = frame.t_ms as f64 / REFERENCE_DURATION_MS as f64;
        synthetic_pose(progress).map_err(|e| PoseError::InvalidOutput(e.to_string()))
    }

    async fn dispose(&mut self) {
        self.stats.dispose_calls.fetch_add(1, Ordering::SeqCst);
        self.initialized = false;
    }
}

// ---------------------------------------------------------------------------
// Synthetic swing
// ---------------------------------------------------------------------------

/// Hand height at `progress` (0..1 through the clip): rises from address to
/// the top at 45%, drops to impact at 72%, then rises into the finish.
pub fn hand_height(progress: f64) -> f64 {
    let u = progress.clamp(0.0, 1.0);
    if u <= 0.45 {
        0.6 - u
    } else if u <= 0.72 {
        0.15 + 0.7 * (u - 0.45) / 0.27
    } else {
        0.85 - 0.55 * (u - 0.72) / 0.28
    }
}

/// A full 33-point standing pose with the hands at [`hand_height`] and a
/// modest shoulder and hip turn toward the top.
pub fn synthetic_pose(progress: f64) -> Result<LandmarkSet, CoreError> {
    let hands_y = hand_height(progress);
    // 0 at address and impact, 1 at the top.
    let coil = ((0.6 - hands_y) / 0.45).clamp(0.0, 1.0);
    let shoulder_half = 0.08 - 0.04 * coil;
    let hip_shift = 0.03 * coil;
    let hands_x = 0.5 - 0.12 * coil;

    let mut p = vec![Landmark::new(0.5, 0.5, 0.0).with_visibility(0.9); LANDMARK_COUNT];
    let mut set = |lm: PoseLandmark, x: f64, y: f64| {
        p[lm.index()] = Landmark::new(x, y, 0.0).with_visibility(0.95);
    };

    set(PoseLandmark::Nose, 0.5 + 0.01 * coil, 0.2);
    set(PoseLandmark::LeftEyeInner, 0.49, 0.19);
    set(PoseLandmark::LeftEye, 0.485, 0.19);
    set(PoseLandmark::LeftEyeOuter, 0.48, 0.19);
    set(PoseLandmark::RightEyeInner, 0.51, 0.19);
    set(PoseLandmark::RightEye, 0.515, 0.19);
    set(PoseLandmark::RightEyeOuter, 0.52, 0.19);
    set(PoseLandmark::LeftEar, 0.47, 0.2);
    set(PoseLandmark::RightEar, 0.53, 0.2);
    set(PoseLandmark::MouthLeft, 0.49, 0.23);
    set(PoseLandmark::MouthRight, 0.51, 0.23);

    set(PoseLandmark::LeftShoulder, 0.5 - shoulder_half, 0.32);
    set(PoseLandmark::RightShoulder, 0.5 + shoulder_half, 0.32);
    set(PoseLandmark::LeftElbow, (0.5 - shoulder_half + hands_x) / 2.0, (0.32 + hands_y) / 2.0);
    set(PoseLandmark::RightElbow, (0.5 + shoulder_half + hands_x) / 2.0, (0.32 + hands_y) / 2.0);
    for (wrist, pinky, index, thumb, dx) in [
        (
            PoseLandmark::LeftWrist,
            PoseLandmark::LeftPinky,
            PoseLandmark::LeftIndex,
            PoseLandmark::LeftThumb,
            -0.005,
        ),
        (
            PoseLandmark::RightWrist,
            PoseLandmark::RightPinky,
            PoseLandmark::RightIndex,
            PoseLandmark::RightThumb,
            0.005,
        ),
    ] {
        set(wrist, hands_x + dx, hands_y);
        set(pinky, hands_x + 2.0 * dx, hands_y + 0.02);
        set(index, hands_x + dx, hands_y + 0.03);
        set(thumb, hands_x, hands_y + 0.02);
    }

    set(PoseLandmark::LeftHip, 0.45 + hip_shift, 0.55);
    set(PoseLandmark::RightHip, 0.55 + hip_shift, 0.55);
    set(PoseLandmark::LeftKnee, 0.44 + hip_shift / 2.0, 0.72);
    set(PoseLandmark::RightKnee, 0.56 + hip_shift / 2.0, 0.72);
    set(PoseLandmark::LeftAnkle, 0.44, 0.9);
    set(PoseLandmark::RightAnkle, 0.56, 0.9);
    set(PoseLandmark::LeftHeel, 0.43, 0.92);
    set(PoseLandmark::RightHeel, 0.57, 0.92);
    set(PoseLandmark::LeftFootIndex, 0.41, 0.93);
    set(PoseLandmark::RightFootIndex, 0.59, 0.93);

    LandmarkSet::new(p)
}
