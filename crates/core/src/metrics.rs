//! Scalar swing metrics derived from tagged pose frames.
//!
//! These are proxies computed from body landmarks only; no club tracking is
//! involved. Angles are in degrees, distances are in normalized frame units.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::landmarks::{Handedness, Landmark, LandmarkSet, PoseFrame, PoseLandmark};
use crate::phase::Phase;
use crate::types::Millis;

/// Shoulder-width delta to pseudo-degrees for [`PoseMetrics::shoulder_turn_max`].
pub const SHOULDER_TURN_SCALE: f64 = 180.0;

/// Metrics computed once per capture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseMetrics {
    /// Change in the lead shoulder-hip-knee angle between address and top.
    pub hip_rotation_max: f64,
    /// Change in apparent shoulder width between address and top, scaled by
    /// [`SHOULDER_TURN_SCALE`]. A proxy, not a true rotation angle.
    pub shoulder_turn_max: f64,
    /// Lead hip-knee-ankle angle at address.
    pub knee_flex_address: f64,
    /// Lead elbow-wrist-index angle at the top.
    pub wrist_hinge_top: f64,
    /// Direction from lead hip to nose at address.
    pub spine_tilt_address: f64,
    /// Horizontal travel of the hip midpoint between address and top.
    pub weight_shift: f64,
    /// One minus the largest nose drift from its address position.
    pub head_stability: f64,
    /// Largest horizontal deviation of the lead wrist from its mean.
    pub club_path_deviation: f64,
    /// Backswing-side frame count over downswing-side frame count.
    pub swing_tempo: f64,
    /// Span between the first and last keyframe.
    pub total_duration_ms: Millis,
}

/// Angle at `b` formed by `a-b-c`, in degrees within `[0, 180]`.
///
/// Symmetric in `a` and `c`.
pub fn angle(a: &Landmark, b: &Landmark, c: &Landmark) -> f64 {
    let radians = (c.y - b.y).atan2(c.x - b.x) - (a.y - b.y).atan2(a.x - b.x);
    let degrees = radians.to_degrees().abs();
    if degrees > 180.0 {
        360.0 - degrees
    } else {
        degrees
    }
}

/// Compute the capture metrics from frames and their phase tags.
///
/// The first frame tagged `address` and the first tagged `top` are used as
/// the reference poses; either being absent is a
/// [`CoreError::MissingPhase`].
pub fn compute(
    frames: &[PoseFrame],
    phases: &[Phase],
    handedness: Handedness,
) -> Result<PoseMetrics, CoreError> {
    if frames.len() != phases.len() {
        return Err(CoreError::Validation(format!(
            "Got {} frames but {} phase tags",
            frames.len(),
            phases.len()
        )));
    }

    let address = first_with_phase(frames, phases, Phase::Address)?;
    let top = first_with_phase(frames, phases, Phase::Top)?;
    let lead = handedness.lead();

    let hip_angle = |set: &LandmarkSet| {
        angle(set.get(lead.shoulder), set.get(lead.hip), set.get(lead.knee))
    };
    let hip_rotation_max = (hip_angle(top) - hip_angle(address)).abs();

    let shoulder_turn_max = (top.inter_shoulder_distance() - address.inter_shoulder_distance())
        .abs()
        * SHOULDER_TURN_SCALE;

    let knee_flex_address = angle(
        address.get(lead.hip),
        address.get(lead.knee),
        address.get(lead.ankle),
    );

    let wrist_hinge_top = angle(top.get(lead.elbow), top.get(lead.wrist), top.get(lead.index));

    let nose = address.get(PoseLandmark::Nose);
    let hip = address.get(lead.hip);
    let spine_tilt_address = (nose.y - hip.y).atan2(nose.x - hip.x).to_degrees();

    let weight_shift = (top.hip_midpoint().x - address.hip_midpoint().x).abs();

    let max_head_drift = frames
        .iter()
        .map(|f| f.landmarks.get(PoseLandmark::Nose).planar_distance(nose))
        .fold(0.0_f64, f64::max);
    let head_stability = 1.0 - max_head_drift;

    let wrist_xs: Vec<f64> = frames
        .iter()
        .map(|f| f.landmarks.get(lead.wrist).x)
        .collect();
    let mean_wrist_x = wrist_xs.iter().sum::<f64>() / wrist_xs.len() as f64;
    let club_path_deviation = wrist_xs
        .iter()
        .map(|x| (x - mean_wrist_x).abs())
        .fold(0.0_f64, f64::max);

    let swing_tempo = tempo(phases);

    // Both anchors exist, so the sequence is non-empty.
    let total_duration_ms = frames[frames.len() - 1].t_ms - frames[0].t_ms;

    Ok(PoseMetrics {
        hip_rotation_max,
        shoulder_turn_max,
        knee_flex_address,
        wrist_hinge_top,
        spine_tilt_address,
        weight_shift,
        head_stability,
        club_path_deviation,
        swing_tempo,
        total_duration_ms,
    })
}

/// Backswing-to-downswing frame ratio; `1.0` when no downswing frames exist.
pub fn tempo(phases: &[Phase]) -> f64 {
    let back = phases.iter().filter(|p| p.is_backswing_side()).count();
    let down = phases.iter().filter(|p| p.is_downswing_side()).count();
    if down == 0 {
        1.0
    } else {
        back as f64 / down as f64
    }
}

fn first_with_phase<'a>(
    frames: &'a [PoseFrame],
    phases: &[Phase],
    wanted: Phase,
) -> Result<&'a LandmarkSet, CoreError> {
    phases
        .iter()
        .position(|p| *p == wanted)
        .map(|i| &frames[i].landmarks)
        .ok_or(CoreError::MissingPhase(wanted))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
