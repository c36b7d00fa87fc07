//! Compact per-capture pose summary.
//!
//! This is what lands in `captures.pose_summary`: phase marks and metrics
//! only. Full landmark payloads live on the individual frame rows.

use serde::{Deserialize, Serialize};

use crate::landmarks::{Handedness, PoseFrame};
use crate::metrics::PoseMetrics;
use crate::phase::Phase;
use crate::types::Millis;

/// Where one phase-tagged keyframe sits in the clip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseMark {
    pub frame_number: i32,
    pub t_ms: Millis,
    pub phase: Phase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseSummary {
    pub handedness: Handedness,
    pub frame_count: usize,
    pub phases: Vec<PhaseMark>,
    pub metrics: PoseMetrics,
}

impl PoseSummary {
    /// Build a summary from parallel `frames` / `phases` slices.
    pub fn new(
        frames: &[PoseFrame],
        phases: &[Phase],
        metrics: PoseMetrics,
        handedness: Handedness,
    ) -> Self {
        let phases = frames
            .iter()
            .zip(phases)
            .enumerate()
            .map(|(i, (frame, phase))| PhaseMark {
                frame_number: i as i32,
                t_ms: frame.t_ms,
                phase: *phase,
            })
            .collect::<Vec<_>>();

        Self {
            handedness,
            frame_count: phases.len(),
            phases,
            metrics,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "handedness": self.handedness,
            "frame_count": self.frame_count,
            "phases": self.phases,
            "metrics": self.metrics,
        })
    }
}
