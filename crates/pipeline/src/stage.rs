//! Coordinator stages and their progress weights.

use std::fmt;

use serde::Serialize;

/// Linear stages of one capture run. [`CaptureStage::Failed`] is reachable
/// from any stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureStage {
    Idle,
    Initializing,
    DurationProbe,
    KeyframeExtraction,
    PoseDetection,
    PhaseTagging,
    OverlayRendering,
    MetricsComputation,
    CaptureRecordCreation,
    ArtifactUpload,
    FrameRecordInsertion,
    AnalysisTrigger,
    Cleanup,
    Complete,
    Failed,
}

impl CaptureStage {
    /// Name reported to progress callbacks and logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Initializing => "initializing",
            Self::DurationProbe => "duration_probe",
            Self::KeyframeExtraction => "keyframe_extraction",
            Self::PoseDetection => "pose_detection",
            Self::PhaseTagging => "phase_tagging",
            Self::OverlayRendering => "overlay_rendering",
            Self::MetricsComputation => "metrics_computation",
            Self::CaptureRecordCreation => "capture_record_creation",
            Self::ArtifactUpload => "artifact_upload",
            Self::FrameRecordInsertion => "frame_record_insertion",
            Self::AnalysisTrigger => "analysis_trigger",
            Self::Cleanup => "cleanup",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    /// The stage that follows in a successful run.
    pub fn next(self) -> Self {
        match self {
            Self::Idle => Self::Initializing,
            Self::Initializing => Self::DurationProbe,
            Self::DurationProbe => Self::KeyframeExtraction,
            Self::KeyframeExtraction => Self::PoseDetection,
            Self::PoseDetection => Self::PhaseTagging,
            Self::PhaseTagging => Self::OverlayRendering,
            Self::OverlayRendering => Self::MetricsComputation,
            Self::MetricsComputation => Self::CaptureRecordCreation,
            Self::CaptureRecordCreation => Self::ArtifactUpload,
            Self::ArtifactUpload => Self::FrameRecordInsertion,
            Self::FrameRecordInsertion => Self::AnalysisTrigger,
            Self::AnalysisTrigger => Self::Cleanup,
            Self::Cleanup => Self::Complete,
            Self::Complete => Self::Complete,
            Self::Failed => Self::Failed,
        }
    }

    /// Progress after `done` of `total` items of this stage have finished.
    pub fn progress_within(self, done: usize, total: usize) -> f64 {
        let start = self.progress();
        if total == 0 {
            return start;
        }
        let end = self.next().progress();
        start + (end - start) * (done.min(total) as f64 / total as f64)
    }

    /// Overall progress reached when this stage starts.
    ///
    /// Extraction, detection and upload dominate wall time, so they get the
    /// widest bands.
    pub fn progress(self) -> f64 {
        match self {
            Self::Idle => 0.0,
            Self::Initializing => 0.02,
            Self::DurationProbe => 0.05,
            Self::KeyframeExtraction => 0.08,
            Self::PoseDetection => 0.25,
            Self::PhaseTagging => 0.5,
            Self::OverlayRendering => 0.52,
            Self::MetricsComputation => 0.6,
            Self::CaptureRecordCreation => 0.62,
            Self::ArtifactUpload => 0.66,
            Self::FrameRecordInsertion => 0.9,
            Self::AnalysisTrigger => 0.94,
            Self::Cleanup => 0.97,
            Self::Complete | Self::Failed => 1.0,
        }
    }
}

impl fmt::Display for CaptureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Receives `(stage, fraction)` updates. Best-effort; implementations must
/// not block.
pub type ProgressFn<'a> = dyn Fn(&str, f64) + Send + Sync + 'a;
