//! Per-run outcome aggregation.

use fairway_core::summary::PoseSummary;
use fairway_core::types::{DbId, Millis};
use serde::Serialize;
use uuid::Uuid;

use crate::stage::CaptureStage;
use crate::temp::CleanupSummary;
use crate::uploader::UploadedArtifact;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Succeeded,
    /// Finished, but some items were dropped or a side effect failed.
    Degraded,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageOutcome {
    pub stage: CaptureStage,
    pub status: StageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// A tolerated failure. None of these fail the capture.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DegradedEvent {
    PoseNotDetected { t_ms: Millis, reason: String },
    OverlayFailed { t_ms: Millis, reason: String },
    OverlayUploadFailed { t_ms: Millis, reason: String },
    AnalysisTriggerFailed { reason: String },
    CleanupFailed { path: String, reason: String },
}

/// Everything a caller learns about one capture run.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureReport {
    pub client_capture_id: Uuid,
    pub user_id: DbId,
    /// Current stage while running; `complete` or `failed` once finished.
    pub stage: CaptureStage,
    pub capture_id: Option<DbId>,
    pub duration_ms: Option<Millis>,
    pub keyframes_extracted: usize,
    pub frames_with_pose: usize,
    pub overlays_rendered: usize,
    /// Rows written by this run; lower than the frame count on a replay.
    pub frames_inserted: usize,
    pub summary: Option<PoseSummary>,
    pub artifacts: Vec<UploadedArtifact>,
    pub stages: Vec<StageOutcome>,
    pub degraded: Vec<DegradedEvent>,
    pub cleanup: CleanupSummary,
}

impl CaptureReport {
    pub fn new(client_capture_id: Uuid, user_id: DbId) -> Self {
        Self {
            client_capture_id,
            user_id,
            stage: CaptureStage::Idle,
            capture_id: None,
            duration_ms: None,
            keyframes_extracted: 0,
            frames_with_pose: 0,
            overlays_rendered: 0,
            frames_inserted: 0,
            summary: None,
            artifacts: Vec::new(),
            stages: Vec::new(),
            degraded: Vec::new(),
            cleanup: CleanupSummary::default(),
        }
    }

    pub fn record(&mut self, stage: CaptureStage, status: StageStatus, detail: Option<String>) {
        self.stages.push(StageOutcome {
            stage,
            status,
            detail,
        });
    }

    pub fn degrade(&mut self, event: DegradedEvent) {
        self.degraded.push(event);
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }

    pub fn status_of(&self, stage: CaptureStage) -> Option<StageStatus> {
        self.stages.iter().rev().find(|o| o.stage == stage).map(|o| o.status)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({
                "client_capture_id": self.client_capture_id,
                "error": e.to_string(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_outcome_wins() {
        let mut report = CaptureReport::new(Uuid::new_v4(), 1);
        report.record(CaptureStage::PoseDetection, StageStatus::Succeeded, None);
        report.record(CaptureStage::PoseDetection, StageStatus::Degraded, Some("2 dropped".into()));
        assert_eq!(report.status_of(CaptureStage::PoseDetection), Some(StageStatus::Degraded));
        assert_eq!(report.status_of(CaptureStage::ArtifactUpload), None);
    }

    #[test]
    fn json_shape() {
        let mut report = CaptureReport::new(Uuid::nil(), 3);
        report.degrade(DegradedEvent::OverlayFailed {
            t_ms: 450,
            reason: "decode".into(),
        });
        report.record(CaptureStage::OverlayRendering, StageStatus::Degraded, None);

        let json = report.to_json();
        assert_eq!(json["user_id"], 3);
        assert_eq!(json["stage"], "idle");
        assert_eq!(json["degraded"][0]["kind"], "overlay_failed");
        assert_eq!(json["stages"][0]["status"], "degraded");
        assert!(json["stages"][0].get("detail").is_none());
        assert!(report.is_degraded());
    }
}
