//! End-to-end orchestration of one capture.
//!
//! ```text
//! Idle → Initializing → DurationProbe → KeyframeExtraction → PoseDetection
//!      → PhaseTagging → OverlayRendering → MetricsComputation
//!      → CaptureRecordCreation → ArtifactUpload → FrameRecordInsertion
//!      → AnalysisTrigger → Cleanup → Complete
//! ```
//!
//! Any stage may end the run in `Failed`; cleanup of scratch files runs on
//! every exit path before the result is returned.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use fairway_core::landmarks::{Handedness, LandmarkSet, PoseFrame};
use fairway_core::storage::ArtifactKind;
use fairway_core::summary::PoseSummary;
use fairway_core::types::{DbId, Millis, Timestamp};
use fairway_core::{metrics, phase};
use fairway_db::models::capture::{CreateCapture, CAPTURE_STATUS_PROCESSED};
use fairway_events::AnalysisTrigger;
use futures::stream::{self, StreamExt};
use uuid::Uuid;

use crate::error::{CaptureError, CaptureFailure};
use crate::overlay::OverlayRenderer;
use crate::pose::PoseEngine;
use crate::report::{CaptureReport, DegradedEvent, StageStatus};
use crate::sampler::{Keyframe, VideoFrameSampler};
use crate::stage::{CaptureStage, ProgressFn};
use crate::store::{CaptureRepository, FrameInput};
use crate::temp::TempFileTracker;
use crate::uploader::{ArtifactUploader, UploadedArtifact};

/// One capture to process.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub video: PathBuf,
    pub user_id: DbId,
    /// Known clip length; probed from the file when absent.
    pub duration_ms: Option<Millis>,
    pub club: Option<String>,
    /// Idempotency key of an earlier attempt to retry. A fresh key is minted
    /// when absent.
    pub client_capture_id: Option<Uuid>,
    pub captured_at: Option<Timestamp>,
}

impl CaptureRequest {
    pub fn new(video: impl Into<PathBuf>, user_id: DbId) -> Self {
        Self {
            video: video.into(),
            user_id,
            duration_ms: None,
            club: None,
            client_capture_id: None,
            captured_at: None,
        }
    }
}

/// Knobs that do not belong to any collaborator.
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub work_dir: PathBuf,
    pub max_concurrency: usize,
    pub handedness: Handedness,
    pub trigger_timeout: Duration,
}

/// Owns every collaborator of the pipeline. Construct one per worker; a
/// coordinator processes one capture at a time.
pub struct CaptureCoordinator {
    engine: Box<dyn PoseEngine>,
    sampler: VideoFrameSampler,
    renderer: Option<OverlayRenderer>,
    uploader: ArtifactUploader,
    repository: CaptureRepository,
    trigger: Option<Arc<dyn AnalysisTrigger>>,
    settings: CoordinatorSettings,
}

/// A keyframe that yielded a pose.
struct Detected {
    keyframe: Keyframe,
    landmarks: LandmarkSet,
}

/// The failing stage is read from the report's current stage.
type StageResult<T> = Result<T, CaptureError>;

impl CaptureCoordinator {
    pub fn new(
        engine: Box<dyn PoseEngine>,
        sampler: VideoFrameSampler,
        renderer: Option<OverlayRenderer>,
        uploader: ArtifactUploader,
        repository: CaptureRepository,
        trigger: Option<Arc<dyn AnalysisTrigger>>,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            engine,
            sampler,
            renderer,
            uploader,
            repository,
            trigger,
            settings,
        }
    }

    /// Load the pose engine. Safe to call repeatedly.
    pub async fn initialize(&mut self) -> Result<(), CaptureError> {
        self.engine.initialize().await.map_err(CaptureError::EngineInit)
    }

    /// Release the pose engine.
    pub async fn dispose(&mut self) {
        self.engine.dispose().await;
        tracing::debug!(engine = self.engine.name(), "Pose engine disposed");
    }

    /// Process one capture end to end.
    ///
    /// Tolerated failures are recorded in the report; the first fatal one
    /// stops the run. Scratch files are removed either way.
    pub async fn run(
        &mut self,
        request: CaptureRequest,
        progress: &ProgressFn<'_>,
    ) -> Result<CaptureReport, CaptureFailure> {
        let client_capture_id = request.client_capture_id.unwrap_or_else(Uuid::new_v4);
        let mut report = CaptureReport::new(client_capture_id, request.user_id);
        let tracker = TempFileTracker::new();

        tracing::info!(
            %client_capture_id,
            user_id = request.user_id,
            video = %request.video.display(),
            retry = request.client_capture_id.is_some(),
            "Capture started"
        );

        let outcome = self
            .execute(&request, client_capture_id, &tracker, &mut report, progress)
            .await;
        let failed_in = report.stage;

        enter(&mut report, CaptureStage::Cleanup, progress);
        let cleanup = tracker.cleanup().await;
        for (path, reason) in &cleanup.failed {
            report.degrade(DegradedEvent::CleanupFailed {
                path: path.display().to_string(),
                reason: reason.clone(),
            });
        }
        let cleanup_status = if cleanup.is_clean() {
            StageStatus::Succeeded
        } else {
            StageStatus::Degraded
        };
        report.record(CaptureStage::Cleanup, cleanup_status, None);
        report.cleanup = cleanup;

        match outcome {
            Ok(()) => {
                enter(&mut report, CaptureStage::Complete, progress);
                tracing::info!(
                    %client_capture_id,
                    capture_id = report.capture_id,
                    frames = report.frames_with_pose,
                    degraded = report.degraded.len(),
                    "Capture complete"
                );
                Ok(report)
            }
            Err(error) => {
                report.record(failed_in, StageStatus::Failed, Some(error.to_string()));
                enter(&mut report, CaptureStage::Failed, progress);
                tracing::error!(
                    %client_capture_id,
                    stage = %failed_in,
                    error = %error,
                    "Capture failed"
                );
                Err(CaptureFailure {
                    stage: failed_in,
                    error,
                    report: Box::new(report),
                })
            }
        }
    }

    async fn execute(
        &mut self,
        request: &CaptureRequest,
        client_capture_id: Uuid,
        tracker: &TempFileTracker,
        report: &mut CaptureReport,
        progress: &ProgressFn<'_>,
    ) -> StageResult<()> {
        // -- Initializing ----------------------------------------------------
        enter(report, CaptureStage::Initializing, progress);
        self.initialize().await?;
        report.record(CaptureStage::Initializing, StageStatus::Succeeded, None);

        // -- DurationProbe ---------------------------------------------------
        enter(report, CaptureStage::DurationProbe, progress);
        let duration_ms = match request.duration_ms {
            Some(d) => d,
            None => self.sampler.probe_duration_ms(&request.video).await?,
        };
        report.duration_ms = Some(duration_ms);
        let timestamps = self.sampler.timestamps(duration_ms).map_err(CaptureError::Input)?;
        report.record(CaptureStage::DurationProbe, StageStatus::Succeeded, None);

        // -- KeyframeExtraction ----------------------------------------------
        enter(report, CaptureStage::KeyframeExtraction, progress);
        let scratch = tracker
            .create_dir(self.settings.work_dir.join(client_capture_id.to_string()))
            .await?;
        let keyframes = self
            .sampler
            .extract(&request.video, &timestamps, &scratch, tracker)
            .await?;
        if keyframes.is_empty() {
            return Err(CaptureError::NoKeyframes);
        }
        report.keyframes_extracted = keyframes.len();
        report.record(CaptureStage::KeyframeExtraction, StageStatus::Succeeded, None);

        // -- PoseDetection ---------------------------------------------------
        enter(report, CaptureStage::PoseDetection, progress);
        let detected = self.detect_all(keyframes, report, progress).await?;
        report.frames_with_pose = detected.len();

        // -- PhaseTagging ----------------------------------------------------
        enter(report, CaptureStage::PhaseTagging, progress);
        let frames: Vec<PoseFrame> = detected
            .iter()
            .map(|d| PoseFrame {
                t_ms: d.keyframe.t_ms,
                landmarks: d.landmarks.clone(),
            })
            .collect();
        let phases = phase::tag(&frames, self.settings.handedness);
        report.record(CaptureStage::PhaseTagging, StageStatus::Succeeded, None);

        // -- OverlayRendering ------------------------------------------------
        enter(report, CaptureStage::OverlayRendering, progress);
        let overlays = self.render_all(&detected, &scratch, tracker, report, progress).await;
        report.overlays_rendered = overlays.len();

        // -- MetricsComputation ----------------------------------------------
        enter(report, CaptureStage::MetricsComputation, progress);
        let metrics = metrics::compute(&frames, &phases, self.settings.handedness)
            .map_err(CaptureError::Metrics)?;
        let summary = PoseSummary::new(&frames, &phases, metrics, self.settings.handedness);
        report.record(CaptureStage::MetricsComputation, StageStatus::Succeeded, None);

        // -- CaptureRecordCreation -------------------------------------------
        enter(report, CaptureStage::CaptureRecordCreation, progress);
        let capture_id = self
            .repository
            .create_or_get_capture(&CreateCapture {
                user_id: request.user_id,
                client_capture_id,
                status: CAPTURE_STATUS_PROCESSED.to_string(),
                pose_summary: summary.to_json(),
                club: request.club.clone(),
                captured_at: request.captured_at.unwrap_or_else(Utc::now),
            })
            .await?;
        report.capture_id = Some(capture_id);
        report.summary = Some(summary);
        report.record(CaptureStage::CaptureRecordCreation, StageStatus::Succeeded, None);
        tracing::info!(capture_id, %client_capture_id, "Capture record ready");

        // -- ArtifactUpload --------------------------------------------------
        enter(report, CaptureStage::ArtifactUpload, progress);
        let artifacts = self
            .upload_all(request.user_id, client_capture_id, &detected, &overlays, report, progress)
            .await?;
        report.artifacts = artifacts.clone();

        // -- FrameRecordInsertion --------------------------------------------
        enter(report, CaptureStage::FrameRecordInsertion, progress);
        let inputs: Vec<FrameInput> = detected
            .iter()
            .zip(&phases)
            .map(|(d, phase)| FrameInput {
                frame_number: d.keyframe.index as i32,
                t_ms: d.keyframe.t_ms,
                phase: *phase,
                landmarks: d.landmarks.clone(),
            })
            .collect();
        report.frames_inserted = self
            .repository
            .insert_frames(capture_id, &inputs, &artifacts)
            .await?;
        report.record(CaptureStage::FrameRecordInsertion, StageStatus::Succeeded, None);

        // -- AnalysisTrigger -------------------------------------------------
        enter(report, CaptureStage::AnalysisTrigger, progress);
        self.trigger_analysis(capture_id, report).await;

        Ok(())
    }

    /// Detect poses with bounded concurrency. Frames without a pose are
    /// dropped; the result keeps keyframe order.
    async fn detect_all(
        &self,
        keyframes: Vec<Keyframe>,
        report: &mut CaptureReport,
        progress: &ProgressFn<'_>,
    ) -> StageResult<Vec<Detected>> {
        let engine: &dyn PoseEngine = self.engine.as_ref();
        let total = keyframes.len();

        let mut results = stream::iter(keyframes)
            .map(|keyframe| async move {
                let result = engine.detect(&keyframe).await;
                (keyframe, result)
            })
            .buffer_unordered(self.settings.max_concurrency);

        let mut detected = Vec::with_capacity(total);
        let mut done = 0;
        while let Some((keyframe, result)) = results.next().await {
            done += 1;
            progress(
                CaptureStage::PoseDetection.name(),
                CaptureStage::PoseDetection.progress_within(done, total),
            );
            match result {
                Ok(landmarks) => detected.push(Detected { keyframe, landmarks }),
                Err(e) => {
                    tracing::warn!(
                        t_ms = keyframe.t_ms,
                        error = %e,
                        "Dropping keyframe without pose"
                    );
                    report.degrade(DegradedEvent::PoseNotDetected {
                        t_ms: keyframe.t_ms,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if detected.is_empty() {
            return Err(CaptureError::NoLandmarks { attempted: total });
        }
        detected.sort_by_key(|d| d.keyframe.index);

        let dropped = total - detected.len();
        if dropped == 0 {
            report.record(CaptureStage::PoseDetection, StageStatus::Succeeded, None);
        } else {
            report.record(
                CaptureStage::PoseDetection,
                StageStatus::Degraded,
                Some(format!("{dropped} of {total} keyframes had no pose")),
            );
        }
        Ok(detected)
    }

    /// Render overlays for every detected frame. Failures only cost that
    /// frame its overlay. Returns overlay paths keyed by keyframe index.
    async fn render_all(
        &self,
        detected: &[Detected],
        scratch: &std::path::Path,
        tracker: &TempFileTracker,
        report: &mut CaptureReport,
        progress: &ProgressFn<'_>,
    ) -> HashMap<usize, PathBuf> {
        let Some(renderer) = self.renderer.as_ref() else {
            report.record(CaptureStage::OverlayRendering, StageStatus::Skipped, None);
            return HashMap::new();
        };
        let total = detected.len();

        let mut results = stream::iter(detected)
            .map(|d| {
                let output =
                    tracker.track(scratch.join(format!("overlay_{}.jpg", d.keyframe.t_ms)));
                async move {
                    let result = renderer.render(&d.keyframe.path, &output, &d.landmarks).await;
                    (d, output, result)
                }
            })
            .buffer_unordered(self.settings.max_concurrency);

        let mut overlays = HashMap::with_capacity(total);
        let mut done = 0;
        while let Some((d, output, result)) = results.next().await {
            done += 1;
            progress(
                CaptureStage::OverlayRendering.name(),
                CaptureStage::OverlayRendering.progress_within(done, total),
            );
            match result {
                Ok(stats) => {
                    tracing::debug!(
                        t_ms = d.keyframe.t_ms,
                        bones = stats.bones,
                        "Overlay rendered"
                    );
                    overlays.insert(d.keyframe.index, output);
                }
                Err(e) => {
                    tracing::warn!(t_ms = d.keyframe.t_ms, error = %e, "Overlay rendering failed");
                    report.degrade(DegradedEvent::OverlayFailed {
                        t_ms: d.keyframe.t_ms,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let status = if overlays.len() == total {
            StageStatus::Succeeded
        } else {
            StageStatus::Degraded
        };
        report.record(CaptureStage::OverlayRendering, status, None);
        overlays
    }

    /// Upload every frame and overlay. A frame upload failure is fatal once
    /// all siblings have settled; an overlay upload failure only drops the
    /// overlay reference.
    async fn upload_all(
        &self,
        user_id: DbId,
        client_capture_id: Uuid,
        detected: &[Detected],
        overlays: &HashMap<usize, PathBuf>,
        report: &mut CaptureReport,
        progress: &ProgressFn<'_>,
    ) -> StageResult<Vec<UploadedArtifact>> {
        let mut jobs: Vec<(ArtifactKind, Millis, &std::path::Path)> = Vec::new();
        for d in detected {
            jobs.push((ArtifactKind::Frame, d.keyframe.t_ms, d.keyframe.path.as_path()));
            if let Some(overlay) = overlays.get(&d.keyframe.index) {
                jobs.push((ArtifactKind::Overlay, d.keyframe.t_ms, overlay.as_path()));
            }
        }
        let total = jobs.len();
        let uploader = &self.uploader;

        let mut results = stream::iter(jobs)
            .map(|(kind, t_ms, path)| async move {
                let result = uploader
                    .upload_file(user_id, client_capture_id, kind, t_ms, path)
                    .await;
                (kind, t_ms, result)
            })
            .buffer_unordered(self.settings.max_concurrency);

        let mut artifacts = Vec::with_capacity(total);
        let mut first_error = None;
        let mut done = 0;
        while let Some((kind, t_ms, result)) = results.next().await {
            done += 1;
            progress(
                CaptureStage::ArtifactUpload.name(),
                CaptureStage::ArtifactUpload.progress_within(done, total),
            );
            match (kind, result) {
                (_, Ok(artifact)) => artifacts.push(artifact),
                (ArtifactKind::Overlay, Err(e)) => {
                    tracing::warn!(
                        t_ms,
                        error = %e,
                        "Overlay upload failed, keeping frame without overlay"
                    );
                    report.degrade(DegradedEvent::OverlayUploadFailed {
                        t_ms,
                        reason: e.to_string(),
                    });
                }
                (ArtifactKind::Frame, Err(e)) => {
                    tracing::error!(t_ms, error = %e, "Frame upload failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            return Err(CaptureError::Upload(e));
        }

        artifacts.sort_by_key(|a| (a.t_ms, a.kind == ArtifactKind::Overlay));
        let reused = artifacts.iter().filter(|a| !a.created).count();
        let status = if artifacts.len() == total {
            StageStatus::Succeeded
        } else {
            StageStatus::Degraded
        };
        let detail = (reused > 0).then(|| format!("{reused} artifacts already uploaded"));
        report.record(CaptureStage::ArtifactUpload, status, detail);
        Ok(artifacts)
    }

    /// Notify downstream analysis. Never fails the capture.
    async fn trigger_analysis(&self, capture_id: DbId, report: &mut CaptureReport) {
        let Some(trigger) = self.trigger.as_ref() else {
            report.record(
                CaptureStage::AnalysisTrigger,
                StageStatus::Skipped,
                Some("no analysis endpoint configured".into()),
            );
            return;
        };

        let outcome =
            tokio::time::timeout(self.settings.trigger_timeout, trigger.trigger(capture_id)).await;
        let reason = match outcome {
            Ok(Ok(())) => {
                report.record(CaptureStage::AnalysisTrigger, StageStatus::Succeeded, None);
                return;
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {:?}", self.settings.trigger_timeout),
        };

        tracing::warn!(
            capture_id,
            error = %reason,
            "Analysis trigger failed; capture is already persisted"
        );
        report.degrade(DegradedEvent::AnalysisTriggerFailed {
            reason: reason.clone(),
        });
        report.record(CaptureStage::AnalysisTrigger, StageStatus::Degraded, Some(reason));
    }
}

fn enter(report: &mut CaptureReport, stage: CaptureStage, progress: &ProgressFn<'_>) {
    report.stage = stage;
    tracing::debug!(
        stage = %stage,
        client_capture_id = %report.client_capture_id,
        "Entering stage"
    );
    progress(stage.name(), stage.progress());
}
