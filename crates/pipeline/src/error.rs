use fairway_core::error::CoreError;
use fairway_core::ffmpeg::FfmpegError;

use crate::pose::PoseError;
use crate::report::CaptureReport;
use crate::sampler::ExtractionError;
use crate::stage::CaptureStage;
use crate::store::RepositoryError;
use crate::uploader::UploadError;

/// Fatal reasons a capture run stops.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Pose engine failed to initialize: {0}")]
    EngineInit(#[source] PoseError),

    #[error("Could not read video duration: {0}")]
    Probe(#[from] FfmpegError),

    #[error("Invalid capture input: {0}")]
    Input(#[source] CoreError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("No keyframes were extracted")]
    NoKeyframes,

    #[error("No pose detected in any of the {attempted} keyframes")]
    NoLandmarks { attempted: usize },

    #[error("Could not compute swing metrics: {0}")]
    Metrics(#[source] CoreError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Scratch directory error: {0}")]
    Scratch(#[from] std::io::Error),
}

/// A failed run: the stage it stopped in, why, and what was recorded up to
/// that point. Temp files have already been cleaned up.
#[derive(Debug, thiserror::Error)]
#[error("Capture failed during {stage}: {error}")]
pub struct CaptureFailure {
    pub stage: CaptureStage,
    #[source]
    pub error: CaptureError,
    pub report: Box<CaptureReport>,
}
