//! Keyframe sampling: pick timestamps, then extract one still per timestamp.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use fairway_core::error::CoreError;
use fairway_core::ffmpeg::{self, FfmpegError};
use fairway_core::sampling;
use fairway_core::types::Millis;

use crate::temp::TempFileTracker;

/// One still image sampled from the source video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyframe {
    /// Position in the sampled sequence.
    pub index: usize,
    pub t_ms: Millis,
    pub path: PathBuf,
}

/// Extraction of `t_ms` failed; the whole sampling step is abandoned.
#[derive(Debug, thiserror::Error)]
#[error("Failed to extract keyframe at {t_ms}ms: {source}")]
pub struct ExtractionError {
    pub t_ms: Millis,
    #[source]
    pub source: FfmpegError,
}

/// Reads durations and stills from a video.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn probe_duration_ms(&self, video: &Path) -> Result<Millis, FfmpegError>;

    /// Write the frame at `t_ms` to `output` as a JPEG.
    async fn extract_frame(
        &self,
        video: &Path,
        output: &Path,
        t_ms: Millis,
    ) -> Result<(), FfmpegError>;
}

/// [`FrameSource`] backed by the `ffprobe` / `ffmpeg` binaries.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegFrameSource;

#[async_trait]
impl FrameSource for FfmpegFrameSource {
    async fn probe_duration_ms(&self, video: &Path) -> Result<Millis, FfmpegError> {
        ffmpeg::probe_duration_ms(video).await
    }

    async fn extract_frame(
        &self,
        video: &Path,
        output: &Path,
        t_ms: Millis,
    ) -> Result<(), FfmpegError> {
        ffmpeg::extract_frame(video, output, t_ms).await
    }
}

pub struct VideoFrameSampler {
    source: Arc<dyn FrameSource>,
}

impl VideoFrameSampler {
    pub fn new(source: Arc<dyn FrameSource>) -> Self {
        Self { source }
    }

    pub async fn probe_duration_ms(&self, video: &Path) -> Result<Millis, FfmpegError> {
        self.source.probe_duration_ms(video).await
    }

    /// Offsets to sample for a clip of `duration_ms`.
    pub fn timestamps(&self, duration_ms: Millis) -> Result<Vec<Millis>, CoreError> {
        sampling::timestamps(duration_ms)
    }

    /// Extract one keyframe per timestamp into `out_dir`, in order.
    ///
    /// Fails on the first timestamp that cannot be extracted. Every output
    /// path is registered with `tracker` before ffmpeg runs.
    pub async fn extract(
        &self,
        video: &Path,
        timestamps: &[Millis],
        out_dir: &Path,
        tracker: &TempFileTracker,
    ) -> Result<Vec<Keyframe>, ExtractionError> {
        let mut keyframes = Vec::with_capacity(timestamps.len());
        for (index, &t_ms) in timestamps.iter().enumerate() {
            let path = tracker.track(out_dir.join(format!("frame_{t_ms}.jpg")));
            self.source
                .extract_frame(video, &path, t_ms)
                .await
                .map_err(|source| ExtractionError { t_ms, source })?;
            tracing::debug!(t_ms, path = %path.display(), "Extracted keyframe");
            keyframes.push(Keyframe { index, t_ms, path });
        }
        Ok(keyframes)
    }
}
