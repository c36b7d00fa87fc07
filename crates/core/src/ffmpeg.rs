//! FFmpeg/FFprobe command helpers.
//!
//! Both tools run as child processes via `tokio::process`; nothing is
//! linked against libav.

use std::path::Path;

use serde::Deserialize;

use crate::types::Millis;

/// Error type for FFmpeg/FFprobe operations.
#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error("ffprobe/ffmpeg binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("ffprobe/ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse ffprobe output: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("video file not found: {0}")]
    VideoNotFound(String),
}

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

/// The subset of ffprobe's JSON output requested by [`probe_video`].
#[derive(Debug, Deserialize)]
pub struct FfprobeOutput {
    #[serde(default)]
    pub streams: Vec<FfprobeStream>,
    #[serde(default)]
    pub format: FfprobeFormat,
}

/// A single stream from ffprobe output.
#[derive(Debug, Deserialize)]
pub struct FfprobeStream {
    pub codec_type: Option<String>,
    pub duration: Option<String>,
}

/// Container-level metadata from ffprobe.
#[derive(Debug, Default, Deserialize)]
pub struct FfprobeFormat {
    pub duration: Option<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Ask `ffprobe` for the container and stream durations of `path`.
pub async fn probe_video(path: &Path) -> Result<FfprobeOutput, FfmpegError> {
    if !path.exists() {
        return Err(FfmpegError::VideoNotFound(path.display().to_string()));
    }

    let output = tokio::process::Command::new("ffprobe")
        .args(["-v", "error", "-print_format", "json"])
        .args(["-show_entries", "format=duration:stream=codec_type,duration"])
        .arg(path)
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    serde_json::from_slice::<FfprobeOutput>(&output.stdout).map_err(|e| {
        FfmpegError::ParseError(format!("{e}: {}", String::from_utf8_lossy(&output.stdout)))
    })
}

/// Probe a video and return its duration in whole milliseconds.
pub async fn probe_duration_ms(path: &Path) -> Result<Millis, FfmpegError> {
    let listing = probe_video(path).await?;
    let secs = parse_duration(&listing);
    if !secs.is_finite() || secs <= 0.0 {
        return Err(FfmpegError::ParseError(format!(
            "no usable duration reported for {}",
            path.display()
        )));
    }
    Ok((secs * 1000.0).floor() as Millis)
}

/// Extract a single full-resolution frame as a JPEG at `t_ms`.
///
/// Seeks before opening the input so long clips do not decode from the start.
pub async fn extract_frame(
    video_path: &Path,
    output_path: &Path,
    t_ms: Millis,
) -> Result<(), FfmpegError> {
    if !video_path.exists() {
        return Err(FfmpegError::VideoNotFound(video_path.display().to_string()));
    }

    let timestamp_secs = t_ms as f64 / 1000.0;
    let output = tokio::process::Command::new("ffmpeg")
        .args(["-y", "-ss", &format!("{timestamp_secs:.3}"), "-i"])
        .arg(video_path)
        .args(["-frames:v", "1", "-q:v", "2"])
        .arg(output_path)
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    // ffmpeg exits 0 without writing anything when seeking past the last frame.
    if !output_path.exists() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: format!("no frame written at {t_ms}ms"),
        });
    }

    Ok(())
}

/// Clip length in seconds: the container duration when ffprobe reports a
/// usable one, otherwise the first video stream's. `0.0` when neither parses.
pub fn parse_duration(listing: &FfprobeOutput) -> f64 {
    let seconds = |d: &Option<String>| d.as_deref().and_then(|v| v.parse::<f64>().ok());
    seconds(&listing.format.duration)
        .or_else(|| {
            listing
                .streams
                .iter()
                .find(|s| s.codec_type.as_deref() == Some("video"))
                .and_then(|s| seconds(&s.duration))
        })
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_stream(duration: Option<&str>) -> FfprobeStream {
        FfprobeStream {
            codec_type: Some("video".into()),
            duration: duration.map(Into::into),
        }
    }

    #[test]
    fn container_duration_wins() {
        let listing = FfprobeOutput {
            streams: vec![],
            format: FfprobeFormat {
                duration: Some("2.5".to_string()),
            },
        };
        assert!((parse_duration(&listing) - 2.5).abs() < 0.001);
    }

    #[test]
    fn falls_back_to_video_stream() {
        let listing = FfprobeOutput {
            streams: vec![video_stream(Some("3.0"))],
            format: FfprobeFormat { duration: None },
        };
        assert!((parse_duration(&listing) - 3.0).abs() < 0.001);
    }

    #[test]
    fn missing_duration_is_zero() {
        let listing = FfprobeOutput {
            streams: vec![],
            format: FfprobeFormat { duration: None },
        };
        assert_eq!(parse_duration(&listing), 0.0);
    }

    #[test]
    fn audio_stream_is_ignored() {
        let listing = FfprobeOutput {
            streams: vec![
                FfprobeStream {
                    codec_type: Some("audio".into()),
                    duration: Some("9.0".into()),
                },
                video_stream(Some("2.0")),
            ],
            format: FfprobeFormat {
                duration: Some("n/a".into()),
            },
        };
        assert!((parse_duration(&listing) - 2.0).abs() < 0.001);
    }

    #[test]
    fn deserializes_sparse_stream_listing() {
        let json = r#"{"streams": [{"codec_type": "video", "duration": "1.500000"}]}"#;
        let listing: FfprobeOutput = serde_json::from_str(json).unwrap();
        assert!((parse_duration(&listing) - 1.5).abs() < 0.001);
    }

    #[tokio::test]
    async fn duration_lookup_rejects_missing_file() {
        let err = probe_video(Path::new("/nonexistent/swing.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, FfmpegError::VideoNotFound(_)));
    }

    #[tokio::test]
    async fn extract_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = extract_frame(
            Path::new("/nonexistent/swing.mp4"),
            &dir.path().join("frame.jpg"),
            100,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, FfmpegError::VideoNotFound(_)));
    }
}
