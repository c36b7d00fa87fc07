//! Landmarks produced ahead of time by an in-browser (WASM) detector.
//!
//! The sidecar is a JSON document next to the uploaded video:
//!
//! ```json
//! { "frames": [
//!     { "t_ms": 150, "landmarks": [ {"x": .., "y": .., "z": .., "visibility": ..}, ... ] },
//!     { "t_ms": 450, "landmarks": null }
//! ] }
//! ```
//!
//! Browser detectors run on their own frame clock, so lookups match the
//! nearest recorded timestamp within [`MATCH_TOLERANCE_MS`].

use std::path::PathBuf;

use async_trait::async_trait;
use fairway_core::landmarks::{Landmark, LandmarkSet};
use fairway_core::types::Millis;
use serde::Deserialize;

use super::{PoseEngine, PoseError};
use crate::sampler::Keyframe;

/// Widest gap between a keyframe and a recorded pose that still matches.
/// Slightly more than one frame at 30 fps.
pub const MATCH_TOLERANCE_MS: Millis = 40;

#[derive(Debug, Deserialize)]
struct Sidecar {
    frames: Vec<SidecarFrame>,
}

#[derive(Debug, Deserialize)]
struct SidecarFrame {
    t_ms: Millis,
    #[serde(default)]
    landmarks: Option<Vec<Landmark>>,
}

pub struct PrecomputedPoseEngine {
    sidecar: PathBuf,
    /// Sorted by timestamp. `None` until initialized.
    poses: Option<Vec<(Millis, Option<LandmarkSet>)>>,
}

impl PrecomputedPoseEngine {
    pub fn new(sidecar: impl Into<PathBuf>) -> Self {
        Self {
            sidecar: sidecar.into(),
            poses: None,
        }
    }

    fn load(raw: &str) -> Result<Vec<(Millis, Option<LandmarkSet>)>, PoseError> {
        let sidecar: Sidecar =
            serde_json::from_str(raw).map_err(|e| PoseError::Initialization(e.to_string()))?;
        let mut poses = sidecar
            .frames
            .into_iter()
            .map(|f| {
                let set = match f.landmarks {
                    Some(points) if !points.is_empty() => {
                        Some(LandmarkSet::new(points).map_err(|e| {
                            PoseError::Initialization(format!("frame at {}ms: {e}", f.t_ms))
                        })?)
                    }
                    _ => None,
                };
                Ok((f.t_ms, set))
            })
            .collect::<Result<Vec<_>, PoseError>>()?;
        poses.sort_by_key(|(t, _)| *t);
        Ok(poses)
    }
}

#[async_trait]
impl PoseEngine for PrecomputedPoseEngine {
    fn name(&self) -> &str {
        "precomputed"
    }

    async fn initialize(&mut self) -> Result<(), PoseError> {
        if self.poses.is_some() {
            return Ok(());
        }
        let raw = tokio::fs::read_to_string(&self.sidecar).await.map_err(|e| {
            PoseError::Initialization(format!("cannot read {}: {e}", self.sidecar.display()))
        })?;
        let poses = Self::load(&raw)?;
        tracing::info!(
            sidecar = %self.sidecar.display(),
            frames = poses.len(),
            "Loaded precomputed poses"
        );
        self.poses = Some(poses);
        Ok(())
    }

    async fn detect(&self, frame: &Keyframe) -> Result<LandmarkSet, PoseError> {
        let poses = self.poses.as_ref().ok_or(PoseError::NotInitialized)?;
        poses
            .iter()
            .filter(|(t, _)| (t - frame.t_ms).abs() <= MATCH_TOLERANCE_MS)
            .min_by_key(|(t, _)| (t - frame.t_ms).abs())
            .and_then(|(_, set)| set.clone())
            .ok_or(PoseError::PoseNotDetected { t_ms: frame.t_ms })
    }

    async fn dispose(&mut self) {
        self.poses = None;
    }
}
