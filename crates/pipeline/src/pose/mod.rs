//! Single-person pose estimation behind one async interface.
//!
//! The detector itself is a black box. Three engines are provided and one is
//! chosen from configuration at construction time:
//!
//! - [`http::HttpPoseEngine`] -- a native detector running as an HTTP sidecar.
//! - [`precomputed::PrecomputedPoseEngine`] -- landmarks already produced by a
//!   browser/WASM detector and shipped alongside the video as JSON.
//! - [`fake::FakePoseEngine`] -- deterministic synthetic swing for tests and
//!   dry runs.

pub mod fake;
pub mod http;
pub mod precomputed;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use fairway_core::landmarks::LandmarkSet;
use fairway_core::types::Millis;

use crate::sampler::Keyframe;

pub use fake::FakePoseEngine;
pub use http::HttpPoseEngine;
pub use precomputed::PrecomputedPoseEngine;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PoseError {
    #[error("Pose engine is not initialized")]
    NotInitialized,

    #[error("Pose engine failed to initialize: {0}")]
    Initialization(String),

    /// The detector ran but found no person in the frame.
    #[error("No pose detected at {t_ms}ms")]
    PoseNotDetected { t_ms: Millis },

    #[error("Pose engine request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Pose engine returned HTTP {0}")]
    HttpStatus(u16),

    #[error("Invalid pose engine output: {0}")]
    InvalidOutput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Engine trait
// ---------------------------------------------------------------------------

/// A stateful detector exclusively owned by one coordinator.
///
/// `detect` takes `&self` so a single engine can serve the bounded fan-out
/// of one capture; lifecycle calls take `&mut self`.
#[async_trait]
pub trait PoseEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Load the model. Calling again after success is a no-op.
    async fn initialize(&mut self) -> Result<(), PoseError>;

    async fn detect(&self, frame: &Keyframe) -> Result<LandmarkSet, PoseError>;

    /// Release resources. The engine may be initialized again afterwards.
    async fn dispose(&mut self);
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// Which engine to build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoseEngineKind {
    Http { url: String },
    Precomputed { sidecar: PathBuf },
    Fake,
}

impl PoseEngineKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Http { .. } => "http",
            Self::Precomputed { .. } => "precomputed",
            Self::Fake => "fake",
        }
    }
}

pub fn build_engine(kind: &PoseEngineKind, request_timeout: Duration) -> Box<dyn PoseEngine> {
    match kind {
        PoseEngineKind::Http { url } => Box::new(HttpPoseEngine::new(url.clone(), request_timeout)),
        PoseEngineKind::Precomputed { sidecar } => {
            Box::new(PrecomputedPoseEngine::new(sidecar.clone()))
        }
        PoseEngineKind::Fake => Box::new(FakePoseEngine::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_engine_for_each_kind() {
        let timeout = Duration::from_secs(1);
        assert_eq!(build_engine(&PoseEngineKind::Fake, timeout).name(), "fake");
        let http = PoseEngineKind::Http { url: "http://localhost:9".into() };
        assert_eq!(build_engine(&http, timeout).name(), "http");
        let precomputed = PoseEngineKind::Precomputed { sidecar: "poses.json".into() };
        assert_eq!(build_engine(&precomputed, timeout).name(), "precomputed");
    }
}
