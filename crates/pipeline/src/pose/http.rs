//! Native pose detector reached over HTTP.
//!
//! The sidecar exposes `GET /health` (200 once its model is loaded) and
//! `POST /detect` taking a multipart `image` part and answering
//! `{"landmarks": [...]}` or `{"landmarks": null}` when nobody is in frame.

use std::time::Duration;

use async_trait::async_trait;
use fairway_core::landmarks::{Landmark, LandmarkSet};
use serde::Deserialize;

use super::{PoseEngine, PoseError};
use crate::sampler::Keyframe;

#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    landmarks: Option<Vec<Landmark>>,
}

pub struct HttpPoseEngine {
    base_url: String,
    timeout: Duration,
    client: Option<reqwest::Client>,
}

impl HttpPoseEngine {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            client: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.client.is_some()
    }
}

#[async_trait]
impl PoseEngine for HttpPoseEngine {
    fn name(&self) -> &str {
        "http"
    }

    async fn initialize(&mut self) -> Result<(), PoseError> {
        if self.client.is_some() {
            return Ok(());
        }

        let client = reqwest::Client::builder().timeout(self.timeout).build()?;
        let response = client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(|e| PoseError::Initialization(e.to_string()))?;
        if !response.status().is_success() {
            return Err(PoseError::Initialization(format!(
                "health check returned HTTP {}",
                response.status().as_u16()
            )));
        }

        tracing::info!(url = %self.base_url, "Pose sidecar ready");
        self.client = Some(client);
        Ok(())
    }

    async fn detect(&self, frame: &Keyframe) -> Result<LandmarkSet, PoseError> {
        let client = self.client.as_ref().ok_or(PoseError::NotInitialized)?;

        let bytes = tokio::fs::read(&frame.path).await?;
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(format!("frame_{}.jpg", frame.t_ms))
            .mime_str("image/jpeg")?;
        let form = reqwest::multipart::Form::new().part("image", part);

        let response = client
            .post(format!("{}/detect", self.base_url))
            .multipart(form)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(PoseError::HttpStatus(response.status().as_u16()));
        }

        let body: DetectResponse = response.json().await?;
        parse_landmarks(body, frame)
    }

    async fn dispose(&mut self) {
        self.client = None;
    }
}

fn parse_landmarks(body: DetectResponse, frame: &Keyframe) -> Result<LandmarkSet, PoseError> {
    match body.landmarks {
        Some(points) if !points.is_empty() => {
            LandmarkSet::new(points).map_err(|e| PoseError::InvalidOutput(e.to_string()))
        }
        _ => Err(PoseError::PoseNotDetected { t_ms: frame.t_ms }),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use fairway_core::landmarks::LANDMARK_COUNT;

    use super::*;

    fn keyframe() -> Keyframe {
        Keyframe {
            index: 0,
            t_ms: 150,
            path: "frame_150.jpg".into(),
        }
    }

    #[test]
    fn null_landmarks_mean_no_pose() {
        let body: DetectResponse = serde_json::from_str(r#"{"landmarks": null}"#).unwrap();
        assert_matches!(
            parse_landmarks(body, &keyframe()),
            Err(PoseError::PoseNotDetected { t_ms: 150 })
        );

        let body: DetectResponse = serde_json::from_str("{}").unwrap();
        assert_matches!(parse_landmarks(body, &keyframe()), Err(PoseError::PoseNotDetected { .. }));
    }

    #[test]
    fn partial_skeleton_is_invalid() {
        let body: DetectResponse =
            serde_json::from_str(r#"{"landmarks": [{"x": 0.1, "y": 0.2, "z": 0.0}]}"#).unwrap();
        assert_matches!(parse_landmarks(body, &keyframe()), Err(PoseError::InvalidOutput(_)));
    }

    #[test]
    fn full_skeleton_parses() {
        let point = serde_json::json!({"x": 0.5, "y": 0.5, "z": 0.0, "visibility": 0.9});
        let points = vec![point; LANDMARK_COUNT];
        let body: DetectResponse =
            serde_json::from_value(serde_json::json!({ "landmarks": points })).unwrap();
        let set = parse_landmarks(body, &keyframe()).unwrap();
        assert_eq!(set.points().len(), LANDMARK_COUNT);
    }

    #[tokio::test]
    async fn detect_before_initialize_fails() {
        let engine = HttpPoseEngine::new("http://127.0.0.1:9/", Duration::from_secs(1));
        assert!(!engine.is_initialized());
        assert_matches!(engine.detect(&keyframe()).await, Err(PoseError::NotInitialized));
    }
}
