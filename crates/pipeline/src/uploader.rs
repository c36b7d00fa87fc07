//! Idempotent artifact uploads.
//!
//! Object keys come from [`artifact_path`], so a retried capture with the
//! same `client_capture_id` writes to the same keys and finds the previous
//! attempt's objects already in place.

use std::path::Path;
use std::sync::Arc;

use fairway_cloud::{ObjectStore, PutOutcome, StorageError};
use fairway_core::storage::{artifact_path, ArtifactKind};
use fairway_core::types::{DbId, Millis};
use serde::Serialize;
use uuid::Uuid;

use crate::retry::{Attempt, RetryPolicy};

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Failed to read artifact {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Upload of {path} failed: {source}")]
    Storage {
        path: String,
        #[source]
        source: Attempt<StorageError>,
    },
}

/// A stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedArtifact {
    #[serde(skip)]
    pub kind: ArtifactKind,
    pub t_ms: Millis,
    pub storage_path: String,
    pub public_url: String,
    /// `false` when a previous attempt had already stored it.
    pub created: bool,
}

pub struct ArtifactUploader {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    policy: RetryPolicy,
}

impl ArtifactUploader {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            policy,
        }
    }

    /// Store `bytes` at `path` without overwriting. An existing object is
    /// reported as success.
    pub async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<PutOutcome, UploadError> {
        let outcome = self
            .policy
            .run(
                "artifact_upload",
                |e: &StorageError| !matches!(e, StorageError::InvalidPath(_)),
                || self.store.put(&self.bucket, path, bytes.clone(), content_type, false),
            )
            .await
            .map_err(|source| UploadError::Storage {
                path: path.to_string(),
                source,
            })?;

        if let PutOutcome::AlreadyExists { .. } = outcome {
            tracing::debug!(
                bucket = %self.bucket,
                path,
                "Artifact already uploaded by a previous attempt"
            );
        }
        Ok(outcome)
    }

    /// Upload the local file for one keyframe artifact to its deterministic key.
    pub async fn upload_file(
        &self,
        user_id: DbId,
        client_capture_id: Uuid,
        kind: ArtifactKind,
        t_ms: Millis,
        file: &Path,
    ) -> Result<UploadedArtifact, UploadError> {
        let bytes = tokio::fs::read(file).await.map_err(|source| UploadError::Read {
            path: file.display().to_string(),
            source,
        })?;
        let storage_path = artifact_path(user_id, client_capture_id, kind, t_ms);
        let outcome = self.upload(&storage_path, bytes, kind.content_type()).await?;

        Ok(UploadedArtifact {
            kind,
            t_ms,
            created: matches!(outcome, PutOutcome::Created { .. }),
            public_url: outcome.url().to_string(),
            storage_path,
        })
    }
}
