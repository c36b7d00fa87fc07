//! Idempotent persistence of captures and their keyframe rows.
//!
//! [`CaptureStore`] is the backend seam (Postgres or in-memory);
//! [`CaptureRepository`] adds per-call timeouts, retries, and the
//! frame-to-artifact consistency check on top of it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use fairway_core::landmarks::LandmarkSet;
use fairway_core::phase::Phase;
use fairway_core::storage::ArtifactKind;
use fairway_core::types::{DbId, Millis};
use fairway_db::models::capture::{Capture, CreateCapture};
use fairway_db::models::frame::{CaptureFrame, CreateCaptureFrame};
use fairway_db::repositories::{CaptureRepo, FrameRepo};
use fairway_db::DbPool;
use uuid::Uuid;

use crate::retry::{Attempt, RetryPolicy};
use crate::uploader::UploadedArtifact;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// A frame had no uploaded artifact at its timestamp.
#[derive(Debug, thiserror::Error)]
#[error("No uploaded frame artifact for keyframe at {t_ms}ms")]
pub struct MissingArtifactError {
    pub t_ms: Millis,
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error(transparent)]
    MissingArtifact(#[from] MissingArtifactError),

    #[error("{operation} failed: {source}")]
    Store {
        operation: &'static str,
        #[source]
        source: Attempt<StoreError>,
    },
}

// ---------------------------------------------------------------------------
// Backend trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait CaptureStore: Send + Sync {
    /// Return the capture for `(user_id, client_capture_id)`, inserting it
    /// when absent. A lost insert race resolves to the winner's row.
    async fn create_or_get_capture(&self, input: &CreateCapture) -> Result<Capture, StoreError>;

    /// Insert frame rows. Rows already present for `(capture_id,
    /// frame_number)` are kept. Returns the number of new rows.
    async fn insert_frames(
        &self,
        capture_id: DbId,
        rows: &[CreateCaptureFrame],
    ) -> Result<usize, StoreError>;
}

/// Postgres-backed store.
#[derive(Debug, Clone)]
pub struct PgCaptureStore {
    pool: DbPool,
}

impl PgCaptureStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CaptureStore for PgCaptureStore {
    async fn create_or_get_capture(&self, input: &CreateCapture) -> Result<Capture, StoreError> {
        Ok(CaptureRepo::create_or_get(&self.pool, input).await?)
    }

    async fn insert_frames(
        &self,
        capture_id: DbId,
        rows: &[CreateCaptureFrame],
    ) -> Result<usize, StoreError> {
        Ok(FrameRepo::create_batch(&self.pool, capture_id, rows).await?.len())
    }
}

#[derive(Debug, Default)]
struct MemoryTables {
    captures: Vec<Capture>,
    frames: Vec<CaptureFrame>,
}

/// Non-durable store with the same uniqueness rules as the Postgres schema.
#[derive(Debug, Default)]
pub struct MemoryCaptureStore {
    tables: Mutex<MemoryTables>,
}

impl MemoryCaptureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn captures(&self) -> Vec<Capture> {
        self.lock().captures.clone()
    }

    pub fn find_by_client_id(&self, user_id: DbId, client_capture_id: Uuid) -> Option<Capture> {
        self.lock()
            .captures
            .iter()
            .find(|c| c.user_id == user_id && c.client_capture_id == client_capture_id)
            .cloned()
    }

    /// Frames of one capture in frame order.
    pub fn frames(&self, capture_id: DbId) -> Vec<CaptureFrame> {
        let mut frames: Vec<CaptureFrame> = self
            .lock()
            .frames
            .iter()
            .filter(|f| f.capture_id == capture_id)
            .cloned()
            .collect();
        frames.sort_by_key(|f| f.frame_number);
        frames
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryTables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CaptureStore for MemoryCaptureStore {
    async fn create_or_get_capture(&self, input: &CreateCapture) -> Result<Capture, StoreError> {
        let mut tables = self.lock();
        if let Some(existing) = tables
            .captures
            .iter()
            .find(|c| c.user_id == input.user_id && c.client_capture_id == input.client_capture_id)
        {
            return Ok(existing.clone());
        }

        let capture = Capture {
            id: tables.captures.len() as DbId + 1,
            user_id: input.user_id,
            client_capture_id: input.client_capture_id,
            status: input.status.clone(),
            pose_summary: input.pose_summary.clone(),
            club: input.club.clone(),
            captured_at: input.captured_at,
            created_at: Utc::now(),
        };
        tables.captures.push(capture.clone());
        Ok(capture)
    }

    async fn insert_frames(
        &self,
        capture_id: DbId,
        rows: &[CreateCaptureFrame],
    ) -> Result<usize, StoreError> {
        let mut tables = self.lock();
        if !tables.captures.iter().any(|c| c.id == capture_id) {
            return Err(StoreError::Backend(format!("capture {capture_id} does not exist")));
        }

        let mut inserted = 0;
        for row in rows {
            let exists = tables
                .frames
                .iter()
                .any(|f| f.capture_id == capture_id && f.frame_number == row.frame_number);
            if exists {
                continue;
            }
            let id = tables.frames.len() as DbId + 1;
            tables.frames.push(CaptureFrame {
                id,
                capture_id,
                frame_number: row.frame_number,
                phase: row.phase.clone(),
                frame_path: row.frame_path.clone(),
                overlay_path: row.overlay_path.clone(),
                t_ms: row.t_ms,
                pose_data: row.pose_data.clone(),
                created_at: Utc::now(),
            });
            inserted += 1;
        }
        Ok(inserted)
    }
}

// ---------------------------------------------------------------------------
// Frame rows
// ---------------------------------------------------------------------------

/// One surviving keyframe ready to persist.
#[derive(Debug, Clone)]
pub struct FrameInput {
    pub frame_number: i32,
    pub t_ms: Millis,
    pub phase: Phase,
    pub landmarks: LandmarkSet,
}

/// Pair every frame with its uploaded artifacts by timestamp.
///
/// A frame without a frame artifact is a [`MissingArtifactError`]; a missing
/// overlay just leaves `overlay_path` empty.
pub fn build_frame_rows(
    frames: &[FrameInput],
    artifacts: &[UploadedArtifact],
) -> Result<Vec<CreateCaptureFrame>, MissingArtifactError> {
    let mut by_key: HashMap<(ArtifactKind, Millis), &UploadedArtifact> = HashMap::new();
    for artifact in artifacts {
        by_key.insert((artifact.kind, artifact.t_ms), artifact);
    }

    frames
        .iter()
        .map(|frame| {
            let image = by_key
                .get(&(ArtifactKind::Frame, frame.t_ms))
                .ok_or(MissingArtifactError { t_ms: frame.t_ms })?;
            let overlay = by_key.get(&(ArtifactKind::Overlay, frame.t_ms));
            Ok(CreateCaptureFrame {
                frame_number: frame.frame_number,
                phase: frame.phase.name().to_string(),
                frame_path: image.storage_path.clone(),
                overlay_path: overlay.map(|a| a.storage_path.clone()),
                t_ms: frame.t_ms,
                pose_data: serde_json::json!({
                    "t_ms": frame.t_ms,
                    "phase": frame.phase,
                    "landmarks": frame.landmarks,
                }),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// CaptureRepository
// ---------------------------------------------------------------------------

pub struct CaptureRepository {
    store: Arc<dyn CaptureStore>,
    policy: RetryPolicy,
}

impl CaptureRepository {
    pub fn new(store: Arc<dyn CaptureStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Idempotently create the capture row and return its id.
    pub async fn create_or_get_capture(
        &self,
        input: &CreateCapture,
    ) -> Result<DbId, RepositoryError> {
        let capture = self
            .policy
            .run("create_or_get_capture", is_retryable, || {
                self.store.create_or_get_capture(input)
            })
            .await
            .map_err(|source| RepositoryError::Store {
                operation: "create_or_get_capture",
                source,
            })?;
        Ok(capture.id)
    }

    /// Match frames to artifacts and batch-insert the rows.
    pub async fn insert_frames(
        &self,
        capture_id: DbId,
        frames: &[FrameInput],
        artifacts: &[UploadedArtifact],
    ) -> Result<usize, RepositoryError> {
        let rows = build_frame_rows(frames, artifacts)?;
        let inserted = self
            .policy
            .run("insert_frames", is_retryable, || {
                self.store.insert_frames(capture_id, &rows)
            })
            .await
            .map_err(|source| RepositoryError::Store {
                operation: "insert_frames",
                source,
            })?;
        if inserted < rows.len() {
            tracing::debug!(
                capture_id,
                inserted,
                total = rows.len(),
                "Some frame rows already existed"
            );
        }
        Ok(inserted)
    }
}

/// Connection-level failures are worth retrying; constraint and decode
/// errors are not.
fn is_retryable(e: &StoreError) -> bool {
    match e {
        StoreError::Database(err) => matches!(
            err,
            sqlx::Error::Io(_)
                | sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::Tls(_)
        ),
        StoreError::Backend(_) => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
