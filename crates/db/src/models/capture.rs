//! Capture session entity model and DTOs.

use fairway_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Status written when a capture's frames and metrics have been persisted.
pub const CAPTURE_STATUS_PROCESSED: &str = "processed";

/// A row from the `captures` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Capture {
    pub id: DbId,
    pub user_id: DbId,
    pub client_capture_id: Uuid,
    pub status: String,
    pub pose_summary: serde_json::Value,
    pub club: Option<String>,
    pub captured_at: Timestamp,
    pub created_at: Timestamp,
}

/// DTO for creating a capture.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCapture {
    pub user_id: DbId,
    pub client_capture_id: Uuid,
    pub status: String,
    pub pose_summary: serde_json::Value,
    pub club: Option<String>,
    pub captured_at: Timestamp,
}
