//! Capture keyframe entity model and DTOs.

use fairway_core::types::{DbId, Millis, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `capture_frames` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CaptureFrame {
    pub id: DbId,
    pub capture_id: DbId,
    pub frame_number: i32,
    pub phase: String,
    pub frame_path: String,
    pub overlay_path: Option<String>,
    pub t_ms: Millis,
    pub pose_data: serde_json::Value,
    pub created_at: Timestamp,
}

/// DTO for inserting one keyframe of a capture.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CreateCaptureFrame {
    pub frame_number: i32,
    pub phase: String,
    pub frame_path: String,
    pub overlay_path: Option<String>,
    pub t_ms: Millis,
    pub pose_data: serde_json::Value,
}
