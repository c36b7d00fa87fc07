//! Repository for the `capture_frames` table.

use fairway_core::types::{DbId, Millis};
use sqlx::PgPool;

use crate::models::frame::{CaptureFrame, CreateCaptureFrame};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, capture_id, frame_number, phase, frame_path, overlay_path, \
    t_ms, pose_data, created_at";

/// Provides batch insertion and listing of capture keyframes.
pub struct FrameRepo;

impl FrameRepo {
    /// Batch-insert all keyframes for a capture in one statement.
    ///
    /// Frames already present for `(capture_id, frame_number)` are left
    /// untouched, so replaying a capture with the same idempotency key does
    /// not duplicate rows. Returns only the newly inserted rows.
    pub async fn create_batch(
        pool: &PgPool,
        capture_id: DbId,
        frames: &[CreateCaptureFrame],
    ) -> Result<Vec<CaptureFrame>, sqlx::Error> {
        if frames.is_empty() {
            return Ok(vec![]);
        }

        // Build a multi-row INSERT using unnest for efficiency.
        let numbers: Vec<i32> = frames.iter().map(|f| f.frame_number).collect();
        let phases: Vec<String> = frames.iter().map(|f| f.phase.clone()).collect();
        let frame_paths: Vec<String> = frames.iter().map(|f| f.frame_path.clone()).collect();
        let overlay_paths: Vec<Option<String>> =
            frames.iter().map(|f| f.overlay_path.clone()).collect();
        let offsets: Vec<Millis> = frames.iter().map(|f| f.t_ms).collect();
        let pose_data: Vec<serde_json::Value> =
            frames.iter().map(|f| f.pose_data.clone()).collect();

        let query = format!(
            "INSERT INTO capture_frames \
                (capture_id, frame_number, phase, frame_path, overlay_path, t_ms, pose_data) \
             SELECT $1::bigint, f.* FROM UNNEST($2::int[], $3::text[], $4::text[], $5::text[], \
                                        $6::bigint[], $7::jsonb[]) AS f \
             ON CONFLICT (capture_id, frame_number) DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CaptureFrame>(&query)
            .bind(capture_id)
            .bind(&numbers)
            .bind(&phases)
            .bind(&frame_paths)
            .bind(&overlay_paths)
            .bind(&offsets)
            .bind(&pose_data)
            .fetch_all(pool)
            .await
    }

    /// List all keyframes of a capture in frame order.
    pub async fn list_by_capture(
        pool: &PgPool,
        capture_id: DbId,
    ) -> Result<Vec<CaptureFrame>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM capture_frames \
             WHERE capture_id = $1 \
             ORDER BY frame_number"
        );
        sqlx::query_as::<_, CaptureFrame>(&query)
            .bind(capture_id)
            .fetch_all(pool)
            .await
    }
}
