//! Repository for the `captures` table.

use fairway_core::types::DbId;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::capture::{Capture, CreateCapture};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, client_capture_id, status, pose_summary, club, \
    captured_at, created_at";

/// Provides idempotent creation and lookups for capture sessions.
pub struct CaptureRepo;

impl CaptureRepo {
    /// Find a capture by its client-generated idempotency key.
    pub async fn find_by_client_id(
        pool: &PgPool,
        user_id: DbId,
        client_capture_id: Uuid,
    ) -> Result<Option<Capture>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM captures WHERE user_id = $1 AND client_capture_id = $2"
        );
        sqlx::query_as::<_, Capture>(&query)
            .bind(user_id)
            .bind(client_capture_id)
            .fetch_optional(pool)
            .await
    }

    /// Return the capture for `(user_id, client_capture_id)`, inserting it if
    /// it does not exist yet.
    ///
    /// An existing row is returned unchanged. When a concurrent attempt wins
    /// the insert race, the unique-constraint violation is swallowed and the
    /// winner's row is re-read, so callers never see the race.
    pub async fn create_or_get(
        pool: &PgPool,
        input: &CreateCapture,
    ) -> Result<Capture, sqlx::Error> {
        if let Some(existing) =
            Self::find_by_client_id(pool, input.user_id, input.client_capture_id).await?
        {
            tracing::debug!(
                capture_id = existing.id,
                client_capture_id = %input.client_capture_id,
                "Capture already exists, reusing",
            );
            return Ok(existing);
        }

        let query = format!(
            "INSERT INTO captures \
                (user_id, client_capture_id, status, pose_summary, club, captured_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, Capture>(&query)
            .bind(input.user_id)
            .bind(input.client_capture_id)
            .bind(&input.status)
            .bind(&input.pose_summary)
            .bind(&input.club)
            .bind(input.captured_at)
            .fetch_one(pool)
            .await;

        match inserted {
            Ok(capture) => Ok(capture),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                tracing::debug!(
                    client_capture_id = %input.client_capture_id,
                    "Lost capture insert race, re-reading existing row",
                );
                Self::find_by_client_id(pool, input.user_id, input.client_capture_id)
                    .await?
                    .ok_or(sqlx::Error::RowNotFound)
            }
            Err(e) => Err(e),
        }
    }

    /// Count captures for a user and idempotency key. Used to verify that
    /// retries never duplicate rows.
    pub async fn count_by_client_id(
        pool: &PgPool,
        user_id: DbId,
        client_capture_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM captures WHERE user_id = $1 AND client_capture_id = $2",
        )
        .bind(user_id)
        .bind(client_capture_id)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }
}
