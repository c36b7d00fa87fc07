//! Integration tests for capture and frame persistence.
//!
//! Exercises `CaptureRepo` and `FrameRepo` against a real database:
//! - `create_or_get` is idempotent per (user_id, client_capture_id)
//! - Concurrent `create_or_get` calls resolve to one row
//! - Batch frame insert stores every frame and tolerates replays
//! - The phase check constraint rejects unknown phases
//!
//! Requires a Postgres `DATABASE_URL`; run with `cargo test -- --ignored`.

use chrono::Utc;
use fairway_db::models::capture::{CreateCapture, CAPTURE_STATUS_PROCESSED};
use fairway_db::models::frame::CreateCaptureFrame;
use fairway_db::repositories::{CaptureRepo, FrameRepo};
use sqlx::PgPool;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_capture(user_id: i64, client_capture_id: Uuid) -> CreateCapture {
    CreateCapture {
        user_id,
        client_capture_id,
        status: CAPTURE_STATUS_PROCESSED.to_string(),
        pose_summary: serde_json::json!({ "frame_count": 10 }),
        club: Some("7i".to_string()),
        captured_at: Utc::now(),
    }
}

fn new_frame(frame_number: i32, phase: &str, t_ms: i64) -> CreateCaptureFrame {
    CreateCaptureFrame {
        frame_number,
        phase: phase.to_string(),
        frame_path: format!("7/abc/frame_{t_ms}.jpg"),
        overlay_path: (frame_number % 2 == 0).then(|| format!("7/abc/overlay_{t_ms}.jpg")),
        t_ms,
        pose_data: serde_json::json!([{ "x": 0.5, "y": 0.5 }]),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_create_or_get_is_idempotent(pool: PgPool) {
    let key = Uuid::new_v4();

    let first = CaptureRepo::create_or_get(&pool, &new_capture(7, key))
        .await
        .unwrap();
    let second = CaptureRepo::create_or_get(&pool, &new_capture(7, key))
        .await
        .unwrap();

    assert!(first.id > 0);
    assert_eq!(first.id, second.id);
    assert_eq!(CaptureRepo::count_by_client_id(&pool, 7, key).await.unwrap(), 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_same_key_different_users_are_distinct(pool: PgPool) {
    let key = Uuid::new_v4();

    let a = CaptureRepo::create_or_get(&pool, &new_capture(1, key)).await.unwrap();
    let b = CaptureRepo::create_or_get(&pool, &new_capture(2, key)).await.unwrap();

    assert_ne!(a.id, b.id);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_concurrent_create_or_get_yields_one_row(pool: PgPool) {
    let key = Uuid::new_v4();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move {
                CaptureRepo::create_or_get(&pool, &new_capture(9, key))
                    .await
                    .unwrap()
                    .id
            })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }

    assert!(ids.windows(2).all(|w| w[0] == w[1]), "ids diverged: {ids:?}");
    assert_eq!(CaptureRepo::count_by_client_id(&pool, 9, key).await.unwrap(), 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_batch_insert_frames(pool: PgPool) {
    let capture = CaptureRepo::create_or_get(&pool, &new_capture(7, Uuid::new_v4()))
        .await
        .unwrap();
    let frames = vec![
        new_frame(0, "address", 150),
        new_frame(1, "backswing", 450),
        new_frame(2, "top", 900),
    ];

    let inserted = FrameRepo::create_batch(&pool, capture.id, &frames).await.unwrap();
    assert_eq!(inserted.len(), 3);

    let listed = FrameRepo::list_by_capture(&pool, capture.id).await.unwrap();
    assert_eq!(listed.len(), 3);
    assert_eq!(listed[0].phase, "address");
    assert_eq!(listed[0].overlay_path.as_deref(), Some("7/abc/overlay_150.jpg"));
    assert!(listed[1].overlay_path.is_none());
    assert_eq!(listed[2].t_ms, 900);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_batch_insert_replay_does_not_duplicate(pool: PgPool) {
    let capture = CaptureRepo::create_or_get(&pool, &new_capture(7, Uuid::new_v4()))
        .await
        .unwrap();
    let frames = vec![new_frame(0, "address", 150), new_frame(1, "top", 450)];

    FrameRepo::create_batch(&pool, capture.id, &frames).await.unwrap();
    let replayed = FrameRepo::create_batch(&pool, capture.id, &frames).await.unwrap();

    assert!(replayed.is_empty());
    assert_eq!(FrameRepo::list_by_capture(&pool, capture.id).await.unwrap().len(), 2);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_unknown_phase_rejected(pool: PgPool) {
    let capture = CaptureRepo::create_or_get(&pool, &new_capture(7, Uuid::new_v4()))
        .await
        .unwrap();

    let result = FrameRepo::create_batch(&pool, capture.id, &[new_frame(0, "waggle", 10)]).await;
    assert!(result.is_err());
}
