//! Assemble a coordinator from [`CaptureConfig`].

use std::sync::Arc;

use fairway_cloud::{LocalObjectStore, MemoryObjectStore, ObjectStore, S3ObjectStore};
use fairway_core::storage::StorageBackendType;
use fairway_events::{AnalysisTrigger, HttpAnalysisTrigger, TriggerError};

use crate::config::CaptureConfig;
use crate::coordinator::{CaptureCoordinator, CoordinatorSettings};
use crate::overlay::OverlayRenderer;
use crate::pose::build_engine;
use crate::sampler::{FfmpegFrameSource, VideoFrameSampler};
use crate::store::{CaptureRepository, CaptureStore, MemoryCaptureStore, PgCaptureStore};
use crate::uploader::ArtifactUploader;

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("Database connection failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Analysis trigger setup failed: {0}")]
    Trigger(#[from] TriggerError),
}

/// Build the configured object store.
pub async fn build_object_store(config: &CaptureConfig) -> Arc<dyn ObjectStore> {
    tracing::info!(
        backend = config.storage.label(),
        bucket = %config.bucket,
        "Object storage selected"
    );
    match config.storage {
        StorageBackendType::S3 => {
            let endpoint = config.s3_endpoint.clone();
            Arc::new(S3ObjectStore::from_env(endpoint, config.public_base_url.clone()).await)
        }
        StorageBackendType::Local => Arc::new(LocalObjectStore::new(
            config.storage_root.clone(),
            config.public_base_url.clone(),
        )),
        StorageBackendType::Memory => Arc::new(MemoryObjectStore::new()),
    }
}

/// Connect to Postgres when `DATABASE_URL` is set, otherwise keep captures in
/// memory for this process.
pub async fn build_capture_store(
    config: &CaptureConfig,
) -> Result<Arc<dyn CaptureStore>, SetupError> {
    match &config.database_url {
        Some(url) => {
            let pool = fairway_db::create_pool(url).await?;
            fairway_db::health_check(&pool).await?;
            fairway_db::run_migrations(&pool).await?;
            tracing::info!("Database connected and migrations applied");
            Ok(Arc::new(PgCaptureStore::new(pool)))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, captures will not outlive this process");
            Ok(Arc::new(MemoryCaptureStore::new()))
        }
    }
}

pub fn build_trigger(
    config: &CaptureConfig,
) -> Result<Option<Arc<dyn AnalysisTrigger>>, SetupError> {
    let Some(url) = &config.analysis_url else {
        return Ok(None);
    };
    let trigger =
        HttpAnalysisTrigger::new(url.clone(), config.network_timeout, config.network_retries)?;
    Ok(Some(Arc::new(trigger)))
}

/// Wire every collaborator the configuration names.
pub async fn build_coordinator(config: &CaptureConfig) -> Result<CaptureCoordinator, SetupError> {
    let engine = build_engine(&config.pose_engine, config.network_timeout);
    tracing::info!(
        engine = config.pose_engine.name(),
        handedness = config.handedness.name(),
        "Pose engine selected"
    );

    let store = build_object_store(config).await;
    let captures = build_capture_store(config).await?;

    Ok(CaptureCoordinator::new(
        engine,
        VideoFrameSampler::new(Arc::new(FfmpegFrameSource)),
        config.render_overlays.then(OverlayRenderer::new),
        ArtifactUploader::new(store, config.bucket.clone(), config.retry_policy()),
        CaptureRepository::new(captures, config.retry_policy()),
        build_trigger(config)?,
        CoordinatorSettings {
            work_dir: config.work_dir.clone(),
            max_concurrency: config.max_concurrency,
            handedness: config.handedness,
            trigger_timeout: config.trigger_timeout(),
        },
    ))
}
