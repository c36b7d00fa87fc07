//! `fairway-worker` -- process one recorded swing end to end.
//!
//! Samples keyframes from the video, detects poses, renders overlays,
//! uploads artifacts, persists the capture and notifies downstream
//! analysis. The run report is printed to stdout as JSON; the process
//! exits non-zero when the capture fails.
//!
//! Configuration comes from the environment (see
//! [`fairway_pipeline::CaptureConfig::from_env`]); a `.env` file is loaded
//! first when present.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use fairway_core::landmarks::Handedness;
use fairway_pipeline::{setup, CaptureConfig, CaptureRequest};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "fairway-worker", version, about = "Process a golf swing capture")]
struct Cli {
    /// Recorded swing video.
    video: PathBuf,

    /// Owner of the capture.
    #[arg(long)]
    user_id: i64,

    /// Clip length in milliseconds; probed with ffprobe when omitted.
    #[arg(long)]
    duration_ms: Option<i64>,

    /// Club used for the swing.
    #[arg(long)]
    club: Option<String>,

    /// Key of an earlier attempt to resume instead of starting a new capture.
    #[arg(long)]
    capture_id: Option<Uuid>,

    /// Override FAIRWAY_HANDEDNESS for this capture.
    #[arg(long, value_parser = parse_handedness)]
    handedness: Option<Handedness>,

    /// Skip skeleton overlay rendering.
    #[arg(long)]
    no_overlays: bool,

    /// Log as JSON lines instead of human-readable text.
    #[arg(long)]
    json_logs: bool,
}

fn parse_handedness(value: &str) -> Result<Handedness, String> {
    Handedness::from_name(value).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let mut config = CaptureConfig::from_env().context("Invalid configuration")?;
    if cli.no_overlays {
        config.render_overlays = false;
    }
    if let Some(handedness) = cli.handedness {
        config.handedness = handedness;
    }

    tracing::info!(
        pose_engine = config.pose_engine.name(),
        storage = config.storage.label(),
        bucket = %config.bucket,
        concurrency = config.max_concurrency,
        overlays = config.render_overlays,
        "Worker starting"
    );

    let mut coordinator = setup::build_coordinator(&config)
        .await
        .context("Failed to assemble capture pipeline")?;

    let request = CaptureRequest {
        duration_ms: cli.duration_ms,
        club: cli.club,
        client_capture_id: cli.capture_id,
        ..CaptureRequest::new(cli.video, cli.user_id)
    };

    let progress = |stage: &str, fraction: f64| {
        tracing::info!(stage, percent = (fraction * 100.0).round(), "Progress");
    };
    let outcome = coordinator.run(request, &progress).await;
    coordinator.dispose().await;

    match outcome {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report.to_json())?);
            Ok(())
        }
        Err(failure) => {
            println!("{}", serde_json::to_string_pretty(&failure.report.to_json())?);
            tracing::error!(
                client_capture_id = %failure.report.client_capture_id,
                "Rerun with --capture-id {} to resume",
                failure.report.client_capture_id
            );
            Err(anyhow::Error::new(failure))
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fairway_worker=debug,fairway_pipeline=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
