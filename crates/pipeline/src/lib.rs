//! The swing-capture processing pipeline.
//!
//! A [`CaptureCoordinator`] takes one swing video through keyframe sampling,
//! pose detection, phase tagging, optional overlay rendering, metrics,
//! idempotent persistence, and the downstream analysis trigger.
//!
//! Collaborators sit behind traits so each can be swapped:
//! [`sampler::FrameSource`], [`pose::PoseEngine`], [`fairway_cloud::ObjectStore`],
//! [`store::CaptureStore`], and [`fairway_events::AnalysisTrigger`].

pub mod config;
pub mod coordinator;
pub mod error;
pub mod overlay;
pub mod pose;
pub mod report;
pub mod retry;
pub mod sampler;
pub mod setup;
pub mod stage;
pub mod store;
pub mod temp;
pub mod uploader;

pub use config::CaptureConfig;
pub use coordinator::{CaptureCoordinator, CaptureRequest, CoordinatorSettings};
pub use error::{CaptureError, CaptureFailure};
pub use report::{CaptureReport, DegradedEvent, StageStatus};
pub use stage::CaptureStage;
