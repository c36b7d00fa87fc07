//! Downstream notifications emitted once a capture is persisted.
//!
//! - [`AnalysisTrigger`] -- the seam the capture pipeline calls after the
//!   frame rows are written.
//! - [`HttpAnalysisTrigger`] -- POSTs `{"capture_id": n}` to the analysis
//!   service with per-attempt timeout and backoff retry.

pub mod trigger;

pub use trigger::{AnalysisTrigger, HttpAnalysisTrigger, TriggerError};
