//! Pure domain logic for swing captures.
//!
//! Nothing in this crate touches the database, object storage, or the
//! network. Everything here is deterministic and unit-testable:
//!
//! - [`sampling`] -- which timestamps of a swing video to sample.
//! - [`landmarks`] -- the 33-point pose topology and per-frame landmark sets.
//! - [`phase`] -- heuristic swing-phase tagging.
//! - [`metrics`] -- scalar swing metrics derived from tagged frames.
//! - [`summary`] -- the compact pose summary stored on a capture row.
//! - [`storage`] -- deterministic artifact paths and storage backend names.
//! - [`ffmpeg`] -- ffprobe/ffmpeg child-process helpers.

pub mod error;
pub mod ffmpeg;
pub mod landmarks;
pub mod metrics;
pub mod phase;
pub mod sampling;
pub mod storage;
pub mod summary;
pub mod types;
