//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods
//! that accept `&PgPool` as the first argument.

pub mod capture_repo;
pub mod frame_repo;

pub use capture_repo::CaptureRepo;
pub use frame_repo::FrameRepo;
