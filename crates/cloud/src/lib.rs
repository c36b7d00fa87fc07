//! Object storage backends for capture artifacts.
//!
//! Every backend implements [`ObjectStore`]. Writes with `overwrite = false`
//! never replace an existing object; instead they report
//! [`PutOutcome::AlreadyExists`], which callers treat as "a previous
//! attempt already uploaded this".
//!
//! - [`s3::S3ObjectStore`] -- S3 or any S3-compatible service, using
//!   conditional `If-None-Match: *` puts.
//! - [`local::LocalObjectStore`] -- a directory tree on local disk.
//! - [`memory::MemoryObjectStore`] -- non-durable, for tests and dry runs.

pub mod local;
pub mod memory;
pub mod s3;

use async_trait::async_trait;

pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The object key is empty or tries to escape its bucket.
    #[error("Invalid object path '{0}'")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote service rejected or failed the request.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

// ---------------------------------------------------------------------------
// ObjectStore
// ---------------------------------------------------------------------------

/// Result of a successful put.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutOutcome {
    /// The object was written by this call.
    Created { url: String },
    /// An object already existed at the path and was left untouched.
    AlreadyExists { url: String },
}

impl PutOutcome {
    pub fn url(&self) -> &str {
        match self {
            Self::Created { url } | Self::AlreadyExists { url } => url,
        }
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Write `bytes` to `bucket/path`.
    ///
    /// With `overwrite == false` an existing object is never replaced and
    /// the call returns [`PutOutcome::AlreadyExists`].
    async fn put(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        overwrite: bool,
    ) -> Result<PutOutcome, StorageError>;

    /// Public URL an object at `bucket/path` is served from.
    fn public_url(&self, bucket: &str, path: &str) -> String;
}

/// Reject empty keys, absolute keys, and `..` segments.
pub fn validate_object_path(path: &str) -> Result<(), StorageError> {
    let invalid = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if invalid {
        Err(StorageError::InvalidPath(path.to_string()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_artifact_paths() {
        assert!(validate_object_path("7/6f1c2a4e/frame_150.jpg").is_ok());
    }

    #[test]
    fn rejects_escaping_paths() {
        for bad in ["", "/abs/frame.jpg", "7/../../etc/passwd", "7//frame.jpg", "a\\b.jpg", "./x"] {
            assert!(validate_object_path(bad).is_err(), "{bad} accepted");
        }
    }

    #[test]
    fn outcome_url() {
        let created = PutOutcome::Created { url: "u1".into() };
        let existing = PutOutcome::AlreadyExists { url: "u2".into() };
        assert_eq!(created.url(), "u1");
        assert_eq!(existing.url(), "u2");
    }
}
