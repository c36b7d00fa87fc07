//! Artifact naming and storage backend identifiers.
//!
//! Artifact paths are derived from the client-generated capture id, never
//! from the database row id, so every retry of the same capture lands on
//! the same object keys.

use uuid::Uuid;

use crate::error::CoreError;
use crate::types::{DbId, Millis};

/// Default bucket for capture artifacts.
pub const DEFAULT_BUCKET: &str = "swing-captures";

// ---------------------------------------------------------------------------
// Artifact kinds
// ---------------------------------------------------------------------------

/// The kinds of image a capture uploads per keyframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// The extracted still frame.
    Frame,
    /// The frame with a skeleton drawn on it.
    Overlay,
}

impl ArtifactKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Frame => "frame",
            Self::Overlay => "overlay",
        }
    }

    pub fn extension(self) -> &'static str {
        "jpg"
    }

    pub fn content_type(self) -> &'static str {
        "image/jpeg"
    }
}

/// Object key for one artifact: `{user_id}/{client_capture_id}/{kind}_{t_ms}.{ext}`.
pub fn artifact_path(
    user_id: DbId,
    client_capture_id: Uuid,
    kind: ArtifactKind,
    t_ms: Millis,
) -> String {
    format!(
        "{user_id}/{client_capture_id}/{}_{t_ms}.{}",
        kind.name(),
        kind.extension()
    )
}

// ---------------------------------------------------------------------------
// Backend types
// ---------------------------------------------------------------------------

/// Object storage backend selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackendType {
    S3,
    Local,
    Memory,
}

impl StorageBackendType {
    /// Parse from a configuration value.
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "s3" => Ok(Self::S3),
            "local" => Ok(Self::Local),
            "memory" => Ok(Self::Memory),
            other => Err(CoreError::Validation(format!(
                "Unknown storage backend '{other}'. Must be one of: s3, local, memory"
            ))),
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::S3 => "Amazon S3 / Compatible",
            Self::Local => "Local Filesystem",
            Self::Memory => "In-Memory (non-durable)",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_path_is_deterministic() {
        let id = Uuid::parse_str("6f1c2a4e-8d4b-4f3e-9a51-1b2c3d4e5f60").unwrap();
        let path = artifact_path(42, id, ArtifactKind::Frame, 1375);
        assert_eq!(path, "42/6f1c2a4e-8d4b-4f3e-9a51-1b2c3d4e5f60/frame_1375.jpg");
        assert_eq!(path, artifact_path(42, id, ArtifactKind::Frame, 1375));
    }

    #[test]
    fn overlay_and_frame_paths_differ() {
        let id = Uuid::new_v4();
        assert_ne!(
            artifact_path(1, id, ArtifactKind::Frame, 100),
            artifact_path(1, id, ArtifactKind::Overlay, 100)
        );
    }

    #[test]
    fn backend_type_from_name() {
        assert_eq!(StorageBackendType::from_name("s3").unwrap(), StorageBackendType::S3);
        assert_eq!(StorageBackendType::from_name("local").unwrap(), StorageBackendType::Local);
        assert_eq!(StorageBackendType::from_name("memory").unwrap(), StorageBackendType::Memory);
        assert!(StorageBackendType::from_name("nfs").is_err());
    }

    #[test]
    fn backend_type_labels() {
        assert_eq!(StorageBackendType::S3.label(), "Amazon S3 / Compatible");
        assert_eq!(StorageBackendType::Local.label(), "Local Filesystem");
    }
}
