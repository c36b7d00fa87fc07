//! Local filesystem object store.
//!
//! Objects live at `{root}/{bucket}/{path}`. Bytes are first written to a
//! uniquely named sibling file and then hard-linked into place, so a reader
//! never sees a half-written object and a concurrent writer to the same key
//! loses cleanly with [`PutOutcome::AlreadyExists`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

use crate::{validate_object_path, ObjectStore, PutOutcome, StorageError};

#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    base_url: Option<String>,
}

impl LocalObjectStore {
    /// `base_url`, when set, is the HTTP prefix the root directory is served
    /// under. Otherwise URLs are `file://` paths.
    pub fn new(root: impl Into<PathBuf>, base_url: Option<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of an object on disk.
    pub fn object_path(&self, bucket: &str, path: &str) -> PathBuf {
        self.root.join(bucket).join(path)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn put(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
        overwrite: bool,
    ) -> Result<PutOutcome, StorageError> {
        validate_object_path(path)?;
        validate_object_path(bucket)?;

        let target = self.object_path(bucket, path);
        let url = self.public_url(bucket, path);

        if !overwrite && tokio::fs::try_exists(&target).await? {
            return Ok(PutOutcome::AlreadyExists { url });
        }

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let staging = target.with_extension(format!("{}.partial", Uuid::new_v4().simple()));
        tokio::fs::write(&staging, &bytes).await?;

        let result = if overwrite {
            tokio::fs::rename(&staging, &target).await
        } else {
            tokio::fs::hard_link(&staging, &target).await
        };

        if !overwrite {
            discard_staging(&staging).await;
        }

        match result {
            Ok(()) => Ok(PutOutcome::Created { url }),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                tracing::debug!(bucket, path, "Object already present, keeping existing bytes");
                Ok(PutOutcome::AlreadyExists { url })
            }
            Err(e) => {
                if overwrite {
                    discard_staging(&staging).await;
                }
                Err(StorageError::Io(e))
            }
        }
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        match &self.base_url {
            Some(base) => format!("{base}/{bucket}/{path}"),
            None => format!("file://{}", self.object_path(bucket, path).display()),
        }
    }
}

async fn discard_staging(staging: &Path) {
    if let Err(e) = tokio::fs::remove_file(staging).await {
        tracing::warn!(path = %staging.display(), error = %e, "Failed to remove staging file");
    }
}
