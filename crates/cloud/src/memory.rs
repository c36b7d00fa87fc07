//! In-memory object store.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{validate_object_path, ObjectStore, PutOutcome, StorageError};

/// A stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Keeps objects in a map keyed by `(bucket, path)`. Nothing survives the
/// process.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    base_url: String,
    objects: Mutex<HashMap<(String, String), StoredObject>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::with_base_url("memory://")
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, bucket: &str, path: &str) -> Option<StoredObject> {
        self.lock()
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
    }

    pub fn contains(&self, bucket: &str, path: &str) -> bool {
        self.get(bucket, path).is_some()
    }

    /// Number of stored objects across all buckets.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stored keys in `bucket`, sorted.
    pub fn paths(&self, bucket: &str) -> Vec<String> {
        let mut paths: Vec<String> = self
            .lock()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, p)| p.clone())
            .collect();
        paths.sort();
        paths
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), StoredObject>> {
        // A poisoned map is still structurally valid; keep serving it.
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn put(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        overwrite: bool,
    ) -> Result<PutOutcome, StorageError> {
        validate_object_path(path)?;
        let url = self.public_url(bucket, path);
        let key = (bucket.to_string(), path.to_string());

        let mut objects = self.lock();
        if !overwrite && objects.contains_key(&key) {
            return Ok(PutOutcome::AlreadyExists { url });
        }
        objects.insert(
            key,
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(PutOutcome::Created { url })
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}{bucket}/{path}", self.base_url)
    }
}
