//! Tracking and removal of scratch files created during a capture run.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::Serialize;

/// Result of a cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupSummary {
    pub removed: usize,
    /// Paths that could not be removed, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

impl CleanupSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Records every scratch path the moment it is chosen, before anything is
/// written to it, so a failure halfway through a write is still cleaned up.
///
/// Directories are removed after files, deepest first, and only when empty.
#[derive(Debug, Default)]
pub struct TempFileTracker {
    files: Mutex<Vec<PathBuf>>,
    dirs: Mutex<Vec<PathBuf>>,
}

impl TempFileTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file path and hand it back for use.
    pub fn track(&self, path: impl Into<PathBuf>) -> PathBuf {
        let path = path.into();
        lock(&self.files).push(path.clone());
        path
    }

    /// Create `dir` (and parents) and register it for removal.
    pub async fn create_dir(&self, dir: impl Into<PathBuf>) -> std::io::Result<PathBuf> {
        let dir = dir.into();
        lock(&self.dirs).push(dir.clone());
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Delete everything tracked. Already-missing paths count as removed.
    /// Failures are logged and returned, never raised.
    pub async fn cleanup(&self) -> CleanupSummary {
        let files: Vec<PathBuf> = std::mem::take(&mut *lock(&self.files));
        let mut dirs: Vec<PathBuf> = std::mem::take(&mut *lock(&self.dirs));
        let mut summary = CleanupSummary::default();

        for path in files {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => summary.removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to remove temp file"
                    );
                    summary.failed.push((path, e.to_string()));
                }
            }
        }

        dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));
        for dir in dirs {
            match tokio::fs::remove_dir(&dir).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(
                        path = %dir.display(),
                        error = %e,
                        "Failed to remove temp directory"
                    );
                    summary.failed.push((dir, e.to_string()));
                }
            }
        }

        summary
    }
}

impl Drop for TempFileTracker {
    fn drop(&mut self) {
        // Last resort for runs that unwound before reaching `cleanup`.
        let files = std::mem::take(self.files.get_mut().unwrap_or_else(|e| e.into_inner()));
        for path in files {
            let _ = std::fs::remove_file(&path);
        }
        let dirs = std::mem::take(self.dirs.get_mut().unwrap_or_else(|e| e.into_inner()));
        for dir in dirs.iter().rev() {
            let _ = std::fs::remove_dir(dir);
        }
    }
}

fn lock(m: &Mutex<Vec<PathBuf>>) -> std::sync::MutexGuard<'_, Vec<PathBuf>> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
