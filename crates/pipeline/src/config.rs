//! Capture pipeline configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use fairway_core::error::CoreError;
use fairway_core::landmarks::Handedness;
use fairway_core::storage::{StorageBackendType, DEFAULT_BUCKET};

use crate::pose::PoseEngineKind;
use crate::retry::RetryPolicy;

const DEFAULT_MAX_CONCURRENCY: usize = 4;
const DEFAULT_NETWORK_TIMEOUT_SECS: u64 = 10;
const DEFAULT_NETWORK_RETRIES: usize = 3;
const DEFAULT_POSE_URL: &str = "http://127.0.0.1:8500";
const DEFAULT_STORAGE_ROOT: &str = "./data/objects";

/// Everything needed to assemble a capture coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    pub bucket: String,
    /// Parent of the per-run scratch directories.
    pub work_dir: PathBuf,
    /// Upper bound on concurrent per-frame operations.
    pub max_concurrency: usize,
    pub render_overlays: bool,
    /// Timeout for one network call attempt.
    pub network_timeout: Duration,
    /// Extra attempts after a failed or timed-out network call.
    pub network_retries: usize,
    /// Downstream analysis endpoint. No trigger is sent when unset.
    pub analysis_url: Option<String>,
    pub pose_engine: PoseEngineKind,
    pub handedness: Handedness,
    pub storage: StorageBackendType,
    pub storage_root: PathBuf,
    pub public_base_url: Option<String>,
    /// Custom endpoint for S3-compatible services.
    pub s3_endpoint: Option<String>,
    /// Postgres URL. Captures are kept in memory when unset.
    pub database_url: Option<String>,
}

impl CaptureConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                        | Default                   |
    /// |--------------------------------|---------------------------|
    /// | `FAIRWAY_BUCKET`               | `swing-captures`          |
    /// | `FAIRWAY_WORK_DIR`             | `$TMPDIR/fairway`         |
    /// | `FAIRWAY_MAX_CONCURRENCY`      | `4`                       |
    /// | `FAIRWAY_RENDER_OVERLAYS`      | `true`                    |
    /// | `FAIRWAY_NETWORK_TIMEOUT_SECS` | `10`                      |
    /// | `FAIRWAY_NETWORK_RETRIES`      | `3`                       |
    /// | `FAIRWAY_ANALYSIS_URL`         | unset                     |
    /// | `FAIRWAY_POSE_ENGINE`          | `http`                    |
    /// | `FAIRWAY_POSE_URL`             | `http://127.0.0.1:8500`   |
    /// | `FAIRWAY_POSE_SIDECAR`         | required for `precomputed`|
    /// | `FAIRWAY_HANDEDNESS`           | `right`                   |
    /// | `FAIRWAY_STORAGE`              | `local`                   |
    /// | `FAIRWAY_STORAGE_ROOT`         | `./data/objects`          |
    /// | `FAIRWAY_PUBLIC_BASE_URL`      | unset                     |
    /// | `FAIRWAY_S3_ENDPOINT`          | unset                     |
    /// | `DATABASE_URL`                 | unset                     |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup` instead of the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bucket = get("FAIRWAY_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string());

        let work_dir = get("FAIRWAY_WORK_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("fairway"));

        let max_concurrency: usize = parse_or(
            "FAIRWAY_MAX_CONCURRENCY",
            get("FAIRWAY_MAX_CONCURRENCY"),
            DEFAULT_MAX_CONCURRENCY,
        )?;
        if max_concurrency == 0 {
            return Err(CoreError::Validation(
                "FAIRWAY_MAX_CONCURRENCY must be at least 1".to_string(),
            ));
        }

        let render_overlays = match get("FAIRWAY_RENDER_OVERLAYS") {
            None => true,
            Some(v) => parse_bool("FAIRWAY_RENDER_OVERLAYS", &v)?,
        };

        let timeout_secs: u64 = parse_or(
            "FAIRWAY_NETWORK_TIMEOUT_SECS",
            get("FAIRWAY_NETWORK_TIMEOUT_SECS"),
            DEFAULT_NETWORK_TIMEOUT_SECS,
        )?;
        if timeout_secs == 0 {
            return Err(CoreError::Validation(
                "FAIRWAY_NETWORK_TIMEOUT_SECS must be positive".to_string(),
            ));
        }

        let network_retries = parse_or(
            "FAIRWAY_NETWORK_RETRIES",
            get("FAIRWAY_NETWORK_RETRIES"),
            DEFAULT_NETWORK_RETRIES,
        )?;

        let pose_engine = match get("FAIRWAY_POSE_ENGINE").as_deref().unwrap_or("http") {
            "http" => PoseEngineKind::Http {
                url: get("FAIRWAY_POSE_URL").unwrap_or_else(|| DEFAULT_POSE_URL.to_string()),
            },
            "precomputed" => PoseEngineKind::Precomputed {
                sidecar: get("FAIRWAY_POSE_SIDECAR").map(PathBuf::from).ok_or_else(|| {
                    CoreError::Validation(
                        "FAIRWAY_POSE_SIDECAR is required when FAIRWAY_POSE_ENGINE=precomputed"
                            .to_string(),
                    )
                })?,
            },
            "fake" => PoseEngineKind::Fake,
            other => {
                return Err(CoreError::Validation(format!(
                    "Unknown pose engine '{other}'. Must be one of: http, precomputed, fake"
                )))
            }
        };

        let handedness = match get("FAIRWAY_HANDEDNESS") {
            Some(v) => Handedness::from_name(&v)?,
            None => Handedness::default(),
        };

        let storage =
            StorageBackendType::from_name(get("FAIRWAY_STORAGE").as_deref().unwrap_or("local"))?;

        Ok(Self {
            bucket,
            work_dir,
            max_concurrency,
            render_overlays,
            network_timeout: Duration::from_secs(timeout_secs),
            network_retries,
            analysis_url: get("FAIRWAY_ANALYSIS_URL"),
            pose_engine,
            handedness,
            storage,
            storage_root: get("FAIRWAY_STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_ROOT)),
            public_base_url: get("FAIRWAY_PUBLIC_BASE_URL"),
            s3_endpoint: get("FAIRWAY_S3_ENDPOINT"),
            database_url: get("DATABASE_URL"),
        })
    }

    /// Timeout-and-retry schedule for uploads and database writes.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(self.network_timeout, self.network_retries)
    }

    /// Outer bound on the whole analysis trigger, covering its own retries.
    pub fn trigger_timeout(&self) -> Duration {
        let attempts = self.network_retries as u32 + 1;
        self.network_timeout * attempts + Duration::from_secs(4 * self.network_retries as u64)
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &str,
    value: Option<String>,
    default: T,
) -> Result<T, CoreError> {
    match value {
        None => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|_| CoreError::Validation(format!("{key} has invalid value '{v}'"))),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, CoreError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(CoreError::Validation(format!(
            "{key} must be a boolean, got '{other}'"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<CaptureConfig, CoreError> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        CaptureConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bucket, "swing-captures");
        assert_eq!(config.max_concurrency, 4);
        assert!(config.render_overlays);
        assert_eq!(config.network_timeout, Duration::from_secs(10));
        assert_eq!(config.network_retries, 3);
        assert_eq!(config.analysis_url, None);
        assert_eq!(
            config.pose_engine,
            PoseEngineKind::Http { url: "http://127.0.0.1:8500".into() }
        );
        assert_eq!(config.handedness, Handedness::Right);
        assert_eq!(config.storage, StorageBackendType::Local);
        assert_eq!(config.database_url, None);
    }

    #[test]
    fn overrides() {
        let config = load(&[
            ("FAIRWAY_BUCKET", "clips"),
            ("FAIRWAY_MAX_CONCURRENCY", "2"),
            ("FAIRWAY_RENDER_OVERLAYS", "no"),
            ("FAIRWAY_POSE_ENGINE", "precomputed"),
            ("FAIRWAY_POSE_SIDECAR", "/tmp/poses.json"),
            ("FAIRWAY_HANDEDNESS", "left"),
            ("FAIRWAY_STORAGE", "memory"),
            ("FAIRWAY_ANALYSIS_URL", "http://analysis/run"),
            ("DATABASE_URL", "postgres://localhost/fairway"),
        ])
        .unwrap();

        assert_eq!(config.bucket, "clips");
        assert_eq!(config.max_concurrency, 2);
        assert!(!config.render_overlays);
        assert_eq!(
            config.pose_engine,
            PoseEngineKind::Precomputed { sidecar: "/tmp/poses.json".into() }
        );
        assert_eq!(config.handedness, Handedness::Left);
        assert_eq!(config.storage, StorageBackendType::Memory);
        assert_eq!(config.analysis_url.as_deref(), Some("http://analysis/run"));
        assert!(config.database_url.is_some());
    }

    #[test]
    fn blank_values_use_defaults() {
        let config = load(&[("FAIRWAY_BUCKET", "  "), ("FAIRWAY_ANALYSIS_URL", "")]).unwrap();
        assert_eq!(config.bucket, "swing-captures");
        assert_eq!(config.analysis_url, None);
    }

    #[test]
    fn invalid_values_are_rejected() {
        for vars in [
            vec![("FAIRWAY_MAX_CONCURRENCY", "0")],
            vec![("FAIRWAY_MAX_CONCURRENCY", "many")],
            vec![("FAIRWAY_RENDER_OVERLAYS", "sometimes")],
            vec![("FAIRWAY_NETWORK_TIMEOUT_SECS", "0")],
            vec![("FAIRWAY_POSE_ENGINE", "gpu")],
            vec![("FAIRWAY_POSE_ENGINE", "precomputed")],
            vec![("FAIRWAY_HANDEDNESS", "both")],
            vec![("FAIRWAY_STORAGE", "nfs")],
        ] {
            assert_matches!(load(&vars), Err(CoreError::Validation(_)), "{vars:?}");
        }
    }

    #[test]
    fn trigger_timeout_covers_retries() {
        let config = load(&[
            ("FAIRWAY_NETWORK_TIMEOUT_SECS", "5"),
            ("FAIRWAY_NETWORK_RETRIES", "2"),
        ])
        .unwrap();
        assert_eq!(config.trigger_timeout(), Duration::from_secs(5 * 3 + 8));
        assert_eq!(config.retry_policy().delays.len(), 2);
    }
}
