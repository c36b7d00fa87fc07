#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use fairway_cloud::{MemoryObjectStore, ObjectStore, PutOutcome, StorageError};
use fairway_core::ffmpeg::FfmpegError;
use fairway_core::landmarks::{Handedness, LandmarkSet};
use fairway_core::types::{DbId, Millis};
use fairway_events::{AnalysisTrigger, TriggerError};
use fairway_pipeline::overlay::OverlayRenderer;
use fairway_pipeline::pose::fake::FakeEngineStats;
use fairway_pipeline::pose::{FakePoseEngine, PoseEngine, PoseError};
use fairway_pipeline::retry::RetryPolicy;
use fairway_pipeline::sampler::{FrameSource, Keyframe, VideoFrameSampler};
use fairway_pipeline::store::{CaptureRepository, MemoryCaptureStore};
use fairway_pipeline::uploader::ArtifactUploader;
use fairway_pipeline::{CaptureCoordinator, CoordinatorSettings};
use image::{Rgb, RgbImage};

pub const BUCKET: &str = "swing-captures";

/// Keyframe offsets of a 3000 ms clip.
pub const T_3000: [Millis; 10] = [150, 450, 900, 1350, 1650, 1950, 2160, 2340, 2550, 2850];

// ---------------------------------------------------------------------------
// Frame source
// ---------------------------------------------------------------------------

/// Writes a small gradient JPEG for every requested timestamp.
#[derive(Default)]
pub struct SyntheticFrameSource {
    pub duration_ms: Millis,
    /// Extraction fails at these timestamps.
    pub fail_at: HashSet<Millis>,
    /// These timestamps get bytes no decoder accepts.
    pub corrupt_at: HashSet<Millis>,
}

impl SyntheticFrameSource {
    pub fn new(duration_ms: Millis) -> Self {
        Self {
            duration_ms,
            ..Default::default()
        }
    }
}

#[async_trait]
impl FrameSource for SyntheticFrameSource {
    async fn probe_duration_ms(&self, _video: &Path) -> Result<Millis, FfmpegError> {
        Ok(self.duration_ms)
    }

    async fn extract_frame(
        &self,
        _video: &Path,
        output: &Path,
        t_ms: Millis,
    ) -> Result<(), FfmpegError> {
        if self.fail_at.contains(&t_ms) {
            return Err(FfmpegError::ExecutionFailed {
                exit_code: Some(1),
                stderr: format!("seek to {t_ms}ms failed"),
            });
        }
        if self.corrupt_at.contains(&t_ms) {
            std::fs::write(output, b"not a jpeg")?;
            return Ok(());
        }
        let shade = (t_ms % 255) as u8;
        let frame = RgbImage::from_fn(64, 48, |x, y| Rgb([shade, (x * 4) as u8, (y * 5) as u8]));
        frame
            .save(output)
            .map_err(|e| FfmpegError::ParseError(e.to_string()))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Object store that refuses frame uploads
// ---------------------------------------------------------------------------

pub struct RejectingObjectStore {
    pub inner: MemoryObjectStore,
    /// Paths containing this fragment fail.
    pub reject: String,
    pub attempts: AtomicUsize,
}

impl RejectingObjectStore {
    pub fn new(reject: &str) -> Self {
        Self {
            inner: MemoryObjectStore::new(),
            reject: reject.to_string(),
            attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ObjectStore for RejectingObjectStore {
    fn name(&self) -> &str {
        "rejecting"
    }

    async fn put(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        overwrite: bool,
    ) -> Result<PutOutcome, StorageError> {
        if path.contains(&self.reject) {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            return Err(StorageError::Backend("503 Slow Down".into()));
        }
        self.inner.put(bucket, path, bytes, content_type, overwrite).await
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        self.inner.public_url(bucket, path)
    }
}

// ---------------------------------------------------------------------------
// Analysis trigger
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingTrigger {
    pub fail: bool,
    pub calls: Mutex<Vec<DbId>>,
}

impl RecordingTrigger {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<DbId> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalysisTrigger for RecordingTrigger {
    async fn trigger(&self, capture_id: DbId) -> Result<(), TriggerError> {
        self.calls.lock().unwrap().push(capture_id);
        if self.fail {
            Err(TriggerError::HttpStatus(503))
        } else {
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Engine that measures its own concurrency
// ---------------------------------------------------------------------------

pub struct SlowEngine {
    pub inner: FakePoseEngine,
    pub in_flight: Arc<AtomicUsize>,
    pub peak: Arc<AtomicUsize>,
}

#[async_trait]
impl PoseEngine for SlowEngine {
    fn name(&self) -> &str {
        "slow"
    }

    async fn initialize(&mut self) -> Result<(), PoseError> {
        self.inner.initialize().await
    }

    async fn detect(&self, frame: &Keyframe) -> Result<LandmarkSet, PoseError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let result = self.inner.detect(frame).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn dispose(&mut self) {
        self.inner.dispose().await
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub coordinator: CaptureCoordinator,
    pub objects: Arc<MemoryObjectStore>,
    pub captures: Arc<MemoryCaptureStore>,
    pub trigger: Arc<RecordingTrigger>,
    pub work_dir: tempfile::TempDir,
    pub video: PathBuf,
}

pub struct HarnessBuilder {
    engine: Box<dyn PoseEngine>,
    source: SyntheticFrameSource,
    overlays: bool,
    trigger: RecordingTrigger,
    object_store: Option<Arc<dyn ObjectStore>>,
    max_concurrency: usize,
    handedness: Handedness,
    shared: Option<(Arc<MemoryObjectStore>, Arc<MemoryCaptureStore>)>,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            engine: Box::new(FakePoseEngine::new()),
            source: SyntheticFrameSource::new(3000),
            overlays: true,
            trigger: RecordingTrigger::default(),
            object_store: None,
            max_concurrency: 4,
            handedness: Handedness::Right,
            shared: None,
        }
    }

    pub fn engine(mut self, engine: impl PoseEngine + 'static) -> Self {
        self.engine = Box::new(engine);
        self
    }

    pub fn source(mut self, source: SyntheticFrameSource) -> Self {
        self.source = source;
        self
    }

    pub fn overlays(mut self, enabled: bool) -> Self {
        self.overlays = enabled;
        self
    }

    pub fn trigger(mut self, trigger: RecordingTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn object_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.object_store = Some(store);
        self
    }

    /// Persist into the same stores as `other`, as a retry on the same
    /// backends would.
    pub fn sharing_stores_with(mut self, other: &Harness) -> Self {
        self.shared = Some((other.objects.clone(), other.captures.clone()));
        self
    }

    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n;
        self
    }

    pub fn build(self) -> Harness {
        let work_dir = tempfile::tempdir().unwrap();
        let video = work_dir.path().join("swing.mp4");

        let (objects, captures) = self.shared.unwrap_or_else(|| {
            (Arc::new(MemoryObjectStore::new()), Arc::new(MemoryCaptureStore::new()))
        });
        let store = self
            .object_store
            .unwrap_or_else(|| objects.clone() as Arc<dyn ObjectStore>);
        let trigger = Arc::new(self.trigger);
        let policy = RetryPolicy {
            timeout: Duration::from_secs(2),
            delays: vec![Duration::ZERO; 2],
        };

        let coordinator = CaptureCoordinator::new(
            self.engine,
            VideoFrameSampler::new(Arc::new(self.source)),
            self.overlays.then(OverlayRenderer::new),
            ArtifactUploader::new(store, BUCKET, policy.clone()),
            CaptureRepository::new(captures.clone(), policy),
            Some(trigger.clone()),
            CoordinatorSettings {
                work_dir: work_dir.path().join("scratch"),
                max_concurrency: self.max_concurrency,
                handedness: self.handedness,
                trigger_timeout: Duration::from_secs(2),
            },
        );

        Harness {
            coordinator,
            objects,
            captures,
            trigger,
            work_dir,
            video,
        }
    }
}

impl Harness {
    /// Directory holding every per-run scratch directory.
    pub fn scratch_root(&self) -> PathBuf {
        self.work_dir.path().join("scratch")
    }
}

/// Files left anywhere under `dir`.
pub fn leftover_files(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return found;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            found.extend(leftover_files(&path));
        } else {
            found.push(path);
        }
    }
    found
}

/// Collects progress callbacks.
#[derive(Default, Clone)]
pub struct ProgressLog(pub Arc<Mutex<Vec<(String, f64)>>>);

impl ProgressLog {
    pub fn callback(&self) -> impl Fn(&str, f64) + Send + Sync + 'static {
        let log = self.0.clone();
        move |stage: &str, fraction: f64| log.lock().unwrap().push((stage.to_string(), fraction))
    }

    pub fn entries(&self) -> Vec<(String, f64)> {
        self.0.lock().unwrap().clone()
    }
}

pub fn fake_stats(engine: &FakePoseEngine) -> Arc<FakeEngineStats> {
    engine.stats()
}
