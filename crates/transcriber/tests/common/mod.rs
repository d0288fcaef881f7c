#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use transcriber::db::{Database, DatabaseError, JobRepository};
use transcriber::job::{Job, JobId, JobStatus};
use transcriber::media::{AudioFormat, MediaError, MediaSegmenter, MediaToolkit};
use transcriber::pipeline::{JobOrchestrator, OrchestratorSettings, ProgressListener, RetryPolicy};
use transcriber::transcription::{TranscriptionClient, TranscriptionError};
use transcriber::upload::staged_path;
use transcriber::worker::TranscriptionTask;

/// Text written into the canonical file by [`FakeToolkit::transcode`].
pub const CANONICAL_TEXT: &str = "full recording";

/// Media toolkit that never runs ffmpeg. Every produced file contains a
/// short label, so an echoing client returns text that identifies the
/// segment it was given.
pub struct FakeToolkit {
    duration: f64,
    fail_transcode: bool,
    failing_segments: HashSet<u64>,
}

impl FakeToolkit {
    pub fn with_duration(duration: f64) -> Self {
        Self {
            duration,
            fail_transcode: false,
            failing_segments: HashSet::new(),
        }
    }

    /// Input that cannot be decoded at all.
    pub fn corrupt() -> Self {
        Self {
            fail_transcode: true,
            ..Self::with_duration(0.0)
        }
    }

    /// Extraction of the segment starting at `start` seconds fails.
    pub fn failing_at(mut self, start: u64) -> Self {
        self.failing_segments.insert(start);
        self
    }
}

#[async_trait]
impl MediaToolkit for FakeToolkit {
    async fn probe_duration(&self, _input: &Path) -> Result<f64, MediaError> {
        Ok(self.duration)
    }

    async fn transcode(
        &self,
        _input: &Path,
        output: &Path,
        _format: &AudioFormat,
    ) -> Result<(), MediaError> {
        if self.fail_transcode {
            return Err(MediaError::Failed {
                program: "ffmpeg".to_string(),
                code: 1,
                stderr: "Invalid data found when processing input".to_string(),
            });
        }
        std::fs::write(output, CANONICAL_TEXT)
            .map_err(|_| MediaError::MissingOutput(output.to_path_buf()))
    }

    async fn extract(
        &self,
        _input: &Path,
        output: &Path,
        start: f64,
        _duration: f64,
        _format: &AudioFormat,
    ) -> Result<(), MediaError> {
        if self.failing_segments.contains(&(start as u64)) {
            return Err(MediaError::MissingOutput(output.to_path_buf()));
        }
        std::fs::write(output, format!("from {}", start as u64))
            .map_err(|_| MediaError::MissingOutput(output.to_path_buf()))
    }
}

enum Reply {
    Text(String),
    Error(TranscriptionError),
    Hang,
}

/// Transcription client that plays back scripted replies in call order and
/// echoes the audio bytes as text once the script runs out.
#[derive(Default)]
pub struct ScriptedClient {
    script: Mutex<VecDeque<Reply>>,
    received: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn echo() -> Self {
        Self::default()
    }

    pub fn then_text(self, text: &str) -> Self {
        self.push(Reply::Text(text.to_string()))
    }

    pub fn then_error(self, error: TranscriptionError) -> Self {
        self.push(Reply::Error(error))
    }

    /// Next call never answers.
    pub fn then_hang(self) -> Self {
        self.push(Reply::Hang)
    }

    fn push(self, reply: Reply) -> Self {
        self.script.lock().unwrap().push_back(reply);
        self
    }

    pub fn calls(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    /// Audio payloads in call order, decoded as text.
    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranscriptionClient for ScriptedClient {
    async fn transcribe(&self, audio: &[u8]) -> Result<String, TranscriptionError> {
        let payload = String::from_utf8_lossy(audio).into_owned();
        self.received.lock().unwrap().push(payload.clone());
        let reply = self.script.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Error(error)) => Err(error),
            Some(Reply::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(TranscriptionError::Fatal("unreachable".to_string()))
            }
            None => Ok(payload),
        }
    }
}

/// Records every job snapshot the orchestrator publishes.
#[derive(Default)]
pub struct RecordingProgress {
    snapshots: Mutex<Vec<Job>>,
}

impl RecordingProgress {
    pub fn snapshots(&self) -> Vec<Job> {
        self.snapshots.lock().unwrap().clone()
    }

    pub fn statuses(&self) -> Vec<JobStatus> {
        self.snapshots().iter().map(|j| j.status).collect()
    }
}

impl ProgressListener for RecordingProgress {
    fn job_changed(&self, job: &Job) {
        self.snapshots.lock().unwrap().push(job.clone());
    }
}

/// Job store whose `update` calls fail for a range of call numbers
/// (zero-based). Everything else goes to the wrapped database.
pub struct FlakyRepository {
    inner: Database,
    failing: Range<usize>,
    updates: AtomicUsize,
}

impl FlakyRepository {
    /// Update number `first` and every later one fail.
    pub fn failing_from(inner: Database, first: usize) -> Self {
        Self::failing(inner, first..usize::MAX)
    }

    /// Only update number `index` fails.
    pub fn failing_once(inner: Database, index: usize) -> Self {
        Self::failing(inner, index..index + 1)
    }

    fn failing(inner: Database, failing: Range<usize>) -> Self {
        Self {
            inner,
            failing,
            updates: AtomicUsize::new(0),
        }
    }
}

impl JobRepository for FlakyRepository {
    fn create(&self, job: &Job) -> Result<(), DatabaseError> {
        self.inner.create(job)
    }

    fn update(&self, job: &Job) -> Result<(), DatabaseError> {
        let call = self.updates.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&call) {
            return Err(DatabaseError::LockPoisoned);
        }
        self.inner.update(job)
    }

    fn find_by_id(&self, id: &JobId) -> Result<Option<Job>, DatabaseError> {
        self.inner.find_by_id(id)
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<Job>, DatabaseError> {
        self.inner.list_recent(limit)
    }

    fn list_finished(&self, limit: usize) -> Result<Vec<Job>, DatabaseError> {
        self.inner.list_finished(limit)
    }

    fn rename(&self, id: &JobId, name: &str, now: DateTime<Utc>) -> Result<Job, DatabaseError> {
        self.inner.rename(id, name, now)
    }

    fn delete(&self, id: &JobId) -> Result<(), DatabaseError> {
        self.inner.delete(id)
    }
}

pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        retry_rate_limited: false,
    }
}

pub fn settings(work_root: &Path) -> OrchestratorSettings {
    OrchestratorSettings {
        work_root: work_root.to_path_buf(),
        max_segment_seconds: 1800.0,
        call_timeout: Duration::from_secs(5),
        retry: fast_retry(3),
    }
}

pub struct Harness {
    pub work: tempfile::TempDir,
    pub db: Database,
    pub client: Arc<ScriptedClient>,
    pub progress: Arc<RecordingProgress>,
    pub orchestrator: JobOrchestrator,
}

impl Harness {
    pub fn new(toolkit: FakeToolkit, client: ScriptedClient) -> Self {
        let work = tempfile::tempdir().unwrap();
        let settings = settings(work.path());
        Self::with_settings(work, settings, toolkit, client)
    }

    pub fn with_settings(
        work: tempfile::TempDir,
        settings: OrchestratorSettings,
        toolkit: FakeToolkit,
        client: ScriptedClient,
    ) -> Self {
        let db = Database::open_in_memory().unwrap();
        Self::build(work, settings, db.clone(), Arc::new(db), toolkit, client)
    }

    /// Runs against `wrap(db)` while `harness.db` reads the same database
    /// directly.
    pub fn with_repository(
        wrap: impl FnOnce(Database) -> Arc<dyn JobRepository>,
        toolkit: FakeToolkit,
        client: ScriptedClient,
    ) -> Self {
        let work = tempfile::tempdir().unwrap();
        let settings = settings(work.path());
        let db = Database::open_in_memory().unwrap();
        let repository = wrap(db.clone());
        Self::build(work, settings, db, repository, toolkit, client)
    }

    fn build(
        work: tempfile::TempDir,
        settings: OrchestratorSettings,
        db: Database,
        repository: Arc<dyn JobRepository>,
        toolkit: FakeToolkit,
        client: ScriptedClient,
    ) -> Self {
        let client = Arc::new(client);
        let progress = Arc::new(RecordingProgress::default());
        let orchestrator = JobOrchestrator::new(
            repository,
            MediaSegmenter::new(Arc::new(toolkit), AudioFormat::default()),
            client.clone(),
            progress.clone(),
            settings,
        );
        Self {
            work,
            db,
            client,
            progress,
            orchestrator,
        }
    }

    /// Writes an upload into the staging directory, as `submit` would.
    pub fn stage(&self, name: &str) -> TranscriptionTask {
        let uploads = self.work.path().join("uploads");
        std::fs::create_dir_all(&uploads).unwrap();
        let job_id = JobId::new();
        let media_path = staged_path(&uploads, &job_id, name);
        std::fs::write(&media_path, b"media bytes").unwrap();
        TranscriptionTask {
            job_id,
            original_name: name.to_string(),
            byte_size: 11,
            media_path,
        }
    }

    /// Every regular file left anywhere under the work root.
    pub fn leftover_files(&self) -> Vec<PathBuf> {
        fn walk(dir: &Path, out: &mut Vec<PathBuf>) {
            let Ok(entries) = std::fs::read_dir(dir) else {
                return;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    walk(&path, out);
                } else {
                    out.push(path);
                }
            }
        }
        let mut out = Vec::new();
        walk(self.work.path(), &mut out);
        out
    }
}
