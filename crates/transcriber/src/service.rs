//! Submission, status and download surface over the worker pool.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::broadcast::{JobProgressBroadcaster, JobProgressEvent};
use crate::catalog::JobCatalog;
use crate::config::Config;
use crate::db::{Database, JobRepository};
use crate::error::{ConfigError, QueryError, Result, SubmitError, TranscriberError};
use crate::job::{Job, JobId, JobStatus};
use crate::media::work_area::WORK_AREA_PREFIX;
use crate::media::{AudioFormat, FfmpegToolkit, MediaSegmenter, MediaToolkit};
use crate::pipeline::{JobOrchestrator, OrchestratorSettings};
use crate::status::{Admission, InFlightRegistry, JobStatusView, JobSummary, ProgressReporter};
use crate::transcription::{OpenAiTranscriptionClient, TranscriptionClient};
use crate::upload::{staged_path, UploadPolicy, UPLOAD_PREFIX};
use crate::worker::{JobResult, TranscriptionTask, WorkerPool};

/// History page size when the caller does not ask for one.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// A completed transcript ready to be saved or served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptFile {
    pub file_name: String,
    pub content: String,
}

impl TranscriptFile {
    /// Fails with `NotCompleted` unless the job finished with a transcript.
    pub fn from_job(job: Job) -> std::result::Result<Self, QueryError> {
        if job.status != JobStatus::Completed {
            return Err(QueryError::NotCompleted {
                job_id: job.id.to_string(),
                status: job.status.to_string(),
            });
        }
        Ok(Self {
            file_name: transcript_file_name(&job.original_name),
            content: job.transcription_text,
        })
    }
}

pub struct TranscriptionService {
    pool: WorkerPool,
    reporter: ProgressReporter,
    catalog: JobCatalog,
    in_flight: InFlightRegistry,
    policy: UploadPolicy,
    uploads_dir: PathBuf,
    progress: JobProgressBroadcaster,
}

impl TranscriptionService {
    /// Builds the production stack: SQLite store, ffmpeg toolkit and the
    /// OpenAI-compatible client.
    pub fn from_config(config: &Config) -> Result<Self> {
        let db_path = config
            .resolve_database_path()
            .ok_or_else(|| ConfigError::Validation {
                message: "could not determine a database location; set database_path".to_string(),
            })?;
        let database = Database::open(&db_path)?;
        info!(path = %db_path.display(), "Opened job database");

        let toolkit = FfmpegToolkit::new(
            &config.segmentation.ffmpeg_path,
            &config.segmentation.ffprobe_path,
        );
        let api_key = config.transcription.resolve_api_key()?;
        let client = OpenAiTranscriptionClient::from_config(&config.transcription, api_key)?;

        Self::start(
            config,
            Arc::new(database),
            Arc::new(toolkit),
            Arc::new(client),
        )
    }

    /// Wires injected collaborators into an orchestrator and starts the
    /// worker pool.
    pub fn start(
        config: &Config,
        repository: Arc<dyn JobRepository>,
        toolkit: Arc<dyn MediaToolkit>,
        client: Arc<dyn TranscriptionClient>,
    ) -> Result<Self> {
        let work_dir = config.work_dir();
        let uploads_dir = work_dir.join("uploads");
        std::fs::create_dir_all(&uploads_dir).map_err(|e| TranscriberError::Io {
            path: uploads_dir.clone(),
            source: e,
        })?;

        let max_age = Duration::from_secs(config.cleanup.stale_upload_max_age_secs);
        let removed = sweep_stale_files(&work_dir, max_age);
        if removed > 0 {
            info!(removed, "Removed stale uploads and work areas");
        }

        let progress = JobProgressBroadcaster::default();
        let segmenter = MediaSegmenter::new(
            toolkit,
            AudioFormat::mono(config.segmentation.sample_rate),
        );
        let orchestrator = JobOrchestrator::new(
            Arc::clone(&repository),
            segmenter,
            client,
            Arc::new(progress.clone()),
            OrchestratorSettings::from_config(config),
        );
        let in_flight = InFlightRegistry::new();
        let pool = WorkerPool::new(
            Arc::new(orchestrator),
            config.worker_count,
            in_flight.clone(),
        )?;

        Ok(Self {
            pool,
            reporter: ProgressReporter::new(Arc::clone(&repository), in_flight.clone()),
            catalog: JobCatalog::new(repository, in_flight.clone()),
            in_flight,
            policy: UploadPolicy::from_config(&config.upload),
            uploads_dir,
            progress,
        })
    }

    /// Validates and stages an upload, then queues it. Returns as soon as
    /// the job is queued; the work runs in the background.
    pub fn submit(
        &self,
        media: &[u8],
        original_name: &str,
        byte_size: u64,
    ) -> std::result::Result<JobId, SubmitError> {
        self.policy.validate(original_name, byte_size)?;

        let job_id = JobId::new();
        let media_path = staged_path(&self.uploads_dir, &job_id, original_name);
        std::fs::write(&media_path, media).map_err(|e| SubmitError::Stage {
            path: media_path.clone(),
            source: e,
        })?;

        self.in_flight.accept(&job_id);
        let task = TranscriptionTask {
            job_id: job_id.clone(),
            original_name: original_name.to_string(),
            byte_size,
            media_path: media_path.clone(),
        };
        if let Err(e) = self.pool.submit(task) {
            self.in_flight.abandon(&job_id);
            remove_quietly(&media_path);
            return Err(e.into());
        }

        info!(job_id = %job_id, filename = %original_name, byte_size, "Job queued");
        Ok(job_id)
    }

    pub fn status(&self, job_id: &JobId) -> std::result::Result<JobStatusView, QueryError> {
        self.reporter.status(job_id)
    }

    /// Finished jobs, newest first. `None` uses [`DEFAULT_HISTORY_LIMIT`].
    pub fn history(
        &self,
        limit: Option<usize>,
    ) -> std::result::Result<Vec<JobSummary>, QueryError> {
        self.reporter
            .history(limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
    }

    pub fn download(&self, job_id: &JobId) -> std::result::Result<TranscriptFile, QueryError> {
        let job = match self.reporter.find(job_id) {
            Ok(job) => job,
            Err(QueryError::NotFound(id)) => {
                let status = match self.in_flight.get(job_id) {
                    Some(Admission::Queued) => JobStatus::Pending,
                    Some(Admission::Abandoned) => JobStatus::Failed,
                    None => return Err(QueryError::NotFound(id)),
                };
                return Err(QueryError::NotCompleted {
                    job_id: id,
                    status: status.to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        if self.reporter.is_abandoned(&job) {
            return Err(QueryError::NotCompleted {
                job_id: job.id.to_string(),
                status: JobStatus::Failed.to_string(),
            });
        }
        TranscriptFile::from_job(job)
    }

    /// Renames a job in any status. The name is trimmed and must not be empty.
    pub fn rename(
        &self,
        job_id: &JobId,
        name: &str,
    ) -> std::result::Result<JobSummary, QueryError> {
        self.catalog.rename(job_id, name)
    }

    /// Deletes a finished or abandoned job. Queued and running jobs are refused.
    pub fn delete(&self, job_id: &JobId) -> std::result::Result<(), QueryError> {
        self.catalog.delete(job_id)
    }

    /// Ids still tracked in memory: queued or running, or abandoned without
    /// a terminal record.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn subscribe_progress(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.progress.subscribe()
    }

    /// Blocks until a worker reports a finished run. Reading results is
    /// optional; only the most recent unread ones are kept.
    pub fn next_result(&self) -> Option<JobResult> {
        self.pool.recv_result()
    }

    pub fn next_result_timeout(&self, timeout: Duration) -> Option<JobResult> {
        self.pool.recv_result_timeout(timeout)
    }

    /// Stops accepting work, abandons queued jobs that never started and
    /// waits for running jobs to finish. Returns the abandoned ids.
    pub fn shutdown(self) -> Vec<JobId> {
        self.pool.shutdown();

        let abandoned: Vec<JobId> = self
            .pool
            .drain_pending()
            .into_iter()
            .map(|task| {
                warn!(job_id = %task.job_id, "Dropping queued job on shutdown");
                self.in_flight.abandon(&task.job_id);
                remove_quietly(&task.media_path);
                task.job_id
            })
            .collect();

        self.pool.wait();
        abandoned
    }
}

/// `<stem>_transcription.txt`
pub fn transcript_file_name(original_name: &str) -> String {
    let stem = Path::new(original_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "media".to_string());
    format!("{}_transcription.txt", stem)
}

/// Removes staged uploads and job work areas older than `max_age`, left
/// behind by a process that stopped mid-run. Returns how many were removed.
pub fn sweep_stale_files(work_dir: &Path, max_age: Duration) -> usize {
    let now = SystemTime::now();
    let mut removed = 0;

    for (dir, prefix) in [
        (work_dir.join("uploads"), UPLOAD_PREFIX),
        (work_dir.join("jobs"), WORK_AREA_PREFIX),
    ] {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Cannot scan for stale files");
                continue;
            }
        };

        for entry in entries.flatten() {
            if !entry.file_name().to_string_lossy().starts_with(prefix) {
                continue;
            }
            let age = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok());
            if !matches!(age, Some(age) if age > max_age) {
                continue;
            }

            let path = entry.path();
            let result = if path.is_dir() {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_file(&path)
            };
            match result {
                Ok(()) => {
                    debug!(path = %path.display(), "Removed stale entry");
                    removed += 1;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove stale entry"),
            }
        }
    }

    removed
}

fn remove_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => {
            warn!(path = %path.display(), error = %e, "Failed to remove staged upload");
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_file_name() {
        assert_eq!(transcript_file_name("meeting.mp3"), "meeting_transcription.txt");
        assert_eq!(
            transcript_file_name("talk.final.m4a"),
            "talk.final_transcription.txt"
        );
        assert_eq!(transcript_file_name(""), "media_transcription.txt");
    }

    #[test]
    fn test_sweep_keeps_fresh_and_foreign_entries() {
        let work = tempfile::tempdir().unwrap();
        let uploads = work.path().join("uploads");
        let jobs = work.path().join("jobs");
        std::fs::create_dir_all(&uploads).unwrap();
        std::fs::create_dir_all(jobs.join("job_abc")).unwrap();
        std::fs::write(uploads.join("upload_abc_a.mp3"), b"x").unwrap();
        std::fs::write(uploads.join("notes.txt"), b"x").unwrap();

        assert_eq!(sweep_stale_files(work.path(), Duration::from_secs(3600)), 0);
        assert!(uploads.join("upload_abc_a.mp3").exists());
        assert!(jobs.join("job_abc").exists());
    }

    #[test]
    fn test_sweep_removes_expired_prefixed_entries() {
        let work = tempfile::tempdir().unwrap();
        let uploads = work.path().join("uploads");
        let jobs = work.path().join("jobs");
        std::fs::create_dir_all(&uploads).unwrap();
        std::fs::create_dir_all(jobs.join("job_abc")).unwrap();
        std::fs::write(jobs.join("job_abc").join("canonical.wav"), b"x").unwrap();
        std::fs::write(uploads.join("upload_abc_a.mp3"), b"x").unwrap();
        std::fs::write(uploads.join("notes.txt"), b"x").unwrap();
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(sweep_stale_files(work.path(), Duration::from_millis(1)), 2);
        assert!(!uploads.join("upload_abc_a.mp3").exists());
        assert!(!jobs.join("job_abc").exists());
        assert!(uploads.join("notes.txt").exists());
    }

    #[test]
    fn test_sweep_tolerates_missing_dirs() {
        let work = tempfile::tempdir().unwrap();
        assert_eq!(sweep_stale_files(work.path(), Duration::ZERO), 0);
    }
}
