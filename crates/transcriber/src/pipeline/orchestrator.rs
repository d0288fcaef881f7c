//! Job state machine: segment, transcribe, assemble, record.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::error::PipelineError;
use super::progress::ProgressListener;
use super::retry::{retry_with_backoff, RetryPolicy};
use crate::config::Config;
use crate::db::JobRepository;
use crate::job::Job;
use crate::media::{MediaSegmenter, SegmentError, WorkArea};
use crate::transcription::{TranscriptionClient, TranscriptionError};
use crate::worker::job::TranscriptionTask;

/// Separator between consecutive segment transcripts.
pub const SEGMENT_SEPARATOR: &str = "\n";

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Root under which `jobs/job_<id>` work areas are created.
    pub work_root: PathBuf,
    pub max_segment_seconds: f64,
    /// Upper bound on one transcription call.
    pub call_timeout: Duration,
    pub retry: RetryPolicy,
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            work_root: config.work_dir(),
            max_segment_seconds: config.segmentation.max_segment_seconds as f64,
            call_timeout: config.transcription.request_timeout(),
            retry: RetryPolicy::from_config(&config.retry),
        }
    }
}

/// Drives one job from submission to a terminal state.
///
/// Owns no global state: the job store, segmenter and transcription client
/// are injected and shared between worker threads.
pub struct JobOrchestrator {
    repository: Arc<dyn JobRepository>,
    segmenter: MediaSegmenter,
    client: Arc<dyn TranscriptionClient>,
    progress: Arc<dyn ProgressListener>,
    settings: OrchestratorSettings,
}

impl JobOrchestrator {
    pub fn new(
        repository: Arc<dyn JobRepository>,
        segmenter: MediaSegmenter,
        client: Arc<dyn TranscriptionClient>,
        progress: Arc<dyn ProgressListener>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            repository,
            segmenter,
            client,
            progress,
            settings,
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Runs the job to completion and returns its terminal record.
    ///
    /// Every failure inside the run ends as a `FAILED` record. `Err` means
    /// the outcome could not be written to the store. Temporary files,
    /// including the staged input, are removed on every path.
    pub async fn run(&self, task: TranscriptionTask) -> Result<Job, PipelineError> {
        let span = info_span!(
            "transcription_job",
            job_id = %task.job_id,
            filename = %task.original_name,
        );
        self.run_inner(task).instrument(span).await
    }

    async fn run_inner(&self, task: TranscriptionTask) -> Result<Job, PipelineError> {
        let mut area = WorkArea::create(&self.settings.work_root, &task.job_id);
        if let Ok(area) = area.as_mut() {
            area.adopt(&task.media_path);
        }

        let result = self.drive(&task, area.as_ref()).await;

        {
            let _step = info_span!("cleanup").entered();
            match area.as_mut() {
                Ok(area) => {
                    if let Err(e) = area.cleanup() {
                        warn!(dir = %area.path().display(), error = %e, "Failed to remove work area");
                    }
                }
                Err(_) => remove_staged_input(&task.media_path),
            }
        }

        result
    }

    async fn drive(
        &self,
        task: &TranscriptionTask,
        area: Result<&WorkArea, &io::Error>,
    ) -> Result<Job, PipelineError> {
        let mut job = Job::new(
            task.job_id.clone(),
            &task.original_name,
            task.byte_size,
            Utc::now(),
        );
        if let Err(e) = self.repository.create(&job) {
            error!(error = %e, "Failed to create job record");
            return Err(e.into());
        }
        self.progress.job_changed(&job);

        job.start_processing(Utc::now())?;
        self.persist(&job)?;

        let outcome = match area {
            Ok(area) => self.transcribe_media(&mut job, &task.media_path, area).await,
            Err(e) => Err(SegmentError::WorkArea {
                path: self.settings.work_root.join("jobs"),
                source: io::Error::new(e.kind(), e.to_string()),
            }
            .into()),
        };

        let run_error = match outcome {
            Ok(text) => {
                job.complete(text, Utc::now())?;
                info!(
                    chars = job.transcription_text.len(),
                    "Transcription job completed"
                );
                None
            }
            Err(e) => {
                let reason = e.failure_reason();
                if matches!(e, PipelineError::Persistence(_)) {
                    error!(error = %e, "Job store failed during run");
                } else {
                    warn!(reason = reason.code(), error = %e, "Transcription job failed");
                }
                job.fail(reason, Utc::now())?;
                Some(e)
            }
        };

        if let Err(e) = self.persist(&job) {
            error!(error = %e, status = %job.status, "Failed to record terminal job state");
            return Err(run_error.unwrap_or(e));
        }
        Ok(job)
    }

    /// Segments the input and transcribes every segment in index order.
    /// Returns the assembled transcript.
    async fn transcribe_media(
        &self,
        job: &mut Job,
        input: &Path,
        area: &WorkArea,
    ) -> Result<String, PipelineError> {
        let audio = self
            .segmenter
            .segment(input, self.settings.max_segment_seconds, area)
            .instrument(info_span!("segment"))
            .await?;

        if audio.skipped() > 0 {
            warn!(
                skipped = audio.skipped(),
                planned = audio.planned,
                "Continuing with partial segments"
            );
        }

        let total = audio.segments.len();
        let segment_count = u32::try_from(total).unwrap_or(u32::MAX);
        job.record_media(audio.duration_seconds, segment_count, Utc::now());
        job.report_progress(0, "processing audio", Utc::now());
        self.persist(job)?;

        let mut transcripts = Vec::with_capacity(total);
        for (position, segment) in audio.segments.iter().enumerate() {
            let percent = u8::try_from(position * 100 / total).unwrap_or(100);
            job.report_progress(
                percent,
                format!("transcribing segment {}/{}", position + 1, total),
                Utc::now(),
            );
            self.persist(job)?;

            let span = info_span!("transcribe_segment", index = segment.index, position);
            let text = async {
                let bytes = tokio::fs::read(&segment.path).await.map_err(|e| {
                    PipelineError::SegmentRead {
                        index: segment.index,
                        source: e,
                    }
                })?;
                self.transcribe_with_retry(&bytes)
                    .await
                    .map_err(|e| PipelineError::Transcription {
                        index: segment.index,
                        source: e,
                    })
            }
            .instrument(span)
            .await?;

            debug!(index = segment.index, chars = text.len(), "Segment transcribed");
            transcripts.push((segment.index, text));
        }

        let _step = info_span!("assemble", segments = transcripts.len()).entered();
        assemble(transcripts)
    }

    async fn transcribe_with_retry(&self, audio: &[u8]) -> Result<String, TranscriptionError> {
        let timeout = self.settings.call_timeout;
        let client = &self.client;
        retry_with_backoff(&self.settings.retry, move |attempt| async move {
            debug!(attempt = attempt + 1, "Calling transcription service");
            match tokio::time::timeout(timeout, client.transcribe(audio)).await {
                Ok(result) => result,
                Err(_) => Err(TranscriptionError::Transient(format!(
                    "call timed out after {}s",
                    timeout.as_secs_f64()
                ))),
            }
        })
        .await
    }

    fn persist(&self, job: &Job) -> Result<(), PipelineError> {
        self.repository.update(job)?;
        self.progress.job_changed(job);
        Ok(())
    }
}

/// Joins transcripts in ascending segment index order.
pub fn assemble(mut transcripts: Vec<(usize, String)>) -> Result<String, PipelineError> {
    transcripts.sort_by_key(|(index, _)| *index);
    let text = transcripts
        .into_iter()
        .map(|(_, text)| text)
        .collect::<Vec<_>>()
        .join(SEGMENT_SEPARATOR);
    if text.trim().is_empty() {
        return Err(PipelineError::NoSpeech);
    }
    Ok(text)
}

fn remove_staged_input(path: &Path) {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => {
            warn!(path = %path.display(), error = %e, "Failed to remove staged input");
        }
        _ => {}
    }
}
