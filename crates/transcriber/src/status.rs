//! Read-only projection of job state for status polling.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::JobRepository;
use crate::error::QueryError;
use crate::job::{FailureReason, Job, JobId, JobStatus};

/// Submission state known only in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Accepted and handed to the worker pool.
    Queued,
    /// Will never reach a terminal record: the queue closed before it ran,
    /// or the store failed while it ran.
    Abandoned,
}

/// Ids accepted by `submit` whose run has not ended, plus ids whose run
/// ended without a terminal record.
#[derive(Debug, Clone, Default)]
pub struct InFlightRegistry {
    entries: Arc<Mutex<HashMap<JobId, Admission>>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self, id: &JobId, admission: Admission) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(id.clone(), admission);
        }
    }

    pub fn accept(&self, id: &JobId) {
        self.set(id, Admission::Queued);
    }

    pub fn abandon(&self, id: &JobId) {
        self.set(id, Admission::Abandoned);
    }

    /// Drops a queued id once its run has ended. Abandoned ids are kept so
    /// they keep reporting as failed.
    pub fn finish(&self, id: &JobId) {
        if let Ok(mut entries) = self.entries.lock() {
            if entries.get(id) == Some(&Admission::Queued) {
                entries.remove(id);
            }
        }
    }

    /// Drops the id whatever its state.
    pub fn forget(&self, id: &JobId) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(id);
        }
    }

    pub fn get(&self, id: &JobId) -> Option<Admission> {
        self.entries.lock().ok().and_then(|e| e.get(id).copied())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Status payload returned to polling clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatusView {
    pub job_id: String,
    pub status: JobStatus,
    /// Only while processing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_percent: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_message: Option<String>,
    /// Only once completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription_text: Option<String>,
    /// Only once failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobStatusView {
    pub fn from_job(job: &Job) -> Self {
        let processing = job.status == JobStatus::Processing;
        Self {
            job_id: job.id.to_string(),
            status: job.status,
            progress_percent: processing.then_some(job.progress_percent),
            progress_message: Some(job.progress_message.clone()),
            transcription_text: (job.status == JobStatus::Completed)
                .then(|| job.transcription_text.clone()),
            error_reason: job.failure.map(|f| f.message().to_string()),
            duration_seconds: job.duration_seconds,
            original_name: Some(job.original_name.clone()),
            completed_at: job.completed_at,
        }
    }

    fn synthetic(id: &JobId, admission: Admission) -> Self {
        let (status, message, error_reason) = match admission {
            Admission::Queued => (JobStatus::Pending, "Waiting to be processed", None),
            Admission::Abandoned => (
                JobStatus::Failed,
                "Transcription failed",
                Some(FailureReason::ProcessingFailed.message().to_string()),
            ),
        };
        Self {
            job_id: id.to_string(),
            status,
            progress_percent: None,
            progress_message: Some(message.to_string()),
            transcription_text: None,
            error_reason,
            duration_seconds: None,
            original_name: None,
            completed_at: None,
        }
    }
}

/// One row of the history listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSummary {
    pub job_id: String,
    pub original_name: String,
    pub byte_size: u64,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobSummary {
    pub fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id.to_string(),
            original_name: job.original_name.clone(),
            byte_size: job.byte_size,
            status: job.status,
            error_reason: job.failure.map(|f| f.message().to_string()),
            duration_seconds: job.duration_seconds,
            created_at: job.created_at,
            completed_at: job.completed_at,
        }
    }
}

/// Combines persisted records with in-memory admission state. Never writes.
#[derive(Clone)]
pub struct ProgressReporter {
    repository: Arc<dyn JobRepository>,
    in_flight: InFlightRegistry,
}

impl ProgressReporter {
    pub fn new(repository: Arc<dyn JobRepository>, in_flight: InFlightRegistry) -> Self {
        Self {
            repository,
            in_flight,
        }
    }

    /// The persisted record wins unless it is stuck short of a terminal
    /// state by an abandoned run, which reports as failed. Without a record
    /// an accepted id reports as pending.
    pub fn status(&self, id: &JobId) -> Result<JobStatusView, QueryError> {
        if let Some(job) = self.repository.find_by_id(id)? {
            if self.is_abandoned(&job) {
                let mut view = JobStatusView::synthetic(id, Admission::Abandoned);
                view.original_name = Some(job.original_name);
                view.duration_seconds = job.duration_seconds;
                return Ok(view);
            }
            return Ok(JobStatusView::from_job(&job));
        }
        match self.in_flight.get(id) {
            Some(admission) => Ok(JobStatusView::synthetic(id, admission)),
            None => Err(QueryError::NotFound(id.to_string())),
        }
    }

    /// Completed and failed jobs, newest first.
    pub fn history(&self, limit: usize) -> Result<Vec<JobSummary>, QueryError> {
        Ok(self
            .repository
            .list_finished(limit)?
            .iter()
            .map(JobSummary::from_job)
            .collect())
    }

    /// Loads the full record.
    pub fn find(&self, id: &JobId) -> Result<Job, QueryError> {
        self.repository
            .find_by_id(id)?
            .ok_or_else(|| QueryError::NotFound(id.to_string()))
    }

    /// A non-terminal record whose run already ended.
    pub fn is_abandoned(&self, job: &Job) -> bool {
        !job.is_terminal() && self.in_flight.get(&job.id) == Some(Admission::Abandoned)
    }
}
