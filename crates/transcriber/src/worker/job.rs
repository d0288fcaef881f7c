use std::path::PathBuf;

use crate::job::{FailureReason, Job, JobId, JobStatus};

/// Unit of background work: one staged upload to transcribe.
#[derive(Debug, Clone)]
pub struct TranscriptionTask {
    pub job_id: JobId,
    pub original_name: String,
    pub byte_size: u64,
    /// Staged copy of the upload. Removed when the run ends.
    pub media_path: PathBuf,
}

/// Terminal outcome of one task as seen by the worker pool.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub job_id: JobId,
    pub original_name: String,
    pub status: JobStatus,
    pub error_reason: Option<String>,
    /// False when the outcome could not be written to the job store.
    pub persisted: bool,
}

impl JobResult {
    pub fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            original_name: job.original_name.clone(),
            status: job.status,
            error_reason: job.failure.map(|f| f.message().to_string()),
            persisted: true,
        }
    }

    pub fn unrecorded(task: &TranscriptionTask) -> Self {
        Self {
            job_id: task.job_id.clone(),
            original_name: task.original_name.clone(),
            status: JobStatus::Failed,
            error_reason: Some(FailureReason::ProcessingFailed.message().to_string()),
            persisted: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Completed
    }
}
