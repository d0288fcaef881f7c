//! Job progress broadcaster for live status streaming.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::job::{Job, JobStatus};

/// Snapshot of a job after a persisted change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgressEvent {
    pub job_id: String,
    pub filename: String,
    pub status: JobStatus,
    pub progress_percent: u8,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Set once the job has failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
}

impl JobProgressEvent {
    pub fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id.to_string(),
            filename: job.original_name.clone(),
            status: job.status,
            progress_percent: job.progress_percent,
            message: job.progress_message.clone(),
            timestamp: job.updated_at,
            error_reason: job.failure.map(|f| f.message().to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Fan-out of progress events to any number of subscribers.
#[derive(Clone)]
pub struct JobProgressBroadcaster {
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl JobProgressBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: JobProgressEvent) {
        // No active receivers is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.sender.subscribe()
    }
}

impl Default for JobProgressBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}
