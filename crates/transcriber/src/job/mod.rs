//! Transcription job entity and its lifecycle rules.

pub mod status;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use status::{FailureReason, JobStatus};

/// Opaque, never-reused job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for JobId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("Job id must not be empty".to_string());
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Illegal transition for job {job_id}: {from} -> {to}")]
    Illegal {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Job {job_id} cannot complete with an empty transcript")]
    EmptyTranscript { job_id: String },
}

/// One submission and its outcome.
///
/// Mutators enforce the lifecycle: status only moves forward, progress never
/// decreases while processing, and terminal jobs carry exactly one of a
/// transcript or a failure reason together with `completed_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub original_name: String,
    pub byte_size: u64,
    pub mime_type: Option<String>,
    pub status: JobStatus,
    pub progress_percent: u8,
    pub progress_message: String,
    pub transcription_text: String,
    pub failure: Option<FailureReason>,
    pub duration_seconds: Option<f64>,
    pub segment_count: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(id: JobId, original_name: &str, byte_size: u64, now: DateTime<Utc>) -> Self {
        Self {
            id,
            original_name: original_name.to_string(),
            byte_size,
            mime_type: detect_mime_type(original_name),
            status: JobStatus::Pending,
            progress_percent: 0,
            progress_message: "Waiting to be processed".to_string(),
            transcription_text: String::new(),
            failure: None,
            duration_seconds: None,
            segment_count: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Human-readable failure text; empty unless the job failed.
    pub fn error_reason(&self) -> &str {
        self.failure.as_ref().map(|f| f.message()).unwrap_or("")
    }

    pub fn start_processing(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.transition(JobStatus::Processing)?;
        self.progress_percent = 0;
        self.progress_message = "Processing started".to_string();
        self.updated_at = now;
        Ok(())
    }

    /// Records the probed media duration and the number of segments to transcribe.
    pub fn record_media(&mut self, duration_seconds: f64, segment_count: u32, now: DateTime<Utc>) {
        self.duration_seconds = Some(duration_seconds);
        self.segment_count = Some(segment_count);
        self.updated_at = now;
    }

    /// Updates the progress step. The percentage is clamped to 100 and never
    /// moves backwards.
    pub fn report_progress(&mut self, percent: u8, message: impl Into<String>, now: DateTime<Utc>) {
        if self.status != JobStatus::Processing {
            return;
        }
        self.progress_percent = self.progress_percent.max(percent.min(100));
        self.progress_message = message.into();
        self.updated_at = now;
    }

    pub fn complete(&mut self, text: String, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if text.trim().is_empty() {
            return Err(TransitionError::EmptyTranscript {
                job_id: self.id.to_string(),
            });
        }
        self.transition(JobStatus::Completed)?;
        self.transcription_text = text;
        self.failure = None;
        self.progress_percent = 100;
        self.progress_message = "Transcription completed".to_string();
        self.updated_at = now;
        self.completed_at = Some(now);
        Ok(())
    }

    pub fn fail(&mut self, reason: FailureReason, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.transition(JobStatus::Failed)?;
        self.transcription_text.clear();
        self.failure = Some(reason);
        self.progress_message = "Transcription failed".to_string();
        self.updated_at = now;
        self.completed_at = Some(now);
        Ok(())
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError::Illegal {
                job_id: self.id.to_string(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

fn detect_mime_type(name: &str) -> Option<String> {
    mime_guess::from_path(Path::new(name))
        .first()
        .map(|m| m.to_string())
}
