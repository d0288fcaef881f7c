use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a transcription job.
///
/// Transitions only move forward: `Pending -> Processing -> {Completed, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Processing => 1,
            JobStatus::Completed | JobStatus::Failed => 2,
        }
    }

    /// Whether moving from `self` to `next` is a legal forward transition.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        !self.is_terminal() && next.rank() == self.rank() + 1
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(format!("Invalid job status: {}", s)),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a terminal failure, shown to users instead of raw error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    QuotaExceeded,
    RateLimited,
    ServiceError,
    ProcessingFailed,
    NoSpeech,
}

impl FailureReason {
    /// Stable code stored alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::QuotaExceeded => "quota_exceeded",
            FailureReason::RateLimited => "rate_limited",
            FailureReason::ServiceError => "service_error",
            FailureReason::ProcessingFailed => "processing_failed",
            FailureReason::NoSpeech => "no_speech",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            FailureReason::QuotaExceeded => "Transcription service quota exceeded",
            FailureReason::RateLimited => "Transcription service rate limit exceeded",
            FailureReason::ServiceError => "Transcription service error",
            FailureReason::ProcessingFailed => "Audio processing failed",
            FailureReason::NoSpeech => "No speech was detected in the audio",
        }
    }
}

impl FromStr for FailureReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quota_exceeded" => Ok(FailureReason::QuotaExceeded),
            "rate_limited" => Ok(FailureReason::RateLimited),
            "service_error" => Ok(FailureReason::ServiceError),
            "processing_failed" => Ok(FailureReason::ProcessingFailed),
            "no_speech" => Ok(FailureReason::NoSpeech),
            _ => Err(format!("Invalid failure reason: {}", s)),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}
