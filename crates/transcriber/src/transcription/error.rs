use thiserror::Error;

use crate::job::FailureReason;

/// Closed taxonomy of transcription service failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranscriptionError {
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Timeouts, connection failures and server-side errors.
    #[error("transient service error: {0}")]
    Transient(String),

    /// Rejected input, authentication failures and other non-retryable errors.
    #[error("fatal service error: {0}")]
    Fatal(String),
}

impl TranscriptionError {
    pub fn kind(&self) -> &'static str {
        match self {
            TranscriptionError::QuotaExceeded(_) => "quota_exceeded",
            TranscriptionError::RateLimited(_) => "rate_limited",
            TranscriptionError::Transient(_) => "transient",
            TranscriptionError::Fatal(_) => "fatal",
        }
    }

    /// User-facing category recorded when this error ends a job.
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            TranscriptionError::QuotaExceeded(_) => FailureReason::QuotaExceeded,
            TranscriptionError::RateLimited(_) => FailureReason::RateLimited,
            TranscriptionError::Transient(_) | TranscriptionError::Fatal(_) => {
                FailureReason::ServiceError
            }
        }
    }
}
