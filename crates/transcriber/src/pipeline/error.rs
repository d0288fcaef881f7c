use thiserror::Error;

use crate::db::DatabaseError;
use crate::job::{FailureReason, TransitionError};
use crate::media::SegmentError;
use crate::transcription::TranscriptionError;

/// Why a job run ended without a transcript.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Audio processing failed: {0}")]
    Segmentation(#[from] SegmentError),

    #[error("Transcription of segment {index} failed: {source}")]
    Transcription {
        index: usize,
        #[source]
        source: TranscriptionError,
    },

    #[error("Segment {index} audio could not be read: {source}")]
    SegmentRead {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("No speech was detected in any segment")]
    NoSpeech,

    #[error("Job state error: {0}")]
    Transition(#[from] TransitionError),

    #[error("Job record could not be persisted: {0}")]
    Persistence(#[from] DatabaseError),
}

impl PipelineError {
    /// User-facing category recorded on the failed job.
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            PipelineError::Transcription { source, .. } => source.failure_reason(),
            PipelineError::NoSpeech => FailureReason::NoSpeech,
            PipelineError::Segmentation(_)
            | PipelineError::SegmentRead { .. }
            | PipelineError::Transition(_)
            | PipelineError::Persistence(_) => FailureReason::ProcessingFailed,
        }
    }
}
