//! Transcription job pipeline.

pub mod error;
pub mod orchestrator;
pub mod progress;
pub mod retry;

pub use error::PipelineError;
pub use orchestrator::{assemble, JobOrchestrator, OrchestratorSettings};
pub use progress::{NoopProgress, ProgressListener};
pub use retry::{retry_with_backoff, RetryPolicy};
