pub mod broadcast;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod job;
pub mod media;
pub mod pipeline;
pub mod secrets;
pub mod service;
pub mod status;
pub mod telemetry;
pub mod transcription;
pub mod upload;
pub mod worker;

pub use broadcast::{JobProgressBroadcaster, JobProgressEvent};
pub use catalog::JobCatalog;
pub use config::{load_config, load_config_from_str, Config};
pub use db::{Database, DatabaseError, JobRepository};
pub use error::{ConfigError, QueryError, Result, SubmitError, TranscriberError, WorkerError};
pub use job::{FailureReason, Job, JobId, JobStatus};
pub use media::{FfmpegToolkit, MediaSegmenter, MediaToolkit};
pub use pipeline::{JobOrchestrator, OrchestratorSettings, PipelineError, RetryPolicy};
pub use secrets::{resolve_secret, SecretError};
pub use service::{TranscriptFile, TranscriptionService};
pub use status::{InFlightRegistry, JobStatusView, JobSummary, ProgressReporter};
pub use telemetry::init_tracing;
pub use transcription::{OpenAiTranscriptionClient, TranscriptionClient, TranscriptionError};
pub use worker::{JobResult, TranscriptionTask, WorkerPool};
