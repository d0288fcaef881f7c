use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranscriberError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Submission rejected: {0}")]
    Submit(#[from] SubmitError),

    #[error("Query failed: {0}")]
    Query(#[from] QueryError),

    #[error("Secret resolution failed: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Transcription client setup failed: {0}")]
    Client(#[from] crate::transcription::TranscriptionError),

    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,
}

/// Reasons an upload is refused before any job is created.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Uploaded file is empty")]
    EmptyUpload,

    #[error("File too large: {size} bytes exceeds the maximum of {max} bytes")]
    TooLarge { size: u64, max: u64 },

    #[error("Unsupported file format '{extension}'. Supported formats: {allowed}")]
    UnsupportedFormat { extension: String, allowed: String },

    #[error("Failed to stage upload at '{path}': {source}")]
    Stage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Job queue unavailable: {0}")]
    Unavailable(#[from] WorkerError),
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Transcription for job {job_id} is not completed (status: {status})")]
    NotCompleted { job_id: String, status: String },

    #[error("Job {job_id} is still {status} and cannot be deleted")]
    StillRunning { job_id: String, status: String },

    #[error("Name must not be empty")]
    EmptyName,

    #[error("Persistence unavailable: {0}")]
    Persistence(#[from] crate::db::DatabaseError),
}

pub type Result<T> = std::result::Result<T, TranscriberError>;
