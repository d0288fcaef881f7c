use std::path::PathBuf;
use thiserror::Error;

/// Failures reported by the media collaborator.
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with code {code}: {stderr}")]
    Failed {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error("Unexpected output from {program}: {output}")]
    InvalidOutput { program: String, output: String },

    #[error("Expected output file '{0}' was not produced")]
    MissingOutput(PathBuf),
}

/// Conversion or segmentation failure for a whole input.
#[derive(Error, Debug)]
pub enum SegmentError {
    #[error("Failed to decode input: {0}")]
    Decode(#[from] MediaError),

    #[error("Input has no audio (duration {duration}s)")]
    EmptyAudio { duration: f64 },

    #[error("None of the {planned} planned segments could be produced")]
    NoSegments { planned: usize },

    #[error("Work area IO error for '{path}': {source}")]
    WorkArea {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
