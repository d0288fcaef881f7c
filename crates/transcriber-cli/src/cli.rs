//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Transcribe audio and video files in the background
#[derive(Parser, Debug)]
#[command(name = "transcriber", version, about)]
pub struct Cli {
    /// Path to a JSON configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit files and wait for their transcripts
    Transcribe {
        /// Media files to transcribe
        #[arg(required = true, value_name = "FILES")]
        files: Vec<PathBuf>,

        /// Write `<name>_transcription.txt` files here instead of printing
        #[arg(long, short, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },

    /// Show the status of one job as JSON
    Status {
        #[arg(value_name = "JOB_ID")]
        job_id: String,
    },

    /// List finished jobs, newest first
    History {
        #[arg(long, short, default_value_t = 20)]
        limit: usize,
    },

    /// Save the transcript of a completed job
    Download {
        #[arg(value_name = "JOB_ID")]
        job_id: String,

        /// Output file; defaults to `<name>_transcription.txt`
        #[arg(long, short, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Change the display name of a job
    Rename {
        #[arg(value_name = "JOB_ID")]
        job_id: String,

        #[arg(value_name = "NAME")]
        name: String,
    },

    /// Delete a job record
    Delete {
        #[arg(value_name = "JOB_ID")]
        job_id: String,
    },
}
