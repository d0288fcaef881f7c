//! Media collaborator boundary and its ffmpeg implementation.

use std::path::{Path, PathBuf};
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::error::MediaError;

/// Canonical PCM format handed to the transcription service: signed 16-bit
/// little endian WAV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u8,
}

impl AudioFormat {
    pub fn mono(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
        }
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::mono(16_000)
    }
}

/// Decode, probe and slice operations over media files.
#[async_trait]
pub trait MediaToolkit: Send + Sync {
    /// Total duration of the media in seconds.
    async fn probe_duration(&self, input: &Path) -> Result<f64, MediaError>;

    /// Decodes `input` and writes it to `output` in `format`.
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        format: &AudioFormat,
    ) -> Result<(), MediaError>;

    /// Writes `[start, start + duration)` of `input` to `output` in `format`.
    async fn extract(
        &self,
        input: &Path,
        output: &Path,
        start: f64,
        duration: f64,
        format: &AudioFormat,
    ) -> Result<(), MediaError>;
}

/// [`MediaToolkit`] backed by the `ffmpeg` and `ffprobe` executables.
#[derive(Debug, Clone)]
pub struct FfmpegToolkit {
    ffmpeg_path: PathBuf,
    ffprobe_path: PathBuf,
}

impl FfmpegToolkit {
    pub fn new(ffmpeg_path: impl Into<PathBuf>, ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    fn program_name(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string())
    }

    async fn run(&self, program: &Path, args: Vec<String>) -> Result<Output, MediaError> {
        let name = Self::program_name(program);
        debug!(program = %name, ?args, "Running media tool");

        let output = Command::new(program)
            .args(&args)
            .env("LC_ALL", "C")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| MediaError::Spawn {
                program: name.clone(),
                source: e,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last_line = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("unknown error")
                .trim()
                .to_string();
            return Err(MediaError::Failed {
                program: name,
                code: output.status.code().unwrap_or(-1),
                stderr: last_line,
            });
        }

        Ok(output)
    }

    async fn run_ffmpeg(&self, args: Vec<String>, output: &Path) -> Result<(), MediaError> {
        self.run(&self.ffmpeg_path, args).await?;
        match tokio::fs::metadata(output).await {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => Err(MediaError::MissingOutput(output.to_path_buf())),
        }
    }
}

impl Default for FfmpegToolkit {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

fn encode_args(format: &AudioFormat, output: &Path) -> Vec<String> {
    vec![
        "-vn".to_string(),
        "-acodec".to_string(),
        "pcm_s16le".to_string(),
        "-ar".to_string(),
        format.sample_rate.to_string(),
        "-ac".to_string(),
        format.channels.to_string(),
        output.to_string_lossy().into_owned(),
    ]
}

fn base_args(input: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-nostats".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-i".to_string(),
        input.to_string_lossy().into_owned(),
    ]
}

/// Parses the single-value output of
/// `ffprobe -show_entries format=duration -of csv=p=0`.
pub fn parse_probe_duration(stdout: &str) -> Option<f64> {
    stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .and_then(|l| l.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
}

#[async_trait]
impl MediaToolkit for FfmpegToolkit {
    async fn probe_duration(&self, input: &Path) -> Result<f64, MediaError> {
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "format=duration".to_string(),
            "-of".to_string(),
            "csv=p=0".to_string(),
            input.to_string_lossy().into_owned(),
        ];
        let output = self.run(&self.ffprobe_path, args).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_probe_duration(&stdout).ok_or_else(|| MediaError::InvalidOutput {
            program: Self::program_name(&self.ffprobe_path),
            output: stdout.trim().to_string(),
        })
    }

    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        format: &AudioFormat,
    ) -> Result<(), MediaError> {
        let mut args = base_args(input);
        args.extend(encode_args(format, output));
        self.run_ffmpeg(args, output).await
    }

    async fn extract(
        &self,
        input: &Path,
        output: &Path,
        start: f64,
        duration: f64,
        format: &AudioFormat,
    ) -> Result<(), MediaError> {
        let mut args = vec!["-ss".to_string(), format!("{:.3}", start)];
        args.extend(base_args(input));
        args.push("-t".to_string());
        args.push(format!("{:.3}", duration));
        args.extend(encode_args(format, output));
        self.run_ffmpeg(args, output).await
    }
}
