use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::secrets::{expand_home, resolve_secret, SecretError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default = "default_work_directory")]
    pub work_directory: String,
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub segmentation: SegmentationConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_work_directory() -> String {
    std::env::temp_dir()
        .join("transcriber")
        .to_string_lossy()
        .into_owned()
}

fn default_worker_count() -> usize {
    num_cpus::get().clamp(1, 4)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            work_directory: default_work_directory(),
            database_path: None,
            worker_count: default_worker_count(),
            upload: UploadConfig::default(),
            segmentation: SegmentationConfig::default(),
            transcription: TranscriptionConfig::default(),
            retry: RetryConfig::default(),
            cleanup: CleanupConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Root for staged uploads and per-job work areas, with `~` expanded.
    pub fn work_dir(&self) -> PathBuf {
        PathBuf::from(expand_home(&self.work_directory))
    }

    /// Configured database location, falling back to
    /// `~/.transcriber/data/transcriber.db`.
    pub fn resolve_database_path(&self) -> Option<PathBuf> {
        match &self.database_path {
            Some(path) if !path.is_empty() => Some(PathBuf::from(expand_home(path))),
            _ => crate::db::default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

fn default_max_bytes() -> u64 {
    400 * 1024 * 1024
}

fn default_allowed_extensions() -> Vec<String> {
    [".mp3", ".wav", ".m4a", ".mp4", ".avi", ".mov", ".mkv"]
        .iter()
        .map(|e| e.to_string())
        .collect()
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationConfig {
    #[serde(default = "default_max_segment_seconds")]
    pub max_segment_seconds: u64,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,
}

fn default_max_segment_seconds() -> u64 {
    30 * 60
}

fn default_sample_rate() -> u32 {
    16_000
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe_path() -> String {
    "ffprobe".to_string()
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            max_segment_seconds: default_max_segment_seconds(),
            sample_rate: default_sample_rate(),
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_api_key_env_var")]
    pub api_key_env_var: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "whisper-1".to_string()
}

fn default_api_key_env_var() -> Option<String> {
    Some("OPENAI_API_KEY".to_string())
}

fn default_request_timeout_secs() -> u64 {
    300
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            api_key_file: None,
            api_key_env_var: default_api_key_env_var(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl TranscriptionConfig {
    pub fn resolve_api_key(&self) -> Result<SecretString, SecretError> {
        resolve_secret(
            self.api_key.as_deref(),
            self.api_key_file.as_deref(),
            self.api_key_env_var.as_deref(),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default)]
    pub retry_rate_limited: bool,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            retry_rate_limited: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    #[serde(default = "default_stale_upload_max_age_secs")]
    pub stale_upload_max_age_secs: u64,
}

fn default_stale_upload_max_age_secs() -> u64 {
    3_600
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            stale_upload_max_age_secs: default_stale_upload_max_age_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
