//! Admission checks and staging for uploaded media.

use std::path::{Path, PathBuf};

use crate::config::UploadConfig;
use crate::error::SubmitError;
use crate::job::JobId;

/// File name prefix of staged uploads under `<work>/uploads`.
pub const UPLOAD_PREFIX: &str = "upload_";

const MAX_SAFE_NAME_LEN: usize = 100;

#[derive(Debug, Clone)]
pub struct UploadPolicy {
    max_bytes: u64,
    allowed_extensions: Vec<String>,
}

impl UploadPolicy {
    pub fn new(max_bytes: u64, allowed_extensions: &[String]) -> Self {
        Self {
            max_bytes,
            allowed_extensions: allowed_extensions
                .iter()
                .map(|e| e.to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(config.max_bytes, &config.allowed_extensions)
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Rejects empty or oversized uploads and unknown extensions.
    /// Extensions compare case-insensitively.
    pub fn validate(&self, original_name: &str, byte_size: u64) -> Result<(), SubmitError> {
        let extension = extension_of(original_name);
        if !self.allowed_extensions.iter().any(|e| *e == extension) {
            return Err(SubmitError::UnsupportedFormat {
                extension: if extension.is_empty() {
                    "(none)".to_string()
                } else {
                    extension
                },
                allowed: self.allowed_extensions.join(", "),
            });
        }
        if byte_size == 0 {
            return Err(SubmitError::EmptyUpload);
        }
        if byte_size > self.max_bytes {
            return Err(SubmitError::TooLarge {
                size: byte_size,
                max: self.max_bytes,
            });
        }
        Ok(())
    }
}

/// Lowercased extension including the dot, or an empty string.
fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Base name of `original_name` reduced to characters that are safe in a
/// file name on every platform.
pub fn safe_file_name(original_name: &str) -> String {
    let base = original_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(original_name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    let mut name = if trimmed.is_empty() {
        "media".to_string()
    } else {
        trimmed.to_string()
    };
    if name.len() > MAX_SAFE_NAME_LEN {
        let cut = name.len() - MAX_SAFE_NAME_LEN;
        name.drain(..cut);
    }
    name
}

/// `<uploads_dir>/upload_<id>_<safe name>`
pub fn staged_path(uploads_dir: &Path, job_id: &JobId, original_name: &str) -> PathBuf {
    uploads_dir.join(format!(
        "{}{}_{}",
        UPLOAD_PREFIX,
        job_id,
        safe_file_name(original_name)
    ))
}
