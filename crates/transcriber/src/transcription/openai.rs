//! OpenAI-compatible `/audio/transcriptions` client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::{TranscriptionClient, TranscriptionError};
use crate::config::TranscriptionConfig;

pub struct OpenAiTranscriptionClient {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl OpenAiTranscriptionClient {
    pub fn new(
        api_key: SecretString,
        base_url: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, TranscriptionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TranscriptionError::Fatal(format!("client setup: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    pub fn from_config(
        config: &TranscriptionConfig,
        api_key: SecretString,
    ) -> Result<Self, TranscriptionError> {
        Self::new(
            api_key,
            &config.base_url,
            &config.model,
            config.request_timeout(),
        )
    }

    pub fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.base_url)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// Maps a non-success response onto the error taxonomy.
///
/// The service's `error.code` / `error.type` fields decide quota and rate
/// limits; otherwise the HTTP status does.
pub fn classify_error_response(status: StatusCode, body: &str) -> TranscriptionError {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let (message, markers) = match &parsed {
        Some(envelope) => {
            let code = match &envelope.error.code {
                Some(serde_json::Value::String(s)) => Some(s.as_str()),
                _ => None,
            };
            (
                envelope
                    .error
                    .message
                    .clone()
                    .unwrap_or_else(|| body.trim().to_string()),
                [code, envelope.error.kind.as_deref()],
            )
        }
        None => (body.trim().to_string(), [None, None]),
    };
    let detail = format!("status {}: {}", status.as_u16(), message);
    let has_marker = |marker: &str| markers.iter().flatten().any(|m| *m == marker);

    if has_marker("insufficient_quota") {
        return TranscriptionError::QuotaExceeded(detail);
    }
    if has_marker("rate_limit_exceeded") || status == StatusCode::TOO_MANY_REQUESTS {
        return TranscriptionError::RateLimited(detail);
    }
    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::CONFLICT
    {
        return TranscriptionError::Transient(detail);
    }
    TranscriptionError::Fatal(detail)
}

/// Maps a transport-level failure onto the error taxonomy.
pub fn classify_request_error(error: &reqwest::Error) -> TranscriptionError {
    if error.is_timeout() || error.is_connect() || error.is_body() || error.is_request() {
        TranscriptionError::Transient(format!("request: {}", error))
    } else {
        TranscriptionError::Fatal(format!("request: {}", error))
    }
}

#[async_trait]
impl TranscriptionClient for OpenAiTranscriptionClient {
    async fn transcribe(&self, audio: &[u8]) -> Result<String, TranscriptionError> {
        let file_part = multipart::Part::bytes(audio.to_vec())
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| TranscriptionError::Fatal(format!("mime: {}", e)))?;

        let form = multipart::Form::new()
            .text("model", self.model.clone())
            .text("response_format", "text")
            .part("file", file_part);

        tracing::debug!(model = %self.model, bytes = audio.len(), "Sending audio for transcription");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| classify_request_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error_response(status, &body));
        }

        let transcript = response
            .text()
            .await
            .map_err(|e| classify_request_error(&e))?;

        tracing::debug!(chars = transcript.len(), "Transcription call completed");

        Ok(transcript.trim().to_string())
    }
}
