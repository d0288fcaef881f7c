//! Speech-to-text service boundary.

pub mod error;
pub mod openai;

use async_trait::async_trait;

pub use error::TranscriptionError;
pub use openai::OpenAiTranscriptionClient;

/// One call to the external speech-to-text service.
///
/// Implementations classify failures into [`TranscriptionError`] and never
/// retry on their own.
#[async_trait]
pub trait TranscriptionClient: Send + Sync {
    async fn transcribe(&self, audio: &[u8]) -> Result<String, TranscriptionError>;
}
