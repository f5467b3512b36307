//! Speech-to-text transcription module
//!
//! Provides transcription via a remote OpenAI-compatible Whisper API,
//! wrapped in an escalating retry engine with local pre-flight checks.

pub mod remote;
pub mod retry;

use crate::audio::AudioPayload;
use crate::config::TranscriptionConfig;
use crate::error::TranscribeError;

/// Per-request transcription parameters.
///
/// The orchestrator keys these on the session mode: command sessions use a
/// low temperature for short precise commands, dictation sessions a higher
/// one for quiet or unclear speech. The retry engine escalates temperature
/// further on failed attempts.
#[derive(Debug, Clone)]
pub struct TranscribeOptions {
    /// Spoken language code ("de", "en", ...)
    pub language: String,
    /// Acoustic sampling temperature (0.0 = deterministic)
    pub temperature: f32,
    /// Optional prompt hint steering the model
    pub prompt_hint: Option<String>,
}

/// A successful transcription result
#[derive(Debug, Clone)]
pub struct Transcription {
    pub text: String,
    /// Language the endpoint reports having detected, if any
    pub language: Option<String>,
    /// Endpoint-reported confidence, if any
    pub confidence: Option<f32>,
}

/// Trait for speech-to-text implementations
#[async_trait::async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe an audio payload to text
    async fn transcribe(
        &self,
        audio: &AudioPayload,
        options: &TranscribeOptions,
    ) -> Result<Transcription, TranscribeError>;
}

/// Factory function to create the configured transcriber
pub fn create_transcriber(
    config: &TranscriptionConfig,
) -> Result<Box<dyn Transcriber>, TranscribeError> {
    tracing::info!(
        "Creating transcriber: endpoint={}, model={}",
        config.endpoint,
        config.model
    );
    Ok(Box::new(remote::RemoteTranscriber::new(config)?))
}
