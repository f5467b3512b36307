//! Escalating retry around the transcription endpoint
//!
//! The remote call is fallible and latency-bearing; a failed or empty
//! attempt is retried with increasing acoustic temperature and, on the
//! final attempt, a prompt hint acknowledging degraded audio. Payloads
//! that are too short or effectively silent are rejected locally before
//! any network traffic.

use super::{TranscribeOptions, Transcriber, Transcription};
use crate::audio::silence::SilenceAnalyzer;
use crate::audio::AudioPayload;
use crate::config::{AudioConfig, RetryConfig};
use crate::error::TranscribeError;
use std::time::Duration;

/// Outcome of a transcription request after pre-flight and retries
#[derive(Debug, Clone)]
pub enum TranscriptOutcome {
    /// Usable transcript
    Text(Transcription),
    /// Recording below the minimum duration; never sent to the endpoint
    TooShort,
    /// Recording dominated by near-silent frames; never sent to the endpoint
    Silence,
}

impl TranscriptOutcome {
    /// User guidance for locally rejected recordings
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            TranscriptOutcome::Text(_) => None,
            TranscriptOutcome::TooShort => {
                Some("Aufnahme zu kurz. Bitte etwas länger sprechen.")
            }
            TranscriptOutcome::Silence => {
                Some("Keine Sprache erkannt. Bitte näher ans Mikrofon sprechen.")
            }
        }
    }
}

/// Retry engine wrapping a transcriber with pre-flight checks and the
/// configured escalation policy
pub struct RetryEngine {
    policy: RetryConfig,
    min_duration: Duration,
    analyzer: SilenceAnalyzer,
}

impl RetryEngine {
    pub fn new(audio: &AudioConfig, policy: &RetryConfig) -> Self {
        Self {
            policy: policy.clone(),
            min_duration: Duration::from_millis(audio.min_duration_ms),
            analyzer: SilenceAnalyzer::new(&audio.silence),
        }
    }

    /// Options for a given attempt (1-based): temperature climbs linearly
    /// toward the configured maximum; the final attempt swaps in the
    /// degraded-audio prompt hint.
    pub fn options_for_attempt(&self, base: &TranscribeOptions, attempt: u32) -> TranscribeOptions {
        let escalation = self.policy.temperature_step * (attempt.saturating_sub(1)) as f32;
        let temperature = (base.temperature + escalation).min(self.policy.max_temperature);

        let prompt_hint = if attempt >= self.policy.max_attempts {
            Some(self.policy.degraded_prompt.clone())
        } else {
            base.prompt_hint.clone()
        };

        TranscribeOptions {
            language: base.language.clone(),
            temperature,
            prompt_hint,
        }
    }

    /// Transcribe with pre-flight short-circuits and escalating retries.
    /// Fails only after exhausting all attempts.
    pub async fn transcribe(
        &self,
        transcriber: &dyn Transcriber,
        audio: &AudioPayload,
        base: &TranscribeOptions,
    ) -> Result<TranscriptOutcome, TranscribeError> {
        if audio.duration() < self.min_duration {
            tracing::info!(
                "Recording too short ({} ms < {} ms), skipping endpoint",
                audio.duration_ms(),
                self.min_duration.as_millis()
            );
            return Ok(TranscriptOutcome::TooShort);
        }

        let report = self.analyzer.analyze(&audio.samples, audio.sample_rate);
        if report.is_silence {
            tracing::info!(
                "Recording is {:.0}% silence, skipping endpoint",
                report.silent_frame_ratio * 100.0
            );
            return Ok(TranscriptOutcome::Silence);
        }

        let mut last_error = TranscribeError::EmptyResult;

        for attempt in 1..=self.policy.max_attempts {
            if attempt > 1 {
                let backoff = self.policy.backoff_step() * (attempt - 1);
                tracing::debug!("Waiting {:?} before attempt {}", backoff, attempt);
                tokio::time::sleep(backoff).await;
            }

            let options = self.options_for_attempt(base, attempt);
            tracing::debug!(
                "Transcription attempt {}/{} (temperature {:.2})",
                attempt,
                self.policy.max_attempts,
                options.temperature
            );

            match transcriber.transcribe(audio, &options).await {
                Ok(result) if !result.text.trim().is_empty() => {
                    if attempt > 1 {
                        tracing::info!("Transcription succeeded on attempt {}", attempt);
                    }
                    return Ok(TranscriptOutcome::Text(result));
                }
                // Blank transcripts are retried like transport errors
                Ok(_) => {
                    tracing::warn!("Attempt {} returned a blank transcript", attempt);
                    last_error = TranscribeError::EmptyResult;
                }
                Err(e) => {
                    tracing::warn!("Attempt {} failed: {}", attempt, e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}
