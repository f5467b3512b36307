//! Remote speech-to-text transcription via OpenAI-compatible API
//!
//! Sends the recorded audio to a whisper.cpp server or OpenAI-compatible
//! endpoint. The HTTP call is blocking (ureq) and runs on the blocking
//! thread pool; the async trait surface stays non-blocking.

use super::{TranscribeOptions, Transcriber, Transcription};
use crate::audio::AudioPayload;
use crate::config::{Config, TranscriptionConfig};
use crate::error::TranscribeError;
use std::time::Duration;

/// Remote transcriber using an OpenAI-compatible Whisper API
#[derive(Debug, Clone)]
pub struct RemoteTranscriber {
    /// Base endpoint URL (e.g. "https://api.openai.com")
    endpoint: String,
    /// Model name sent to the server
    model: String,
    /// Optional API key for authentication
    api_key: Option<String>,
    /// Request timeout
    timeout: Duration,
}

impl RemoteTranscriber {
    pub fn new(config: &TranscriptionConfig) -> Result<Self, TranscribeError> {
        let endpoint = config.endpoint.clone();

        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(TranscribeError::Config(format!(
                "transcription endpoint must start with http:// or https://, got: {}",
                endpoint
            )));
        }

        if endpoint.starts_with("http://")
            && !endpoint.contains("localhost")
            && !endpoint.contains("127.0.0.1")
            && !endpoint.contains("[::1]")
        {
            tracing::warn!(
                "Transcription endpoint uses HTTP without TLS. Audio will be transmitted unencrypted!"
            );
        }

        let api_key = Config::resolve_api_key(&config.api_key);

        Ok(Self {
            endpoint,
            model: config.model.clone(),
            api_key,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    /// Build the multipart form body for the API request
    fn build_multipart_body(
        &self,
        wav_data: &[u8],
        options: &TranscribeOptions,
    ) -> (String, Vec<u8>) {
        let boundary = format!(
            "----DiktatBoundary{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );

        let mut body = Vec::new();

        let text_field = |body: &mut Vec<u8>, name: &str, value: &str| {
            body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            );
            body.extend_from_slice(value.as_bytes());
            body.extend_from_slice(b"\r\n");
        };

        // File field first
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"file\"; filename=\"audio.wav\"\r\n",
        );
        body.extend_from_slice(b"Content-Type: audio/wav\r\n\r\n");
        body.extend_from_slice(wav_data);
        body.extend_from_slice(b"\r\n");

        text_field(&mut body, "model", &self.model);
        text_field(&mut body, "language", &options.language);
        text_field(&mut body, "temperature", &format!("{:.2}", options.temperature));
        if let Some(ref hint) = options.prompt_hint {
            text_field(&mut body, "prompt", hint);
        }
        text_field(&mut body, "response_format", "json");

        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

        (boundary, body)
    }

    /// Blocking request, run on the blocking pool
    fn send_request(&self, body: Vec<u8>, boundary: String) -> Result<Transcription, TranscribeError> {
        let url = format!(
            "{}/v1/audio/transcriptions",
            self.endpoint.trim_end_matches('/')
        );

        let mut request = ureq::post(&url).timeout(self.timeout).set(
            "Content-Type",
            &format!("multipart/form-data; boundary={}", boundary),
        );

        if let Some(ref key) = self.api_key {
            request = request.set("Authorization", &format!("Bearer {}", key));
        }

        let response = request.send_bytes(&body).map_err(classify_error)?;

        let json: serde_json::Value = response
            .into_json()
            .map_err(|e| TranscribeError::Server(format!("Failed to parse response: {}", e)))?;

        let text = json
            .get("text")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                TranscribeError::Server(format!("Response missing 'text' field: {}", json))
            })?
            .trim()
            .to_string();

        let language = json
            .get("language")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        let confidence = json
            .get("confidence")
            .and_then(|v| v.as_f64())
            .map(|c| c as f32);

        Ok(Transcription {
            text,
            language,
            confidence,
        })
    }
}

/// Map transport and status failures onto the retry-relevant taxonomy
fn classify_error(e: ureq::Error) -> TranscribeError {
    match e {
        ureq::Error::Status(code, resp) => {
            let body = resp.into_string().unwrap_or_default();
            match code {
                429 => TranscribeError::RateLimited(format!("Server returned 429: {}", body)),
                400..=499 => TranscribeError::BadInput(format!("Server returned {}: {}", code, body)),
                _ => TranscribeError::Server(format!("Server returned {}: {}", code, body)),
            }
        }
        ureq::Error::Transport(t) => TranscribeError::Network(format!("Request failed: {}", t)),
    }
}

#[async_trait::async_trait]
impl Transcriber for RemoteTranscriber {
    async fn transcribe(
        &self,
        audio: &AudioPayload,
        options: &TranscribeOptions,
    ) -> Result<Transcription, TranscribeError> {
        if audio.samples.is_empty() {
            return Err(TranscribeError::BadInput("Empty audio buffer".into()));
        }

        tracing::debug!(
            "Sending {:.2}s of audio (temperature {:.2})",
            audio.duration().as_secs_f32(),
            options.temperature
        );

        let start = std::time::Instant::now();

        let wav_data = audio
            .wav_bytes()
            .map_err(|e| TranscribeError::BadInput(e.to_string()))?;
        let (boundary, body) = self.build_multipart_body(&wav_data, options);

        let this = self.clone();
        let result = tokio::task::spawn_blocking(move || this.send_request(body, boundary))
            .await
            .map_err(|e| TranscribeError::Server(format!("Transcription task failed: {}", e)))??;

        tracing::info!(
            "Remote transcription completed in {:.2}s: {:?}",
            start.elapsed().as_secs_f32(),
            if result.text.chars().count() > 50 {
                format!("{}...", result.text.chars().take(50).collect::<String>())
            } else {
                result.text.clone()
            }
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TranscriptionConfig;

    fn config() -> TranscriptionConfig {
        TranscriptionConfig {
            endpoint: "http://localhost:8080".to_string(),
            model: "whisper-1".to_string(),
            ..TranscriptionConfig::default()
        }
    }

    fn options() -> TranscribeOptions {
        TranscribeOptions {
            language: "de".to_string(),
            temperature: 0.4,
            prompt_hint: None,
        }
    }

    #[test]
    fn config_validation_rejects_bad_url() {
        let cfg = TranscriptionConfig {
            endpoint: "not-a-url".to_string(),
            ..TranscriptionConfig::default()
        };
        let result = RemoteTranscriber::new(&cfg);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("http://"));
    }

    #[test]
    fn multipart_body_structure() {
        let transcriber = RemoteTranscriber::new(&config()).unwrap();
        let wav_data = vec![0u8; 100];

        let (boundary, body) = transcriber.build_multipart_body(&wav_data, &options());
        let body_str = String::from_utf8_lossy(&body);

        assert!(body_str.contains(&boundary));
        assert!(body_str.contains("name=\"file\""));
        assert!(body_str.contains("filename=\"audio.wav\""));
        assert!(body_str.contains("name=\"model\""));
        assert!(body_str.contains("whisper-1"));
        assert!(body_str.contains("name=\"language\""));
        assert!(body_str.contains("name=\"temperature\""));
        assert!(body_str.contains("0.40"));
        assert!(body_str.contains("name=\"response_format\""));
        // No prompt field unless a hint is set
        assert!(!body_str.contains("name=\"prompt\""));
    }

    #[test]
    fn multipart_body_carries_prompt_hint() {
        let transcriber = RemoteTranscriber::new(&config()).unwrap();
        let opts = TranscribeOptions {
            prompt_hint: Some("schlechte Aufnahme".to_string()),
            ..options()
        };

        let (_, body) = transcriber.build_multipart_body(&[0u8; 10], &opts);
        let body_str = String::from_utf8_lossy(&body);

        assert!(body_str.contains("name=\"prompt\""));
        assert!(body_str.contains("schlechte Aufnahme"));
    }

    #[test]
    fn api_key_from_config() {
        let cfg = TranscriptionConfig {
            api_key: Some("sk-test-key-123".to_string()),
            ..config()
        };
        let transcriber = RemoteTranscriber::new(&cfg).unwrap();
        assert_eq!(transcriber.api_key, Some("sk-test-key-123".to_string()));
    }

    #[test]
    fn timeout_from_config() {
        let cfg = TranscriptionConfig {
            timeout_secs: 60,
            ..config()
        };
        let transcriber = RemoteTranscriber::new(&cfg).unwrap();
        assert_eq!(transcriber.timeout, Duration::from_secs(60));
    }
}
