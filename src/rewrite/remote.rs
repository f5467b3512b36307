//! Remote rewriting via OpenAI-compatible chat completions
//!
//! The instruction goes into the system message, the selection into the
//! user message; the model is asked to return only the edited text.

use super::{RewriteRequest, Rewriter};
use crate::config::{Config, RewriteConfig};
use crate::error::RewriteError;
use serde::Deserialize;
use std::time::Duration;

const SYSTEM_PROMPT: &str = "Du bist ein Textbearbeitungs-Assistent. \
Wende die folgende Anweisung auf den Text des Nutzers an. \
Gib ausschließlich den bearbeiteten Text zurück, ohne Erklärungen.";

/// Remote rewriter using an OpenAI-compatible chat completions API
#[derive(Debug, Clone)]
pub struct RemoteRewriter {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: String,
}

impl RemoteRewriter {
    pub fn new(config: &RewriteConfig) -> Result<Self, RewriteError> {
        let endpoint = config.endpoint.clone();

        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(RewriteError::Config(format!(
                "rewrite endpoint must start with http:// or https://, got: {}",
                endpoint
            )));
        }

        Ok(Self {
            endpoint,
            model: config.model.clone(),
            api_key: Config::resolve_api_key(&config.api_key),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    /// Blocking request, run on the blocking pool
    fn send_request(&self, request: &RewriteRequest) -> Result<String, RewriteError> {
        let url = format!("{}/v1/chat/completions", self.endpoint.trim_end_matches('/'));

        let payload = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": format!("{}\n\nAnweisung: {}", SYSTEM_PROMPT, request.instruction)},
                {"role": "user", "content": request.source_text}
            ]
        });

        let mut http = ureq::post(&url).timeout(self.timeout);
        if let Some(ref key) = self.api_key {
            http = http.set("Authorization", &format!("Bearer {}", key));
        }

        let response = http.send_json(payload).map_err(classify_error)?;

        let chat: ChatResponse = response
            .into_json()
            .map_err(|e| RewriteError::Server(format!("Failed to parse response: {}", e)))?;

        let text = chat
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .ok_or(RewriteError::EmptyResult)?;

        if text.is_empty() {
            return Err(RewriteError::EmptyResult);
        }

        Ok(text)
    }
}

/// Map transport and status failures onto the shared taxonomy
fn classify_error(e: ureq::Error) -> RewriteError {
    match e {
        ureq::Error::Status(code, resp) => {
            let body = resp.into_string().unwrap_or_default();
            match code {
                429 => RewriteError::RateLimited(format!("Server returned 429: {}", body)),
                400..=499 => RewriteError::BadInput(format!("Server returned {}: {}", code, body)),
                _ => RewriteError::Server(format!("Server returned {}: {}", code, body)),
            }
        }
        ureq::Error::Transport(t) => RewriteError::Network(format!("Request failed: {}", t)),
    }
}

#[async_trait::async_trait]
impl Rewriter for RemoteRewriter {
    async fn rewrite(&self, request: &RewriteRequest) -> Result<String, RewriteError> {
        if request.source_text.trim().is_empty() {
            return Err(RewriteError::BadInput("Empty source text".into()));
        }

        let start = std::time::Instant::now();

        let this = self.clone();
        let req = request.clone();
        let result = tokio::task::spawn_blocking(move || this.send_request(&req))
            .await
            .map_err(|e| RewriteError::Server(format!("Rewrite task failed: {}", e)))??;

        tracing::info!(
            "Rewrite completed in {:.2}s ({} -> {} chars)",
            start.elapsed().as_secs_f32(),
            request.source_text.len(),
            result.len()
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_validation_rejects_bad_url() {
        let cfg = RewriteConfig {
            endpoint: "ftp://example.org".to_string(),
            ..RewriteConfig::default()
        };
        let result = RemoteRewriter::new(&cfg);
        assert!(result.is_err());
    }

    #[test]
    fn api_key_from_config() {
        let cfg = RewriteConfig {
            api_key: Some("sk-test".to_string()),
            ..RewriteConfig::default()
        };
        let rewriter = RemoteRewriter::new(&cfg).unwrap();
        assert_eq!(rewriter.api_key, Some("sk-test".to_string()));
    }

    #[test]
    fn chat_response_parsing() {
        let json = r#"{"choices": [{"message": {"role": "assistant", "content": "Bearbeiteter Text"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.choices[0].message.content, "Bearbeiteter Text");
    }
}
