//! Remote text rewriting module
//!
//! Applies a natural-language editing instruction to previously selected
//! text via an OpenAI-compatible chat completions endpoint. A single
//! attempt per session: only transcription is retried, a failed rewrite
//! falls back to an explanatory message instead.

pub mod remote;

use crate::config::RewriteConfig;
use crate::error::RewriteError;

/// One rewrite request: the canonical instruction plus the verbatim
/// selection it applies to
#[derive(Debug, Clone)]
pub struct RewriteRequest {
    pub instruction: String,
    pub source_text: String,
}

/// Trait for text rewriting implementations
#[async_trait::async_trait]
pub trait Rewriter: Send + Sync {
    /// Apply the instruction to the source text, returning the edited text
    async fn rewrite(&self, request: &RewriteRequest) -> Result<String, RewriteError>;
}

/// Factory function to create the configured rewriter
pub fn create_rewriter(config: &RewriteConfig) -> Result<Box<dyn Rewriter>, RewriteError> {
    tracing::info!(
        "Creating rewriter: endpoint={}, model={}",
        config.endpoint,
        config.model
    );
    Ok(Box::new(remote::RemoteRewriter::new(config)?))
}
