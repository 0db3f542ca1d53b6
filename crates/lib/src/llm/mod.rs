//! Generation backend abstraction and the Gemini client.
//!
//! The dispatcher only sees [`LlmBackend`]: one-shot generation plus clearing the
//! per-conversation chat history the backend keeps.

mod gemini;

pub use gemini::{Content, GeminiClient, GenerateContentResponse, Part};

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("backend request failed: {0}")]
    Request(reqwest::Error),
    #[error("backend api error: {0}")]
    Api(String),
}

impl From<reqwest::Error> for LlmError {
    /// Request URLs are dropped so they never reach the logs.
    fn from(e: reqwest::Error) -> Self {
        Self::Request(e.without_url())
    }
}

/// Text generation backend.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Generate a reply for `text`. Ok(None) when the backend produced nothing.
    async fn generate(&self, text: &str) -> Result<Option<String>, LlmError>;

    /// Forget any chat history kept for this conversation.
    async fn clear_history(&self, conversation_id: &str);
}
