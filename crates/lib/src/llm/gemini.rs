//! Gemini REST client (generateContent).
//!
//! `generate` is one-shot; `chat` replays the conversation's history from the session store
//! and records the new turn when the model answers.

use crate::llm::{LlmBackend, LlmError};
use crate::session::{SessionMessage, SessionStore};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Client for the Gemini generateContent API.
#[derive(Clone)]
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
    history: SessionStore,
}

/// One message in the `contents` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
}

impl Content {
    fn text(role: &str, text: &str) -> Self {
        Self {
            role: Some(role.to_string()),
            parts: vec![Part {
                text: Some(text.to_string()),
            }],
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, if it has any.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: Option<String>, base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let model = model
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Self {
            base_url,
            api_key: api_key.into(),
            model,
            client: reqwest::Client::new(),
            history: SessionStore::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// POST /models/{model}:generateContent. The key travels in the `x-goog-api-key` header.
    pub async fn generate_content(&self, contents: Vec<Content>) -> Result<Option<String>, LlmError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let res = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.as_str())
            .json(&GenerateContentRequest { contents })
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("{} {}", status, body)));
        }
        let data: GenerateContentResponse = res.json().await?;
        Ok(data.text())
    }

    /// Multi-turn chat: sends the conversation history plus `text`, then records both turns.
    pub async fn chat(&self, conversation_id: &str, text: &str) -> Result<Option<String>, LlmError> {
        let mut contents: Vec<Content> = self
            .history
            .history(conversation_id)
            .await
            .iter()
            .map(|m| Content::text(&m.role, &m.content))
            .collect();
        contents.push(Content::text("user", text));
        let reply = self.generate_content(contents).await?;
        if let Some(ref r) = reply {
            self.history
                .append(
                    conversation_id,
                    [SessionMessage::user(text), SessionMessage::model(r.clone())],
                )
                .await;
        }
        Ok(reply)
    }

    /// Chat history currently kept for a conversation.
    pub async fn history(&self, conversation_id: &str) -> Vec<SessionMessage> {
        self.history.history(conversation_id).await
    }
}

#[async_trait]
impl LlmBackend for GeminiClient {
    async fn generate(&self, text: &str) -> Result<Option<String>, LlmError> {
        self.generate_content(vec![Content::text("user", text)]).await
    }

    async fn clear_history(&self, conversation_id: &str) {
        if self.history.clear(conversation_id).await {
            log::debug!("gemini: cleared chat history for {}", conversation_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_text_joins_first_candidate_parts() {
        let res: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates": [
                {"content": {"role": "model", "parts": [{"text": "Hel"}, {"text": "lo"}]}},
                {"content": {"role": "model", "parts": [{"text": "ignored"}]}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(res.text().as_deref(), Some("Hello"));
    }

    #[test]
    fn blocked_or_empty_response_has_no_text() {
        let blocked: GenerateContentResponse =
            serde_json::from_str(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#).unwrap();
        assert_eq!(blocked.text(), None);
        let empty: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates": [{"content": {"parts": [{"text": ""}]}}]}"#)
                .unwrap();
        assert_eq!(empty.text(), None);
    }

    #[test]
    fn request_body_shape() {
        let body = GenerateContentRequest {
            contents: vec![Content::text("user", "hi")],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"contents": [{"role": "user", "parts": [{"text": "hi"}]}]})
        );
    }

    #[test]
    fn defaults_when_unset() {
        let client = GeminiClient::new("k", Some("  ".into()), None);
        assert_eq!(client.model(), DEFAULT_MODEL);
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
    }

    #[tokio::test]
    async fn request_errors_do_not_reveal_the_key() {
        let client = GeminiClient::new("SECRETKEY123", None, Some("http://127.0.0.1:1".into()));
        let err = client.generate("hi").await.unwrap_err();
        assert!(matches!(err, LlmError::Request(_)));
        assert!(!err.to_string().contains("SECRETKEY123"), "{}", err);
    }
}
