//! Per-conversation chat history kept by the backend for multi-turn chat.
//!
//! Keyed by conversation id (e.g. Telegram chat id). `/start` clears a conversation's history.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A single turn in a conversation (role is "user" or "model").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMessage {
    pub role: String,
    pub content: String,
}

impl SessionMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: "model".to_string(),
            content: content.into(),
        }
    }
}

/// In-memory store of chat histories (get, append, clear).
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, Vec<SessionMessage>>>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// History for a conversation; empty when none.
    pub async fn history(&self, conversation_id: &str) -> Vec<SessionMessage> {
        self.inner
            .read()
            .await
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Append messages to a conversation, creating it if needed.
    pub async fn append(&self, conversation_id: &str, messages: impl IntoIterator<Item = SessionMessage>) {
        let mut g = self.inner.write().await;
        g.entry(conversation_id.to_string())
            .or_default()
            .extend(messages);
    }

    /// Drop a conversation's history. Returns true if there was any.
    pub async fn clear(&self, conversation_id: &str) -> bool {
        self.inner.write().await.remove(conversation_id).is_some()
    }
}
