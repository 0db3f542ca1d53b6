//! Telegram channel: long-poll getUpdates, sendMessage and sendChatAction via Bot API.

use crate::channels::inbound::{ConversationKind, InboundEvent};
use crate::channels::outbound::{ChannelHandle, OutboundMessage, SendError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const LONG_POLL_TIMEOUT: u64 = 30;
const ERROR_BACKOFF_SECS: u64 = 2;

/// Bot API envelope: `{"ok": true, "result": ...}` or `{"ok": false, "error_code": 400, "description": "..."}`.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram update payload (getUpdates result item).
#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub reply_to_message: Option<Box<TelegramMessage>>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// The request URL carries the bot token, so it is dropped from the message.
fn transport_error(e: reqwest::Error) -> SendError {
    SendError::Transport(e.without_url().to_string())
}

/// Turn an update into an inbound event. Updates without a text message yield None.
pub fn event_from_update(channel_id: &str, update: &TelegramUpdate) -> Option<InboundEvent> {
    let msg = update.message.as_ref()?;
    let text = msg.text.as_ref()?;
    let sender_id = msg
        .from
        .as_ref()
        .map(|u| u.id.to_string())
        .unwrap_or_default();
    Some(InboundEvent {
        channel_id: channel_id.to_string(),
        sender_id,
        conversation_id: msg.chat.id.to_string(),
        conversation_kind: ConversationKind::from_telegram(&msg.chat.kind),
        message_id: msg.message_id,
        text: text.clone(),
        reply_text: msg
            .reply_to_message
            .as_ref()
            .and_then(|r| r.text.clone()),
    })
}

/// Telegram channel connector: long-polls for updates and sends replies via sendMessage.
pub struct TelegramChannel {
    id: String,
    token: String,
    api_base: String,
    running: AtomicBool,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(token: impl Into<String>, api_base: Option<String>) -> Self {
        let api_base = api_base
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| TELEGRAM_API_BASE.to_string());
        Self {
            id: "telegram".to_string(),
            token: token.into(),
            api_base,
            running: AtomicBool::new(false),
            client: reqwest::Client::new(),
        }
    }

    fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    /// POST a Bot API method with a JSON body and unwrap the envelope.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<Option<T>, SendError> {
        let res = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(transport_error)?;
        let parsed: Result<ApiResponse<T>, _> = serde_json::from_str(&text);
        let envelope = match parsed {
            Ok(env) => env,
            Err(_) if !status.is_success() => {
                return Err(SendError::Api {
                    code: i64::from(status.as_u16()),
                    description: text,
                })
            }
            Err(e) => return Err(SendError::Transport(format!("{} failed: {}", method, e))),
        };
        if !envelope.ok {
            return Err(SendError::Api {
                code: envelope
                    .error_code
                    .unwrap_or_else(|| i64::from(status.as_u16())),
                description: envelope.description.unwrap_or_default(),
            });
        }
        Ok(envelope.result)
    }

    /// getMe: the bot's own username (used to tell which commands are addressed to us).
    pub async fn get_me(&self) -> Result<Option<String>, SendError> {
        let me: Option<TelegramUser> = self.call("getMe", &serde_json::json!({})).await?;
        Ok(me.and_then(|u| u.username))
    }

    /// Call Telegram getUpdates (long poll). Returns (updates, next_offset).
    async fn get_updates(
        &self,
        offset: Option<i64>,
    ) -> Result<(Vec<TelegramUpdate>, Option<i64>), SendError> {
        let mut body = serde_json::json!({
            "timeout": LONG_POLL_TIMEOUT,
            "allowed_updates": ["message"],
        });
        if let Some(off) = offset {
            body["offset"] = serde_json::Value::from(off);
        }
        let updates: Vec<TelegramUpdate> = self.call("getUpdates", &body).await?.unwrap_or_default();
        let next_offset = updates
            .iter()
            .map(|u| u.update_id)
            .max()
            .map(|id| id + 1)
            .or(offset);
        Ok((updates, next_offset))
    }

    /// Start the getUpdates long-poll loop and forward text messages to the dispatcher. Returns a handle to await on shutdown.
    pub fn start_inbound(self: Arc<Self>, inbound_tx: mpsc::Sender<InboundEvent>) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        log::info!("telegram channel: starting getUpdates long-poll loop");
        tokio::spawn(async move {
            run_get_updates_loop(self, inbound_tx).await;
        })
    }
}

async fn run_get_updates_loop(channel: Arc<TelegramChannel>, inbound_tx: mpsc::Sender<InboundEvent>) {
    let mut offset: Option<i64> = None;
    while channel.running() {
        match channel.get_updates(offset).await {
            Ok((updates, next)) => {
                offset = next;
                for u in &updates {
                    let Some(event) = event_from_update(&channel.id, u) else {
                        continue;
                    };
                    if inbound_tx.send(event).await.is_err() {
                        log::debug!("telegram: inbound channel closed, stopping loop");
                        return;
                    }
                }
            }
            Err(e) => {
                log::warn!("telegram getUpdates error: {}", e);
                tokio::time::sleep(tokio::time::Duration::from_secs(ERROR_BACKOFF_SECS)).await;
            }
        }
    }
    log::info!("telegram channel: getUpdates loop stopped");
}

#[async_trait]
impl ChannelHandle for TelegramChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    async fn send_message(&self, message: &OutboundMessage) -> Result<(), SendError> {
        let mut body = serde_json::json!({
            "chat_id": message.conversation_id,
            "text": message.text,
        });
        if let Some(mode) = message.parse_mode {
            body["parse_mode"] = serde_json::Value::String(mode.as_str().to_string());
        }
        if let Some(id) = message.reply_to_message_id {
            body["reply_parameters"] = serde_json::json!({
                "message_id": id,
                "allow_sending_without_reply": message.allow_sending_without_reply,
            });
        }
        self.call::<serde_json::Value>("sendMessage", &body)
            .await
            .map(|_| ())
    }

    async fn send_typing(&self, conversation_id: &str) -> Result<(), SendError> {
        let body = serde_json::json!({ "chat_id": conversation_id, "action": "typing" });
        self.call::<serde_json::Value>("sendChatAction", &body)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(json: &str) -> TelegramUpdate {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn text_message_becomes_event() {
        let u = update(
            r#"{"update_id": 10, "message": {
                "message_id": 77,
                "from": {"id": 42, "username": "kai"},
                "chat": {"id": -1005, "type": "supergroup"},
                "text": "/translate",
                "reply_to_message": {"message_id": 70, "chat": {"id": -1005, "type": "supergroup"}, "text": " hello "}
            }}"#,
        );
        let event = event_from_update("telegram", &u).unwrap();
        assert_eq!(event.sender_id, "42");
        assert_eq!(event.conversation_id, "-1005");
        assert_eq!(event.conversation_kind, ConversationKind::Supergroup);
        assert_eq!(event.message_id, 77);
        assert_eq!(event.text, "/translate");
        assert_eq!(event.reply_text.as_deref(), Some(" hello "));
    }

    #[test]
    fn non_text_updates_are_skipped() {
        let sticker = update(
            r#"{"update_id": 11, "message": {"message_id": 1, "chat": {"id": 5, "type": "private"}}}"#,
        );
        let edited = update(r#"{"update_id": 12}"#);
        assert!(event_from_update("telegram", &sticker).is_none());
        assert!(event_from_update("telegram", &edited).is_none());
    }

    #[test]
    fn error_envelope_parses() {
        let env: ApiResponse<serde_json::Value> = serde_json::from_str(
            r#"{"ok": false, "error_code": 400, "description": "Bad Request: can't parse entities"}"#,
        )
        .unwrap();
        assert!(!env.ok);
        assert_eq!(env.error_code, Some(400));
        assert!(env.result.is_none());
    }

    #[test]
    fn envelope_without_result_parses_for_any_payload() {
        let env: ApiResponse<TelegramUser> = serde_json::from_str(r#"{"ok": true}"#).unwrap();
        assert!(env.ok);
        assert!(env.result.is_none());
        let env: ApiResponse<Vec<TelegramUpdate>> =
            serde_json::from_str(r#"{"ok": true, "result": [{"update_id": 3}]}"#).unwrap();
        assert_eq!(env.result.unwrap()[0].update_id, 3);
    }

    #[tokio::test]
    async fn transport_errors_do_not_reveal_the_token() {
        let channel = TelegramChannel::new("123:BOTTOKEN", Some("http://127.0.0.1:1".to_string()));
        let message = OutboundMessage::reply("500", 1, "hi", crate::channels::ParseMode::Markdown);
        match channel.send_message(&message).await {
            Err(e @ SendError::Transport(_)) => assert!(!e.to_string().contains("BOTTOKEN"), "{}", e),
            other => panic!("expected transport error, got {:?}", other),
        }
    }

    #[test]
    fn api_base_trailing_slash_is_trimmed() {
        let channel = TelegramChannel::new("T", Some("http://127.0.0.1:8081/".to_string()));
        assert_eq!(
            channel.method_url("sendMessage"),
            "http://127.0.0.1:8081/botT/sendMessage"
        );
        let default = TelegramChannel::new("T", None);
        assert_eq!(default.method_url("getMe"), "https://api.telegram.org/botT/getMe");
    }
}
