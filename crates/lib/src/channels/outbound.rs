//! Outbound side of a channel: the handle the dispatcher replies through.

use async_trait::async_trait;

/// Rich text parse modes understood by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Markdown,
    MarkdownV2,
}

impl ParseMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Markdown => "Markdown",
            Self::MarkdownV2 => "MarkdownV2",
        }
    }
}

/// One reply attempt: text, formatting and reply linkage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub conversation_id: String,
    pub text: String,
    /// None sends the text literally.
    pub parse_mode: Option<ParseMode>,
    pub reply_to_message_id: Option<i64>,
    /// Succeed even when the replied-to message was deleted in the meantime.
    pub allow_sending_without_reply: bool,
}

impl OutboundMessage {
    /// A reply to `message_id` in `conversation_id`, rich formatted.
    pub fn reply(
        conversation_id: impl Into<String>,
        message_id: i64,
        text: impl Into<String>,
        parse_mode: ParseMode,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            text: text.into(),
            parse_mode: Some(parse_mode),
            reply_to_message_id: Some(message_id),
            allow_sending_without_reply: true,
        }
    }

    /// Same message with formatting disabled.
    pub fn into_plain(self) -> Self {
        Self {
            parse_mode: None,
            ..self
        }
    }
}

/// Channel send failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SendError {
    /// The platform answered with an error (e.g. Telegram `error_code` + `description`).
    #[error("api error {code}: {description}")]
    Api { code: i64, description: String },
    #[error("transport error: {0}")]
    Transport(String),
}

impl SendError {
    /// True when the platform refused the text because its markup could not be parsed.
    pub fn is_markup_rejected(&self) -> bool {
        match self {
            Self::Api { code, description } => {
                *code == 400 && description.to_lowercase().contains("can't parse entities")
            }
            Self::Transport(_) => false,
        }
    }
}

/// Handle to a running channel (stop, send message, typing indicator).
#[async_trait]
pub trait ChannelHandle: Send + Sync {
    /// Channel id (e.g. "telegram").
    fn id(&self) -> &str;
    /// Stop the channel connector. Default does nothing.
    fn stop(&self) {}
    /// Send one message as-is (no retries).
    async fn send_message(&self, message: &OutboundMessage) -> Result<(), SendError>;
    /// Show a "typing" indicator in the conversation.
    async fn send_typing(&self, conversation_id: &str) -> Result<(), SendError>;
}
