//! Inbound event from a channel: delivered to the dispatcher, processed once, not stored.

/// Kind of conversation an event came from (used by the group gate).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

impl ConversationKind {
    /// Map a Telegram `chat.type` value. Unknown types are treated as groups.
    pub fn from_telegram(kind: &str) -> Self {
        match kind {
            "private" => Self::Private,
            "supergroup" => Self::Supergroup,
            "channel" => Self::Channel,
            _ => Self::Group,
        }
    }

    pub fn is_private(self) -> bool {
        self == Self::Private
    }
}

/// A normalized text message from a channel.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub channel_id: String,
    pub sender_id: String,
    pub conversation_id: String,
    pub conversation_kind: ConversationKind,
    pub message_id: i64,
    pub text: String,
    /// Text of the message this one replies to, if any.
    pub reply_text: Option<String>,
}
