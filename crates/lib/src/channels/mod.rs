//! Communication channels (Telegram).
//!
//! Inbound events flow from the channel's long-poll loop to the dispatcher; replies go back
//! through the [`ChannelHandle`] trait so the dispatcher never depends on Bot API details.

mod inbound;
mod outbound;
mod telegram;

pub use inbound::{ConversationKind, InboundEvent};
pub use outbound::{ChannelHandle, OutboundMessage, ParseMode, SendError};
pub use telegram::{event_from_update, TelegramChannel, TelegramUpdate, TELEGRAM_API_BASE};
