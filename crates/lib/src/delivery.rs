//! Reply delivery with a plain-text fallback.
//!
//! A reply is sent with its rich parse mode first. When the platform refuses the markup
//! (see [`SendError::is_markup_rejected`]) the same text is sent once more without formatting.
//! Delivery never fails the caller: errors are logged and, when the plain retry also fails,
//! a generic failure notice is attempted once.

use crate::channels::{ChannelHandle, OutboundMessage};

/// Sent to the user when even the plain-text retry failed.
pub const GENERIC_FAILURE: &str = "Error occurred";

/// How a delivery ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Delivered as requested.
    Sent,
    /// Markup was rejected; delivered without formatting.
    SentPlain,
    /// Not delivered.
    Failed,
}

/// Send `message`, retrying once without formatting if its markup is rejected.
pub async fn deliver(channel: &dyn ChannelHandle, message: OutboundMessage) -> DeliveryOutcome {
    let err = match channel.send_message(&message).await {
        Ok(()) => return DeliveryOutcome::Sent,
        Err(e) => e,
    };
    if message.parse_mode.is_none() || !err.is_markup_rejected() {
        log::error!(
            "{}: send to {} failed: {}",
            channel.id(),
            message.conversation_id,
            err
        );
        return DeliveryOutcome::Failed;
    }

    log::warn!(
        "{}: formatted send to {} rejected, retrying as plain text: {}",
        channel.id(),
        message.conversation_id,
        err
    );
    let plain = message.into_plain();
    match channel.send_message(&plain).await {
        Ok(()) => DeliveryOutcome::SentPlain,
        Err(e) => {
            log::error!(
                "{}: plain retry to {} failed: {}",
                channel.id(),
                plain.conversation_id,
                e
            );
            let notice = OutboundMessage {
                text: GENERIC_FAILURE.to_string(),
                ..plain
            };
            if let Err(e) = channel.send_message(&notice).await {
                log::error!("{}: failure notice not delivered: {}", channel.id(), e);
            }
            DeliveryOutcome::Failed
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::channels::{ParseMode, SendError};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Channel that records every send and answers from a scripted queue (Ok once the queue is empty).
    #[derive(Default)]
    pub(crate) struct RecordingChannel {
        pub sent: Mutex<Vec<OutboundMessage>>,
        pub typing: Mutex<Vec<String>>,
        script: Mutex<VecDeque<Result<(), SendError>>>,
    }

    impl RecordingChannel {
        pub(crate) fn scripted(results: Vec<Result<(), SendError>>) -> Self {
            Self {
                script: Mutex::new(results.into()),
                ..Default::default()
            }
        }

        pub(crate) fn sent(&self) -> Vec<OutboundMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChannelHandle for RecordingChannel {
        fn id(&self) -> &str {
            "test"
        }

        async fn send_message(&self, message: &OutboundMessage) -> Result<(), SendError> {
            self.sent.lock().unwrap().push(message.clone());
            self.script.lock().unwrap().pop_front().unwrap_or(Ok(()))
        }

        async fn send_typing(&self, conversation_id: &str) -> Result<(), SendError> {
            self.typing.lock().unwrap().push(conversation_id.to_string());
            Ok(())
        }
    }

    fn parse_error() -> SendError {
        SendError::Api {
            code: 400,
            description: "Bad Request: can't parse entities: Can't find end of Bold entity".into(),
        }
    }

    fn message() -> OutboundMessage {
        OutboundMessage::reply("100", 7, "**unbalanced", ParseMode::Markdown)
    }

    #[tokio::test]
    async fn sends_rich_once_when_accepted() {
        let channel = RecordingChannel::default();
        assert_eq!(deliver(&channel, message()).await, DeliveryOutcome::Sent);
        assert_eq!(channel.sent(), vec![message()]);
    }

    #[tokio::test]
    async fn markup_rejection_retries_once_in_plain() {
        let channel = RecordingChannel::scripted(vec![Err(parse_error())]);
        assert_eq!(deliver(&channel, message()).await, DeliveryOutcome::SentPlain);
        let sent = channel.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1], message().into_plain());
        assert_eq!(sent[1].text, sent[0].text);
    }

    #[tokio::test]
    async fn other_rejections_are_not_retried() {
        let channel = RecordingChannel::scripted(vec![Err(SendError::Api {
            code: 403,
            description: "Forbidden: bot was blocked by the user".into(),
        })]);
        assert_eq!(deliver(&channel, message()).await, DeliveryOutcome::Failed);
        assert_eq!(channel.sent().len(), 1);

        let channel = RecordingChannel::scripted(vec![Err(SendError::Transport("timeout".into()))]);
        assert_eq!(deliver(&channel, message()).await, DeliveryOutcome::Failed);
        assert_eq!(channel.sent().len(), 1);
    }

    #[tokio::test]
    async fn failed_retry_sends_generic_notice_once() {
        let channel = RecordingChannel::scripted(vec![
            Err(parse_error()),
            Err(SendError::Transport("reset".into())),
            Err(SendError::Transport("reset".into())),
        ]);
        assert_eq!(deliver(&channel, message()).await, DeliveryOutcome::Failed);
        let sent = channel.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[2].text, GENERIC_FAILURE);
        assert_eq!(sent[2].parse_mode, None);
        assert_eq!(sent[2].reply_to_message_id, Some(7));
    }

    #[tokio::test]
    async fn plain_message_rejection_is_not_retried() {
        let channel = RecordingChannel::scripted(vec![Err(parse_error())]);
        let plain = message().into_plain();
        assert_eq!(deliver(&channel, plain).await, DeliveryOutcome::Failed);
        assert_eq!(channel.sent().len(), 1);
    }
}
