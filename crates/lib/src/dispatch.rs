//! Command dispatcher: routes each inbound event to its handler and delivers the reply.
//!
//! | command      | gated | backend call                              | empty result |
//! |--------------|-------|-------------------------------------------|--------------|
//! | `/start`     | yes   | clears the conversation's chat history    | -            |
//! | `/about`     | no    | -                                         | -            |
//! | `/translate` | yes   | translation of the replied-to message     | placeholder  |
//! | `/setprompt` | admin | -                                         | -            |
//! | plain text   | opt.  | custom prompt + message                   | passthrough  |
//!
//! Every handler is fault-isolated: errors are logged and answered with a generic notice,
//! never returned to the caller.

use crate::channels::{ChannelHandle, InboundEvent, OutboundMessage, ParseMode};
use crate::command::{self, Command};
use crate::delivery::{self, DeliveryOutcome, GENERIC_FAILURE};
use crate::gate::GroupGate;
use crate::llm::LlmBackend;
use crate::prompt_store::PromptStore;
use anyhow::Context;
use std::collections::HashSet;
use std::sync::Arc;

pub const GREETING: &str =
    "Hi, this is *Gemini Bot BD*, ready to chat with you. \nReply to my message to start chatting...";
pub const ABOUT: &str = r"I am *Anya*\. I am a Telegram bot developed by *Reinhart \(kiri\)* \(@kiri\0507\) and maintained by *Kai* \(@kiri0507\)\. I am here to chat with you\.";
pub const TRANSLATE_HINT: &str = "Reply to a message to translate it";
pub const TRANSLATE_PLACEHOLDER: &str = "🤐";
pub const NOT_AUTHORIZED: &str = "❌ You are not authorized to set the prompt.";
pub const PROMPT_MISSING: &str = "⚠️ Please provide a prompt after the command.";
pub const PROMPT_UPDATED: &str = "✅ Prompt has been updated successfully.";
pub const PROMPT_UPDATE_FAILED: &str = "❌ An error occurred while updating the prompt.";

/// What to reply when the backend returns nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyResult {
    /// Reply with this fixed text instead.
    Placeholder(&'static str),
    /// Relay the (empty) result as-is.
    Passthrough,
}

/// Dispatcher switches (from the `dispatch` config section).
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Apply the group gate to plain text too.
    pub gate_plain_text: bool,
    /// Language code used in translation requests.
    pub translate_target: String,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            gate_plain_text: false,
            translate_target: "bn".to_string(),
        }
    }
}

/// Request text for the backend: `<prompt>\n<message>` when a prompt is set, else the message.
pub fn compose_prompt(prompt: Option<&str>, message: &str) -> String {
    match prompt {
        Some(p) if !p.is_empty() => format!("{}\n{}", p, message),
        _ => message.to_string(),
    }
}

/// Translation instruction wrapping the quoted text.
pub fn translation_request(target: &str, text: &str) -> String {
    format!("translate to {}: \"{}\"", target, text.trim())
}

pub struct Dispatcher {
    channel: Arc<dyn ChannelHandle>,
    backend: Arc<dyn LlmBackend>,
    prompts: Arc<dyn PromptStore>,
    gate: Arc<dyn GroupGate>,
    admins: HashSet<String>,
    options: DispatchOptions,
    bot_username: Option<String>,
}

impl Dispatcher {
    pub fn new(
        channel: Arc<dyn ChannelHandle>,
        backend: Arc<dyn LlmBackend>,
        prompts: Arc<dyn PromptStore>,
        gate: Arc<dyn GroupGate>,
        admins: HashSet<String>,
    ) -> Self {
        Self {
            channel,
            backend,
            prompts,
            gate,
            admins,
            options: DispatchOptions::default(),
            bot_username: None,
        }
    }

    pub fn with_options(mut self, options: DispatchOptions) -> Self {
        self.options = options;
        self
    }

    /// The bot's own username, so `/cmd@username` is recognized and `/cmd@other` ignored.
    pub fn with_bot_username(mut self, username: Option<String>) -> Self {
        self.bot_username = username;
        self
    }

    /// Handle one inbound event end to end. Never fails.
    pub async fn dispatch(&self, event: InboundEvent) {
        let Some(command) = command::parse(&event.text, self.bot_username.as_deref()) else {
            log::debug!("ignoring command addressed to another bot in {}", event.conversation_id);
            return;
        };
        if command != Command::Text {
            log::info!("received /{} command", command.name());
        }
        let name = command.name();
        let result = match command {
            Command::Start => self.handle_start(&event).await,
            Command::About => self.handle_about(&event).await,
            Command::Translate => self.handle_translate(&event).await,
            Command::SetPrompt(text) => self.handle_set_prompt(&event, &text).await,
            Command::Text => self.handle_text(&event).await,
        };
        if let Err(e) = result {
            log::error!("error in {} handler for {}: {:#}", name, event.conversation_id, e);
            let notice = self.reply(&event, GENERIC_FAILURE).into_plain();
            if let Err(e) = self.channel.send_message(&notice).await {
                log::error!("failure notice not delivered to {}: {}", event.conversation_id, e);
            }
        }
    }

    fn reply(&self, event: &InboundEvent, text: &str) -> OutboundMessage {
        OutboundMessage::reply(
            event.conversation_id.clone(),
            event.message_id,
            text,
            ParseMode::Markdown,
        )
    }

    async fn send(&self, event: &InboundEvent, text: &str) -> DeliveryOutcome {
        delivery::deliver(self.channel.as_ref(), self.reply(event, text)).await
    }

    fn gate_allows(&self, event: &InboundEvent) -> bool {
        let allowed = self.gate.allowed(event);
        if !allowed {
            log::debug!("not allowed to respond in {}", event.conversation_id);
        }
        allowed
    }

    async fn handle_start(&self, event: &InboundEvent) -> anyhow::Result<()> {
        if !self.gate_allows(event) {
            return Ok(());
        }
        self.backend.clear_history(&event.conversation_id).await;
        self.send(event, GREETING).await;
        Ok(())
    }

    async fn handle_about(&self, event: &InboundEvent) -> anyhow::Result<()> {
        let message = OutboundMessage::reply(
            event.conversation_id.clone(),
            event.message_id,
            ABOUT,
            ParseMode::MarkdownV2,
        );
        delivery::deliver(self.channel.as_ref(), message).await;
        Ok(())
    }

    async fn handle_translate(&self, event: &InboundEvent) -> anyhow::Result<()> {
        if !self.gate_allows(event) {
            return Ok(());
        }
        let Some(quoted) = event.reply_text.as_deref().filter(|t| !t.is_empty()) else {
            self.send(event, TRANSLATE_HINT).await;
            return Ok(());
        };
        let request = translation_request(&self.options.translate_target, quoted);
        if let Err(e) = self.channel.send_typing(&event.conversation_id).await {
            log::debug!("typing indicator failed in {}: {}", event.conversation_id, e);
        }
        let result = self
            .backend
            .generate(&request)
            .await
            .context("translation request failed")?;
        self.relay(event, result, EmptyResult::Placeholder(TRANSLATE_PLACEHOLDER))
            .await;
        Ok(())
    }

    async fn handle_set_prompt(&self, event: &InboundEvent, text: &str) -> anyhow::Result<()> {
        if !self.admins.contains(&event.sender_id) {
            log::debug!("setprompt refused for non-admin {}", event.sender_id);
            self.send(event, NOT_AUTHORIZED).await;
            return Ok(());
        }
        if text.is_empty() {
            self.send(event, PROMPT_MISSING).await;
            return Ok(());
        }
        match self.prompts.write(text).await {
            Ok(()) => {
                log::info!("custom prompt updated by {}", event.sender_id);
                self.send(event, PROMPT_UPDATED).await;
            }
            Err(e) => {
                log::error!("error writing prompt: {}", e);
                self.send(event, PROMPT_UPDATE_FAILED).await;
            }
        }
        Ok(())
    }

    async fn handle_text(&self, event: &InboundEvent) -> anyhow::Result<()> {
        if self.options.gate_plain_text && !self.gate_allows(event) {
            return Ok(());
        }
        let prompt = self.prompts.read().await.context("reading custom prompt")?;
        let request = compose_prompt(prompt.as_deref(), &event.text);
        let result = self
            .backend
            .generate(&request)
            .await
            .context("generation request failed")?;
        self.relay(event, result, EmptyResult::Passthrough).await;
        Ok(())
    }

    async fn relay(&self, event: &InboundEvent, result: Option<String>, on_empty: EmptyResult) {
        let text = match (result.filter(|r| !r.is_empty()), on_empty) {
            (Some(text), _) => text,
            (None, EmptyResult::Placeholder(placeholder)) => placeholder.to_string(),
            (None, EmptyResult::Passthrough) => {
                log::warn!("backend returned nothing for {}, relaying as-is", event.conversation_id);
                String::new()
            }
        };
        self.send(event, &text).await;
    }
}
