//! Bot runtime: wires config, the Telegram channel, Gemini and the dispatcher, then runs until Ctrl+C.
//!
//! Events arrive on one long-poll stream; each is dispatched in its own task so a slow backend
//! call in one conversation does not hold up the others.

use crate::channels::{ChannelHandle, InboundEvent, TelegramChannel};
use crate::config::{self, Config};
use crate::dispatch::{DispatchOptions, Dispatcher};
use crate::gate::PolicyGate;
use crate::llm::GeminiClient;
use crate::prompt_store::FilePromptStore;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const INBOUND_QUEUE: usize = 64;

/// A started bot: the channel plus its poll and processor tasks.
pub struct RunningBot {
    telegram: Arc<TelegramChannel>,
    poll: JoinHandle<()>,
    processor: JoinHandle<()>,
}

impl RunningBot {
    /// Stop polling and wait for the processor to drain queued events.
    /// Handlers already running finish on their own.
    pub async fn shutdown(self) {
        self.telegram.stop();
        self.poll.abort();
        let _ = self.poll.await;
        if let Err(e) = self.processor.await {
            log::warn!("event processor ended abnormally: {}", e);
        }
        log::info!("telegram channel stopped");
    }
}

/// Everything the bot needs to start, with environment overrides already applied.
pub struct BotSettings {
    pub token: String,
    pub api_key: String,
    pub admins: HashSet<String>,
    pub prompt_path: PathBuf,
    pub config: Config,
}

impl BotSettings {
    /// Resolve secrets, admins and the prompt path. Fails when the bot token or Gemini API key is missing.
    pub fn resolve(config: Config, config_path: &Path) -> Result<Self> {
        let token = config::resolve_telegram_token(&config).context(
            "telegram bot token not configured (set TELEGRAM_BOT_TOKEN or channels.telegram.botToken)",
        )?;
        let api_key = config::resolve_gemini_api_key(&config)
            .context("gemini api key not configured (set GEMINI_API_KEY or backend.apiKey)")?;
        Ok(Self {
            token,
            api_key,
            admins: config::resolve_admins(&config),
            prompt_path: config::resolve_prompt_path(&config, config_path),
            config,
        })
    }
}

/// Resolve settings from config and the environment, then start the bot.
pub async fn start(config: Config, config_path: PathBuf) -> Result<RunningBot> {
    start_with(BotSettings::resolve(config, &config_path)?).await
}

/// Start polling and dispatching with already resolved settings.
pub async fn start_with(settings: BotSettings) -> Result<RunningBot> {
    let BotSettings {
        token,
        api_key,
        admins,
        prompt_path,
        config,
    } = settings;

    let telegram = Arc::new(TelegramChannel::new(
        token,
        config.channels.telegram.api_base.clone(),
    ));
    let bot_username = match telegram.get_me().await {
        Ok(name) => name,
        Err(e) => {
            log::warn!("telegram getMe failed, addressed commands will be ignored: {}", e);
            None
        }
    };
    if let Some(ref name) = bot_username {
        log::info!("telegram bot username: @{}", name);
    }

    let backend = Arc::new(GeminiClient::new(
        api_key,
        config.backend.model.clone(),
        config.backend.base_url.clone(),
    ));
    log::info!("gemini backend using model {}", backend.model());

    log::info!("custom prompt file: {}", prompt_path.display());
    let prompts = Arc::new(FilePromptStore::new(&prompt_path));

    if admins.is_empty() {
        log::warn!("no admin ids configured; /setprompt will be refused for everyone");
    }

    let dispatcher = Dispatcher::new(
        telegram.clone(),
        backend,
        prompts,
        Arc::new(PolicyGate::from_config(&config.groups)),
        admins,
    )
    .with_options(DispatchOptions {
        gate_plain_text: config.dispatch.gate_plain_text,
        translate_target: config.dispatch.translate_target.clone(),
    })
    .with_bot_username(bot_username);

    let (inbound_tx, inbound_rx) = mpsc::channel::<InboundEvent>(INBOUND_QUEUE);
    let poll = telegram.clone().start_inbound(inbound_tx);
    let processor = spawn_processor(Arc::new(dispatcher), inbound_rx);
    log::info!("telegram bot is running");

    Ok(RunningBot {
        telegram,
        poll,
        processor,
    })
}

/// Start the bot and block until Ctrl+C.
pub async fn run(config: Config, config_path: PathBuf) -> Result<()> {
    let bot = start(config, config_path).await?;
    tokio::signal::ctrl_c()
        .await
        .context("listening for shutdown signal")?;
    log::info!("shutdown signal received");
    bot.shutdown().await;
    Ok(())
}

/// Receive inbound events and dispatch each in its own task; a panicking handler is logged.
pub fn spawn_processor(
    dispatcher: Arc<Dispatcher>,
    mut inbound_rx: mpsc::Receiver<InboundEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = inbound_rx.recv().await {
            let dispatcher = dispatcher.clone();
            let conversation_id = event.conversation_id.clone();
            let handler = tokio::spawn(async move { dispatcher.dispatch(event).await });
            tokio::spawn(async move {
                if let Err(e) = handler.await {
                    log::error!("bot encountered an error in {}: {}", conversation_id, e);
                }
            });
        }
        log::debug!("inbound queue closed, processor stopping");
    })
}
