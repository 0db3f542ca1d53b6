use anya_core::prompt_store::{FilePromptStore, PromptStore};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "anya")]
#[command(about = "Anya: Telegram bot relaying chats to Gemini", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config file.
    Init {
        /// Config file path (default: ANYA_CONFIG_PATH or ~/.anya/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the bot (long-polls Telegram until Ctrl+C). Token, API key and admins may come from the environment or a .env file.
    Run {
        /// Config file path (default: ANYA_CONFIG_PATH or ~/.anya/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Show or set the custom prompt prepended to plain text messages.
    Prompt {
        /// Config file path (default: ANYA_CONFIG_PATH or ~/.anya/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        #[command(subcommand)]
        action: PromptAction,
    },
}

#[derive(Subcommand)]
enum PromptAction {
    /// Print the current prompt
    Show,
    /// Replace the prompt
    Set {
        /// Prompt text (joined with spaces)
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("failed to load .env: {}", e);
        }
    }
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("anya {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Run { config }) => {
            if let Err(e) = run_bot(config).await {
                log::error!("bot failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Prompt { config, action }) => {
            if let Err(e) = run_prompt(config, action).await {
                log::error!("prompt failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(anya_core::config::default_config_path);
    let dir = anya_core::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_bot(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let (config, path) = anya_core::config::load_config(config_path)?;
    anya_core::runtime::run(config, path).await
}

async fn run_prompt(
    config_path: Option<std::path::PathBuf>,
    action: PromptAction,
) -> anyhow::Result<()> {
    let (config, path) = anya_core::config::load_config(config_path)?;
    let store = FilePromptStore::new(anya_core::config::resolve_prompt_path(&config, &path));
    match action {
        PromptAction::Show => match store.read().await? {
            Some(p) if !p.is_empty() => println!("{}", p),
            _ => println!("(no custom prompt set: {})", store.path().display()),
        },
        PromptAction::Set { text } => {
            let text = text.join(" ");
            let text = text.trim();
            if text.is_empty() {
                anyhow::bail!("prompt text is empty");
            }
            store.write(text).await?;
            println!("prompt updated ({})", store.path().display());
        }
    }
    Ok(())
}
