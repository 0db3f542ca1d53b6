//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.anya/config.json`) and environment.
//! Secrets and the admin list are usually supplied through the environment (or a `.env`
//! file loaded by the CLI); env values override the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Channel settings (Telegram).
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Generation backend (Gemini).
    #[serde(default)]
    pub backend: BackendConfig,

    /// Telegram user ids allowed to change the custom prompt. Replaced by ADMIN_ID env when set.
    #[serde(default)]
    pub admins: Vec<String>,

    /// Which group conversations the bot answers in.
    #[serde(default)]
    pub groups: GroupsConfig,

    /// Dispatcher behavior switches.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Custom prompt storage.
    #[serde(default)]
    pub prompt: PromptConfig,
}

/// Per-channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelsConfig {
    #[serde(default)]
    pub telegram: TelegramChannelConfig,
}

/// Telegram channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramChannelConfig {
    /// Bot token from BotFather. Overridden by TELEGRAM_BOT_TOKEN (or BOT_TOKEN) env when set.
    pub bot_token: Option<String>,
    /// Bot API base URL (default https://api.telegram.org). Mostly useful for tests and local Bot API servers.
    pub api_base: Option<String>,
}

/// Gemini backend config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    /// API key. Overridden by GEMINI_API_KEY env when set.
    pub api_key: Option<String>,
    /// Model name (default "gemini-1.5-flash").
    pub model: Option<String>,
    /// REST base URL (default https://generativelanguage.googleapis.com/v1beta).
    pub base_url: Option<String>,
}

/// Group access policy. Private chats are always answered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupPolicy {
    /// Bot responds in all groups.
    #[default]
    Open,
    /// Only in groups on the allowlist.
    Allowlist,
    /// Groups disabled.
    Disabled,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupsConfig {
    #[serde(default)]
    pub policy: GroupPolicy,
    /// Chat ids (e.g. "-1001234567890") used when policy is "allowlist".
    #[serde(default)]
    pub allowlist: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchConfig {
    /// When true, plain text messages are also subject to the group gate. Default false: plain
    /// text is answered in every conversation, commands only where the gate allows.
    #[serde(default)]
    pub gate_plain_text: bool,

    /// Target language code for /translate (default "bn").
    #[serde(default = "default_translate_target")]
    pub translate_target: String,
}

fn default_translate_target() -> String {
    "bn".to_string()
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            gate_plain_text: false,
            translate_target: default_translate_target(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptConfig {
    /// Prompt file. Relative paths are resolved against the config file's parent (default "prompt.txt").
    pub path: Option<PathBuf>,
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

fn trimmed(value: Option<&String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Resolve the Telegram bot token: env TELEGRAM_BOT_TOKEN, then BOT_TOKEN, override config.
pub fn resolve_telegram_token(config: &Config) -> Option<String> {
    non_empty_env("TELEGRAM_BOT_TOKEN")
        .or_else(|| non_empty_env("BOT_TOKEN"))
        .or_else(|| trimmed(config.channels.telegram.bot_token.as_ref()))
}

/// Resolve the Gemini API key: env GEMINI_API_KEY overrides config.
pub fn resolve_gemini_api_key(config: &Config) -> Option<String> {
    non_empty_env("GEMINI_API_KEY").or_else(|| trimmed(config.backend.api_key.as_ref()))
}

/// Resolve the admin id set: env ADMIN_ID (comma-separated) replaces the config list.
pub fn resolve_admins(config: &Config) -> HashSet<String> {
    match non_empty_env("ADMIN_ID") {
        Some(raw) => parse_admin_list(&raw),
        None => config
            .admins
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    }
}

/// Split a comma (or whitespace) separated id list.
pub fn parse_admin_list(raw: &str) -> HashSet<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("ANYA_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".anya").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the given path (or the default path). Missing file => default config.
/// Returns the config and the path that was used (for resolving the prompt file).
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

/// Resolve the prompt file: `prompt.path` if set (relative paths against the config file's parent),
/// otherwise `prompt.txt` next to the config file.
pub fn resolve_prompt_path(config: &Config, config_path: &Path) -> PathBuf {
    let config_parent = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    match &config.prompt.path {
        Some(p) if !p.as_os_str().is_empty() => {
            if p.is_absolute() {
                p.clone()
            } else {
                config_parent.join(p)
            }
        }
        _ => config_parent.join("prompt.txt"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_empty_json() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.groups.policy, GroupPolicy::Open);
        assert!(!config.dispatch.gate_plain_text);
        assert_eq!(config.dispatch.translate_target, "bn");
        assert!(config.admins.is_empty());
    }

    #[test]
    fn parses_camel_case_fields() {
        let config: Config = serde_json::from_str(
            r#"{
                "channels": { "telegram": { "botToken": "123:abc", "apiBase": "http://127.0.0.1:9" } },
                "backend": { "model": "gemini-pro" },
                "admins": ["42"],
                "groups": { "policy": "allowlist", "allowlist": ["-100"] },
                "dispatch": { "gatePlainText": true }
            }"#,
        )
        .unwrap();
        assert_eq!(config.channels.telegram.bot_token.as_deref(), Some("123:abc"));
        assert_eq!(config.backend.model.as_deref(), Some("gemini-pro"));
        assert_eq!(config.groups.policy, GroupPolicy::Allowlist);
        assert_eq!(config.groups.allowlist, vec!["-100".to_string()]);
        assert!(config.dispatch.gate_plain_text);
        assert_eq!(config.dispatch.translate_target, "bn");
    }

    #[test]
    fn admin_list_splits_on_commas_and_spaces() {
        let admins = parse_admin_list(" 11, 22 ,,33 44");
        assert_eq!(admins.len(), 4);
        assert!(admins.contains("11"));
        assert!(admins.contains("44"));
        assert!(!admins.contains(""));
    }

    #[test]
    fn resolve_prompt_path_default() {
        let config = Config::default();
        let path = Path::new("/home/user/.anya/config.json");
        assert_eq!(
            resolve_prompt_path(&config, path),
            PathBuf::from("/home/user/.anya/prompt.txt")
        );
    }

    #[test]
    fn resolve_prompt_path_override_relative() {
        let mut config = Config::default();
        config.prompt.path = Some(PathBuf::from("data/prompt.txt"));
        let path = Path::new("/home/user/.anya/config.json");
        assert_eq!(
            resolve_prompt_path(&config, path),
            PathBuf::from("/home/user/.anya/data/prompt.txt")
        );
    }

    #[test]
    fn resolve_prompt_path_override_absolute() {
        let mut config = Config::default();
        config.prompt.path = Some(PathBuf::from("/srv/anya/prompt.txt"));
        let path = Path::new("/home/user/.anya/config.json");
        assert_eq!(
            resolve_prompt_path(&config, path),
            PathBuf::from("/srv/anya/prompt.txt")
        );
    }

    #[test]
    fn config_values_used_when_env_unset() {
        // Only exercises the config fallback; these names are not set in the test environment.
        let mut config = Config::default();
        config.backend.api_key = Some("  key  ".to_string());
        if std::env::var("GEMINI_API_KEY").is_err() {
            assert_eq!(resolve_gemini_api_key(&config).as_deref(), Some("key"));
        }
        config.admins = vec![" 7 ".to_string(), String::new()];
        if std::env::var("ADMIN_ID").is_err() {
            let admins = resolve_admins(&config);
            assert_eq!(admins.len(), 1);
            assert!(admins.contains("7"));
        }
    }
}
