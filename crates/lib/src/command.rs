//! Classify an inbound message into one of the commands the bot handles.
//!
//! Telegram commands are `/name` or `/name@bot_username` as the first token. A command
//! addressed to a different bot is not ours and is ignored; unknown commands are plain text.

/// What an inbound message asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    About,
    Translate,
    /// Text after the command token, trimmed (may be empty).
    SetPrompt(String),
    /// Anything else with text.
    Text,
}

impl Command {
    /// Name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::About => "about",
            Self::Translate => "translate",
            Self::SetPrompt(_) => "setprompt",
            Self::Text => "text",
        }
    }
}

/// Parse message text. `bot_username` is the bot's own username (without `@`) when known.
/// Returns None when the message is a command addressed to another bot.
pub fn parse(text: &str, bot_username: Option<&str>) -> Option<Command> {
    let Some(rest) = text.strip_prefix('/') else {
        return Some(Command::Text);
    };
    let token_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    let (token, args) = rest.split_at(token_end);
    let (name, target) = match token.split_once('@') {
        Some((name, target)) => (name, Some(target)),
        None => (token, None),
    };
    if let Some(target) = target {
        let ours = bot_username.is_some_and(|me| me.eq_ignore_ascii_case(target));
        if !ours {
            return None;
        }
    }
    let command = match name {
        "start" => Command::Start,
        "about" => Command::About,
        "translate" => Command::Translate,
        "setprompt" => Command::SetPrompt(args.trim().to_string()),
        _ => Command::Text,
    };
    Some(command)
}
