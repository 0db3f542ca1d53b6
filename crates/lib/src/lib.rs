//! Anya core library: Telegram channel, Gemini backend, command dispatch and reply delivery,
//! used by the `anya` CLI.

pub mod channels;
pub mod command;
pub mod config;
pub mod delivery;
pub mod dispatch;
pub mod gate;
pub mod init;
pub mod llm;
pub mod prompt_store;
pub mod runtime;
pub mod session;
