//! Custom prompt storage: a single optional text value prepended to plain-text messages.
//!
//! The file store keeps the prompt as one UTF-8 blob and reads it on every call, so a value
//! written by `/setprompt` (or `anya prompt set`) is picked up without restarting.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Read/write access to the custom prompt.
#[async_trait]
pub trait PromptStore: Send + Sync {
    /// Current prompt, or None when none was ever set.
    async fn read(&self) -> std::io::Result<Option<String>>;
    /// Overwrite the prompt.
    async fn write(&self, text: &str) -> std::io::Result<()>;
}

/// Prompt persisted in a plain-text file.
pub struct FilePromptStore {
    path: PathBuf,
}

impl FilePromptStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PromptStore for FilePromptStore {
    async fn read(&self) -> std::io::Result<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn write(&self, text: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, text).await
    }
}

/// In-memory prompt (not durable).
#[derive(Default)]
pub struct MemoryPromptStore {
    value: RwLock<Option<String>>,
}

impl MemoryPromptStore {
    pub fn new(initial: Option<String>) -> Self {
        Self {
            value: RwLock::new(initial),
        }
    }
}

#[async_trait]
impl PromptStore for MemoryPromptStore {
    async fn read(&self) -> std::io::Result<Option<String>> {
        Ok(self.value.read().await.clone())
    }

    async fn write(&self, text: &str) -> std::io::Result<()> {
        *self.value.write().await = Some(text.to_string());
        Ok(())
    }
}
