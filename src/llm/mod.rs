//! Language-model backends.
//!
//! Everything above this module treats the model as a text-to-text
//! function: one prompt in, one completion out. The backend is selected by
//! `[llm]` in phoenix.toml; only the Ollama API is supported today.

#[cfg(test)]
pub(crate) mod mock;
mod ollama;

pub(crate) use ollama::OllamaChatModel;

use anyhow::Result;
use async_trait::async_trait;

/// A text-completion model.
#[async_trait]
pub(crate) trait ChatModel: Send + Sync {
    /// Returns the model's completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Human-readable description of the backend and model.
    fn description(&self) -> String;
}
