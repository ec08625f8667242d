//! Intent routing: decide whether a prompt needs code execution at all.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::llm::ChatModel;

/// Category of a user request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Intent {
    /// Calculate, process data, or do math.
    DataAnalysis,
    /// Explicitly asks for code.
    CodeGeneration,
    /// Greetings and general questions.
    General,
}

impl Intent {
    /// Whether this request goes through the healing loop.
    pub fn needs_execution(self) -> bool {
        matches!(self, Self::DataAnalysis | Self::CodeGeneration)
    }

    /// Parses a model reply. Anything without a known category is general.
    pub fn from_reply(reply: &str) -> Self {
        let upper = reply.to_uppercase();
        if upper.contains("DATA_ANALYSIS") {
            Self::DataAnalysis
        } else if upper.contains("CODE_GENERATION") {
            Self::CodeGeneration
        } else {
            Self::General
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DataAnalysis => write!(f, "DATA_ANALYSIS"),
            Self::CodeGeneration => write!(f, "CODE_GENERATION"),
            Self::General => write!(f, "GENERAL"),
        }
    }
}

/// Classifies prompts into an [`Intent`].
#[async_trait]
pub(crate) trait IntentRouter: Send + Sync {
    async fn classify(&self, prompt: &str) -> Result<Intent>;
}

/// Asks a chat model to pick the category.
pub(crate) struct LlmIntentRouter {
    model: Arc<dyn ChatModel>,
}

impl LlmIntentRouter {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

fn classification_prompt(prompt: &str) -> String {
    format!(
        "Classify the following user request into one of these categories:\n\
         - DATA_ANALYSIS: If the user wants to calculate, process data, or perform math.\n\
         - CODE_GENERATION: If the user specifically asks for code.\n\
         - GENERAL: For greetings or general questions.\n\
         \n\
         Respond ONLY with the category name.\n\
         \n\
         User request: {prompt}\n"
    )
}

#[async_trait]
impl IntentRouter for LlmIntentRouter {
    async fn classify(&self, prompt: &str) -> Result<Intent> {
        let reply = self
            .model
            .generate(&classification_prompt(prompt))
            .await
            .context("Intent classification failed")?;

        let intent = Intent::from_reply(reply.trim());
        debug!("Classified intent: {} (reply: {:?})", intent, reply.trim());
        Ok(intent)
    }
}
