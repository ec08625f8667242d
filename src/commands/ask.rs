//! `phoenix ask`: route a prompt and answer it.

use anyhow::{Context, Result};
use colored::Colorize;
use std::sync::Arc;
use tracing::info;

use super::format::format_result;
use super::{healing_loop, load_project};
use crate::history::{HistoryRecorder, JsonlHistory};
use crate::intent::LlmIntentRouter;
use crate::llm::OllamaChatModel;
use crate::orchestrator::{ExecutionRequest, Orchestrator};

/// Runs the ask command.
pub async fn run(prompt: &str, show_code: bool) -> Result<()> {
    if prompt.trim().is_empty() {
        anyhow::bail!("Prompt must not be empty");
    }

    let (project_dir, config) = load_project()?;

    let chat = Arc::new(OllamaChatModel::new(&config.llm, &config.llm.model)?);
    let router = LlmIntentRouter::new(chat.clone());
    let healing = healing_loop(&config).await?;

    let history: Option<Arc<dyn HistoryRecorder>> = if config.history.enabled {
        Some(Arc::new(JsonlHistory::new(
            config.history_path(&project_dir),
        )))
    } else {
        None
    };

    let orchestrator = Orchestrator::new(Arc::new(router), chat, healing, history);

    info!("Processing request");
    let processed = orchestrator
        .process(&ExecutionRequest::from_prompt(prompt))
        .await
        .context("Request failed")?;

    print!(
        "{}",
        format_result(&processed.result, Some(processed.intent), show_code)
    );
    if let Some(id) = &processed.record_id {
        eprintln!("{}", format!("Recorded as {id}").dimmed());
    }

    if processed.result.succeeded() {
        Ok(())
    } else {
        anyhow::bail!("{}", processed.result.label())
    }
}
