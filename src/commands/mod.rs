//! CLI command implementations.
//!
//! Each submodule implements one phoenix command. Wiring from config to
//! live components lives here so every command builds them the same way.

pub mod ask;
pub mod clean;
pub mod exec;
mod format;
pub mod heal;
pub mod history;
pub mod image;
pub mod init;

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use crate::agent::PythonCoderAgent;
use crate::classifier::OutcomeClassifier;
use crate::config::Config;
use crate::healing::HealingLoop;
use crate::llm::OllamaChatModel;
use crate::sandbox::{DockerBackend, SandboxRuntime, SandboxSettings};

/// Current directory plus the configuration loaded from it.
fn load_project() -> Result<(PathBuf, Config)> {
    let project_dir = std::env::current_dir().context("Failed to get current directory")?;
    let config = Config::load(&project_dir)?;
    Ok((project_dir, config))
}

/// Sandbox runtime over a live Docker connection.
async fn sandbox_runtime(config: &Config) -> Result<SandboxRuntime> {
    let settings = SandboxSettings::from_config(&config.sandbox)?;
    let backend = DockerBackend::connect().await?;
    Ok(SandboxRuntime::new(Arc::new(backend), settings))
}

/// Healing loop with the Python coder agent.
async fn healing_loop(config: &Config) -> Result<HealingLoop> {
    let coder = OllamaChatModel::new(&config.llm, &config.llm.coder_model)?;
    let agent = PythonCoderAgent::new(Arc::new(coder));
    let runtime = sandbox_runtime(config).await?;

    Ok(HealingLoop::new(
        Arc::new(agent),
        runtime,
        OutcomeClassifier::new(&config.healing.failure_signals),
        config.healing.max_attempts,
    ))
}
