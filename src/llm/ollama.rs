//! Ollama API provider.
//!
//! Calls `POST {host}/api/generate` with `stream: false` and returns the
//! `response` field.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::ChatModel;
use crate::config::LlmConfig;

/// `/api/generate` request body.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerateOptions>,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

/// `/api/generate` response (non-streaming).
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

/// Client for one model on an Ollama server.
pub(crate) struct OllamaChatModel {
    client: Client,
    host: String,
    model: String,
    temperature: Option<f32>,
}

impl OllamaChatModel {
    /// Creates a client for `model` using the host and timeout from `config`.
    pub fn new(config: &LlmConfig, model: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            host: config.host.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature: config.temperature,
        })
    }

    fn url(&self) -> String {
        format!("{}/api/generate", self.host)
    }
}

#[async_trait]
impl ChatModel for OllamaChatModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: self
                .temperature
                .map(|temperature| GenerateOptions { temperature }),
        };

        debug!(
            "Calling Ollama API ({}) with {} byte prompt",
            self.model,
            prompt.len()
        );

        let response = self
            .client
            .post(self.url())
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to reach Ollama at {}", self.host))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama API error ({status}): {body}");
        }

        let resp: GenerateResponse = response
            .json()
            .await
            .context("Failed to decode Ollama response")?;

        info!(
            "LLM response ({}): {} in / {} out tokens",
            self.model,
            resp.prompt_eval_count.unwrap_or(0),
            resp.eval_count.unwrap_or(0)
        );

        Ok(resp.response)
    }

    fn description(&self) -> String {
        format!("ollama ({})", self.model)
    }
}
