//! Request entry point: route, resolve, record.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::healing::{HealingLoop, OrchestrationResult, Resolution};
use crate::history::HistoryRecorder;
use crate::intent::{Intent, IntentRouter};
use crate::llm::ChatModel;

/// One incoming request. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExecutionRequest {
    task: String,
    prompt: String,
}

impl ExecutionRequest {
    /// A request whose task is the prompt itself.
    pub fn from_prompt(prompt: &str) -> Self {
        Self {
            task: prompt.trim().to_string(),
            prompt: prompt.to_string(),
        }
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }
}

/// Outcome of [`Orchestrator::process`].
#[derive(Debug)]
pub(crate) struct Processed {
    pub intent: Intent,
    pub result: OrchestrationResult,
    /// Id of the history record, if one was written.
    pub record_id: Option<String>,
}

/// Wires the router, the healing loop, the general chat path and history.
pub(crate) struct Orchestrator {
    router: Arc<dyn IntentRouter>,
    chat: Arc<dyn ChatModel>,
    healing: HealingLoop,
    history: Option<Arc<dyn HistoryRecorder>>,
}

impl Orchestrator {
    pub fn new(
        router: Arc<dyn IntentRouter>,
        chat: Arc<dyn ChatModel>,
        healing: HealingLoop,
        history: Option<Arc<dyn HistoryRecorder>>,
    ) -> Self {
        Self {
            router,
            chat,
            healing,
            history,
        }
    }

    /// Resolves one request end to end.
    ///
    /// Recording is best effort: a history failure is logged and the
    /// computed result is returned unchanged.
    pub async fn process(&self, request: &ExecutionRequest) -> Result<Processed> {
        let intent = self.router.classify(request.prompt()).await?;
        info!("Detected intent: {}", intent);

        let result = if intent.needs_execution() {
            self.healing.resolve(request.task()).await?
        } else {
            let answer = self
                .chat
                .generate(request.prompt())
                .await
                .context("General answer request failed")?;
            OrchestrationResult {
                output: answer.trim().to_string(),
                resolution: Resolution::General,
                attempts: Vec::new(),
            }
        };

        let record_id = self.record(request.prompt(), intent, &result).await;
        Ok(Processed {
            intent,
            result,
            record_id,
        })
    }

    /// Appends to history on the blocking pool; the store does file IO.
    async fn record(
        &self,
        prompt: &str,
        intent: Intent,
        result: &OrchestrationResult,
    ) -> Option<String> {
        let history = Arc::clone(self.history.as_ref()?);
        let prompt = prompt.to_string();
        let result = result.clone();

        let written =
            tokio::task::spawn_blocking(move || history.record(&prompt, intent, &result)).await;

        match written {
            Ok(Ok(id)) => {
                info!("Execution log persisted with ID: {}", id);
                Some(id)
            }
            Ok(Err(e)) => {
                warn!("Failed to persist execution log: {:#}", e);
                None
            }
            Err(e) => {
                warn!("History writer task failed: {}", e);
                None
            }
        }
    }
}
