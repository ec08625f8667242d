//! Python code agent backed by a chat model.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use super::{sanitize_code, CodeAgent};
use crate::llm::ChatModel;

/// Writes and repairs Python scripts with a coder model.
pub(crate) struct PythonCoderAgent {
    model: Arc<dyn ChatModel>,
}

impl PythonCoderAgent {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

fn generation_prompt(task: &str) -> String {
    format!(
        "You are a strict Python Code Generator.\n\
         \n\
         OUTPUT RULES:\n\
         - Output ONLY valid Python code.\n\
         - NO explanations.\n\
         - NO markdown blocks (NO ```python).\n\
         - NO text before or after the code.\n\
         - The code runs without network access; do not fetch anything.\n\
         - Print the final answer to stdout.\n\
         \n\
         Task: {task}\n"
    )
}

fn repair_prompt(task: &str, failing_code: &str, error_text: &str) -> String {
    format!(
        "The following Python code for the task '{task}' failed with a Syntax or Runtime Error.\n\
         \n\
         FAILING CODE:\n\
         {failing_code}\n\
         \n\
         ERROR LOG:\n\
         {error_text}\n\
         \n\
         FIX the code. Output ONLY the corrected Python code. No explanations.\n"
    )
}

#[async_trait]
impl CodeAgent for PythonCoderAgent {
    fn name(&self) -> &'static str {
        "PYTHON_AGENT"
    }

    async fn generate(&self, task: &str) -> Result<String> {
        info!("Generating Python code for task: {}", task);
        let raw = self
            .model
            .generate(&generation_prompt(task))
            .await
            .context("Code generation request failed")?;

        let code = sanitize_code(&raw);
        debug!("Sanitized code:\n{}", code);
        Ok(code)
    }

    async fn repair(&self, task: &str, failing_code: &str, error_text: &str) -> Result<String> {
        info!("Requesting code correction from {}", self.model.description());
        let raw = self
            .model
            .generate(&repair_prompt(task, failing_code, error_text))
            .await
            .context("Code repair request failed")?;

        let code = sanitize_code(&raw);
        debug!("Sanitized repaired code:\n{}", code);
        Ok(code)
    }
}
