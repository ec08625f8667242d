//! Append-only execution history.
//!
//! One JSON object per line. Records are never rewritten; `phoenix history`
//! reads the tail of the file.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use uuid::Uuid;

use crate::healing::OrchestrationResult;
use crate::intent::Intent;

/// One resolved request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: String,
    pub user_prompt: String,
    pub detected_intent: String,
    pub generated_code: Option<String>,
    pub execution_result: String,
    pub final_agent: String,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
}

impl ExecutionRecord {
    pub fn new(prompt: &str, intent: Intent, result: &OrchestrationResult) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_prompt: prompt.to_string(),
            detected_intent: intent.to_string(),
            generated_code: result.final_code().map(ToString::to_string),
            execution_result: result.output.clone(),
            final_agent: result.label(),
            retry_count: u32::try_from(result.attempts.len()).unwrap_or(u32::MAX),
            created_at: Utc::now(),
        }
    }
}

/// Durable record of resolved requests.
pub(crate) trait HistoryRecorder: Send + Sync {
    /// Appends one record and returns its id.
    fn record(&self, prompt: &str, intent: Intent, result: &OrchestrationResult)
        -> Result<String>;
}

/// JSON-lines file store.
#[derive(Debug, Clone)]
pub(crate) struct JsonlHistory {
    path: PathBuf,
}

impl JsonlHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn append(&self, record: &ExecutionRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let mut line = serde_json::to_string(record).context("Failed to serialize record")?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open history file: {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("Failed to write history file: {}", self.path.display()))?;
        Ok(())
    }

    /// Most recent `limit` records, oldest first. Unparseable lines are
    /// skipped.
    pub fn load_recent(&self, limit: usize) -> Result<Vec<ExecutionRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read history file: {}", self.path.display()))?;

        let records: Vec<ExecutionRecord> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();

        let skip = records.len().saturating_sub(limit);
        Ok(records.into_iter().skip(skip).collect())
    }
}

impl HistoryRecorder for JsonlHistory {
    fn record(
        &self,
        prompt: &str,
        intent: Intent,
        result: &OrchestrationResult,
    ) -> Result<String> {
        let record = ExecutionRecord::new(prompt, intent, result);
        self.append(&record)?;
        Ok(record.id)
    }
}
