//! Mock code agent for testing.
//!
//! Returns predetermined code and records every repair request for test
//! assertions.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::CodeAgent;

/// Arguments of one `repair` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RepairRequest {
    pub task: String,
    pub failing_code: String,
    pub error_text: String,
}

/// A mock code agent.
#[derive(Debug, Clone)]
pub(crate) struct MockCodeAgent {
    initial: String,
    /// Repaired versions returned in order. The last one repeats.
    repairs: Arc<Vec<String>>,
    generate_count: Arc<AtomicUsize>,
    repair_requests: Arc<Mutex<Vec<RepairRequest>>>,
    fail_generate: bool,
}

impl MockCodeAgent {
    /// Agent that generates `initial` and repairs to each of `repairs` in turn.
    pub fn new(initial: &str, repairs: &[&str]) -> Self {
        Self {
            initial: initial.to_string(),
            repairs: Arc::new(repairs.iter().map(ToString::to_string).collect()),
            generate_count: Arc::new(AtomicUsize::new(0)),
            repair_requests: Arc::new(Mutex::new(Vec::new())),
            fail_generate: false,
        }
    }

    /// Agent whose `generate` call fails.
    pub fn failing() -> Self {
        Self {
            fail_generate: true,
            ..Self::new("", &[])
        }
    }

    pub fn generate_count(&self) -> usize {
        self.generate_count.load(Ordering::SeqCst)
    }

    pub fn repair_requests(&self) -> Vec<RepairRequest> {
        self.repair_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CodeAgent for MockCodeAgent {
    fn name(&self) -> &'static str {
        "PYTHON_AGENT"
    }

    async fn generate(&self, _task: &str) -> Result<String> {
        self.generate_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_generate {
            anyhow::bail!("model backend unreachable");
        }
        Ok(self.initial.clone())
    }

    async fn repair(&self, task: &str, failing_code: &str, error_text: &str) -> Result<String> {
        let index = {
            let mut requests = self.repair_requests.lock().unwrap();
            requests.push(RepairRequest {
                task: task.to_string(),
                failing_code: failing_code.to_string(),
                error_text: error_text.to_string(),
            });
            requests.len() - 1
        };

        let code = self
            .repairs
            .get(index)
            .or_else(|| self.repairs.last())
            .cloned()
            .unwrap_or_else(|| failing_code.to_string());
        Ok(code)
    }
}
