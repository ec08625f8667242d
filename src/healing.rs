//! The self-healing loop.
//!
//! Generate code once, then alternate run and repair until a run succeeds
//! or the attempt budget is spent. Attempts are strictly sequential: each
//! repair needs the previous run's error text, and the previous sandbox is
//! torn down before the next one is created.

use anyhow::{Context, Result};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::agent::CodeAgent;
use crate::classifier::{OutcomeClassifier, Verdict};
use crate::sandbox::{RunStatus, SandboxRuntime};

/// Verdict for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Success,
    Failure,
    Timeout,
}

/// One sandbox run within a resolution.
#[derive(Debug, Clone)]
pub(crate) struct ExecutionAttempt {
    /// 1-based attempt number.
    pub number: u32,
    pub code: String,
    pub output: String,
    pub outcome: Outcome,
    pub duration: Duration,
}

/// Who resolved a request, and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resolution {
    /// Code ran successfully on `attempt`.
    Healed { agent: &'static str, attempt: u32 },
    /// Every attempt failed.
    Failed,
    /// Answered directly by the chat model without running code.
    General,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healed { agent, attempt } => write!(f, "{agent}_HEALED_{attempt}"),
            Self::Failed => write!(f, "FAILED_AGENT"),
            Self::General => write!(f, "GENERAL_LLM_AGENT"),
        }
    }
}

/// Final answer for one request.
#[derive(Debug, Clone)]
pub(crate) struct OrchestrationResult {
    pub output: String,
    pub resolution: Resolution,
    pub attempts: Vec<ExecutionAttempt>,
}

impl OrchestrationResult {
    /// Result label, e.g. `PYTHON_AGENT_HEALED_2` or `FAILED_AGENT`.
    pub fn label(&self) -> String {
        self.resolution.to_string()
    }

    pub fn succeeded(&self) -> bool {
        !matches!(self.resolution, Resolution::Failed)
    }

    /// Code from the last attempt, if any code ran.
    pub fn final_code(&self) -> Option<&str> {
        self.attempts.last().map(|a| a.code.as_str())
    }
}

/// Loop state. Only the attempt number, the current code and the last
/// error are carried between steps.
enum Step {
    Run { attempt: u32, code: String },
    Repair { attempt: u32, code: String, error: String },
}

/// Drives generate → run → classify → repair with a bounded budget.
pub(crate) struct HealingLoop {
    agent: Arc<dyn CodeAgent>,
    runtime: SandboxRuntime,
    classifier: OutcomeClassifier,
    max_attempts: u32,
}

impl HealingLoop {
    /// `max_attempts` is clamped to at least one run.
    pub fn new(
        agent: Arc<dyn CodeAgent>,
        runtime: SandboxRuntime,
        classifier: OutcomeClassifier,
        max_attempts: u32,
    ) -> Self {
        Self {
            agent,
            runtime,
            classifier,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Resolves `task`: at most `max_attempts` sandbox runs and
    /// `max_attempts - 1` repairs.
    ///
    /// Errors only when the code agent itself cannot be reached.
    pub async fn resolve(&self, task: &str) -> Result<OrchestrationResult> {
        let code = self
            .agent
            .generate(task)
            .await
            .context("Failed to generate initial code")?;

        let mut attempts = Vec::new();
        let mut step = Step::Run { attempt: 1, code };

        loop {
            step = match step {
                Step::Run { attempt, code } => {
                    let record = self.execute(attempt, code).await;
                    let outcome = record.outcome;
                    attempts.push(record);

                    if outcome == Outcome::Success {
                        info!("Success on attempt {}!", attempt);
                        return Ok(self.healed(attempt, attempts));
                    }

                    warn!("Attempt {} failed ({:?})", attempt, outcome);
                    if attempt >= self.max_attempts {
                        return Ok(self.failed(attempts));
                    }

                    let last = &attempts[attempts.len() - 1];
                    Step::Repair {
                        attempt,
                        code: last.code.clone(),
                        error: last.output.clone(),
                    }
                }
                Step::Repair {
                    attempt,
                    code,
                    error,
                } => {
                    info!("Starting self-healing after attempt {}", attempt);
                    let repaired = self
                        .agent
                        .repair(task, &code, &error)
                        .await
                        .with_context(|| format!("Failed to repair code after attempt {attempt}"))?;
                    Step::Run {
                        attempt: attempt + 1,
                        code: repaired,
                    }
                }
            };
        }
    }

    async fn execute(&self, attempt: u32, code: String) -> ExecutionAttempt {
        info!("Execution attempt {}/{}", attempt, self.max_attempts);
        let started = Instant::now();
        let run = self.runtime.run(&code).await;
        let duration = started.elapsed();

        let outcome = match run.status {
            RunStatus::TimedOut => Outcome::Timeout,
            RunStatus::Faulted => Outcome::Failure,
            RunStatus::Completed => match self.classifier.classify(&run.output) {
                Verdict::Success => Outcome::Success,
                Verdict::Failure => Outcome::Failure,
            },
        };

        ExecutionAttempt {
            number: attempt,
            code,
            output: run.output,
            outcome,
            duration,
        }
    }

    fn healed(&self, attempt: u32, attempts: Vec<ExecutionAttempt>) -> OrchestrationResult {
        let output = attempts
            .last()
            .map(|a| a.output.clone())
            .unwrap_or_default();
        OrchestrationResult {
            output,
            resolution: Resolution::Healed {
                agent: self.agent.name(),
                attempt,
            },
            attempts,
        }
    }

    fn failed(&self, attempts: Vec<ExecutionAttempt>) -> OrchestrationResult {
        let last_error = attempts.last().map_or("", |a| a.output.as_str());
        OrchestrationResult {
            output: format!(
                "Failed after {} attempts. Last Error: {}",
                self.max_attempts, last_error
            ),
            resolution: Resolution::Failed,
            attempts,
        }
    }
}
