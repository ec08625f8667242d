//! Sandbox lifecycle: provision, run with a wall-clock bound, stop on
//! timeout, and always tear down.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{ResourceLimits, SandboxBackend, SandboxError, SandboxSpec};
use crate::config::{parse_memory_limit, SandboxConfig};

/// Prefix of the output returned when a run exceeds its time budget.
pub(crate) const TIMEOUT_SENTINEL_PREFIX: &str = "TIMEOUT_ERROR";

/// Prefix of the output returned when the sandbox itself faulted.
const FAULT_PREFIX: &str = "Execution Error";

/// Extra time allowed for the stop request beyond its grace period.
const STOP_SLACK: Duration = Duration::from_secs(3);

/// Allowance for image start-up and removal on top of the run itself.
const LIFECYCLE_SLACK: Duration = Duration::from_secs(30);

/// Fixed settings for every run, resolved from `[sandbox]` config.
#[derive(Debug, Clone)]
pub(crate) struct SandboxSettings {
    pub image: String,
    pub interpreter: Vec<String>,
    pub limits: ResourceLimits,
    pub timeout: Duration,
    pub stop_grace: Duration,
}

impl SandboxSettings {
    /// Resolves and validates the sandbox section of the configuration.
    pub fn from_config(config: &SandboxConfig) -> Result<Self> {
        let memory_bytes = parse_memory_limit(&config.memory)
            .with_context(|| format!("Invalid sandbox memory limit '{}'", config.memory))?;
        if !(config.cpu_fraction > 0.0 && config.cpu_fraction.is_finite()) {
            anyhow::bail!(
                "Sandbox cpu_fraction must be a positive number, got {}",
                config.cpu_fraction
            );
        }
        if config.timeout_secs == 0 {
            anyhow::bail!("Sandbox timeout_secs must be at least 1");
        }
        if config.interpreter.is_empty() {
            anyhow::bail!("Sandbox interpreter command must not be empty");
        }

        Ok(Self {
            image: config.image.clone(),
            interpreter: config.interpreter.clone(),
            limits: ResourceLimits {
                memory_bytes,
                cpu_fraction: config.cpu_fraction,
            },
            timeout: Duration::from_secs(config.timeout_secs),
            stop_grace: Duration::from_secs(config.stop_grace_secs),
        })
    }

    /// Longest a container of a live run can exist. Anything older was
    /// left behind by a killed process.
    pub fn max_lifetime(&self) -> Duration {
        self.timeout + self.stop_grace + STOP_SLACK + LIFECYCLE_SLACK
    }

    fn spec_for(&self, code: &str) -> SandboxSpec {
        let mut command = self.interpreter.clone();
        command.push(code.to_string());
        SandboxSpec {
            image: self.image.clone(),
            command,
            limits: self.limits,
        }
    }
}

/// How a sandbox run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunStatus {
    /// The program ran to completion; its output still needs a verdict.
    Completed,
    /// The run exceeded the wall-clock ceiling.
    TimedOut,
    /// The sandbox could not be provisioned or failed mid-run.
    Faulted,
}

/// Result of one sandbox run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RunOutput {
    /// Captured output, the timeout sentinel, or a fault description.
    pub output: String,
    pub status: RunStatus,
}

impl RunOutput {
    fn completed(captured: &str) -> Self {
        Self {
            output: captured.trim().to_string(),
            status: RunStatus::Completed,
        }
    }

    fn timed_out(limit: Duration) -> Self {
        Self {
            output: format!(
                "{TIMEOUT_SENTINEL_PREFIX}: The execution exceeded the {}-second safety limit.",
                limit.as_secs()
            ),
            status: RunStatus::TimedOut,
        }
    }

    fn fault(err: &SandboxError) -> Self {
        Self {
            output: format!("{FAULT_PREFIX}: {err}"),
            status: RunStatus::Faulted,
        }
    }
}

/// Lifecycle state of a provisioned environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SandboxState {
    Created,
    Running,
    Completed,
    TimedOut,
    Removed,
}

impl SandboxState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Running)
                | (Self::Running, Self::Completed | Self::TimedOut)
                | (
                    Self::Created | Self::Running | Self::Completed | Self::TimedOut,
                    Self::Removed
                )
        )
    }
}

/// One provisioned environment, owned by a single `run` call.
///
/// `teardown` is the normal release path. If the owning future is dropped
/// before that (cancellation), `Drop` schedules the removal instead.
struct SandboxHandle {
    id: String,
    state: SandboxState,
    limits: ResourceLimits,
    created_at: DateTime<Utc>,
    backend: Arc<dyn SandboxBackend>,
}

impl SandboxHandle {
    fn new(id: String, limits: ResourceLimits, backend: Arc<dyn SandboxBackend>) -> Self {
        Self {
            id,
            state: SandboxState::Created,
            limits,
            created_at: Utc::now(),
            backend,
        }
    }

    fn transition(&mut self, next: SandboxState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal sandbox transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!("Sandbox {}: {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
    }

    /// Removes the environment. A missing target counts as removed; any
    /// other failure is logged and never escalates.
    async fn teardown(&mut self) {
        if self.state == SandboxState::Removed {
            return;
        }

        match self.backend.remove(&self.id).await {
            Ok(()) => debug!("Sandbox {} removed", self.id),
            Err(e) if e.is_not_found() => debug!("Sandbox {} already removed", self.id),
            Err(e) => warn!("Failed to remove sandbox {}: {}", self.id, e),
        }

        let lifetime = Utc::now().signed_duration_since(self.created_at);
        debug!(
            "Sandbox {} lived {}ms (memory {} bytes, cpu {})",
            self.id,
            lifetime.num_milliseconds(),
            self.limits.memory_bytes,
            self.limits.cpu_fraction
        );
        self.transition(SandboxState::Removed);
    }
}

impl Drop for SandboxHandle {
    fn drop(&mut self) {
        if self.state == SandboxState::Removed {
            return;
        }

        warn!(
            "Sandbox {} dropped in state {:?}; scheduling removal",
            self.id, self.state
        );
        if let Ok(rt) = tokio::runtime::Handle::try_current() {
            let backend = Arc::clone(&self.backend);
            let id = std::mem::take(&mut self.id);
            rt.spawn(async move {
                if let Err(e) = backend.remove(&id).await {
                    if !e.is_not_found() {
                        warn!("Deferred removal of sandbox {} failed: {}", id, e);
                    }
                }
            });
        }
    }
}

/// Runs code in a fresh isolated environment per call.
///
/// Each call owns its environment from creation to removal; calls share
/// nothing but the backend client, so independent runs can proceed in
/// parallel.
pub(crate) struct SandboxRuntime {
    backend: Arc<dyn SandboxBackend>,
    settings: SandboxSettings,
}

impl SandboxRuntime {
    pub fn new(backend: Arc<dyn SandboxBackend>, settings: SandboxSettings) -> Self {
        Self { backend, settings }
    }

    /// Wall-clock ceiling applied to each run.
    pub fn timeout(&self) -> Duration {
        self.settings.timeout
    }

    /// Runs `code` and returns its output.
    ///
    /// Faults are reported as text with an `Execution Error` prefix. A run
    /// that exceeds the time budget returns the timeout sentinel, never
    /// partial output. The environment is removed before this returns.
    pub async fn run(&self, code: &str) -> RunOutput {
        info!("Preparing sandbox ({})", self.settings.image);
        let spec = self.settings.spec_for(code);

        let id = match self.backend.create(&spec).await {
            Ok(id) => id,
            Err(e) => {
                warn!("Sandbox provisioning failed: {}", e);
                return RunOutput::fault(&e);
            }
        };
        info!("Sandbox created: {}", id);

        let mut handle = SandboxHandle::new(id, spec.limits, Arc::clone(&self.backend));
        let outcome = AssertUnwindSafe(self.drive(&mut handle)).catch_unwind().await;
        handle.teardown().await;

        match outcome {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.is_provisioning() => {
                warn!("Sandbox {} could not start: {}", handle.id, e);
                RunOutput::fault(&e)
            }
            Ok(Err(e)) => {
                warn!("Sandbox {} failed: {}", handle.id, e);
                RunOutput::fault(&e)
            }
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    async fn drive(&self, handle: &mut SandboxHandle) -> Result<RunOutput, SandboxError> {
        self.backend.start(&handle.id).await?;
        handle.transition(SandboxState::Running);

        let mut captured = String::new();
        let waited = tokio::time::timeout(
            self.settings.timeout,
            self.backend.follow_output(&handle.id, &mut captured),
        )
        .await;

        match waited {
            Ok(Ok(())) => {
                handle.transition(SandboxState::Completed);
                debug!("Sandbox {} produced {} bytes", handle.id, captured.len());
                Ok(RunOutput::completed(&captured))
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                warn!(
                    "TIMEOUT: Sandbox {} exceeded {}s. Forcing stop...",
                    handle.id,
                    self.settings.timeout.as_secs()
                );
                self.force_stop(&handle.id).await;
                handle.transition(SandboxState::TimedOut);
                Ok(RunOutput::timed_out(self.settings.timeout))
            }
        }
    }

    /// Stop with grace; the outcome never blocks teardown.
    async fn force_stop(&self, id: &str) {
        let grace = self.settings.stop_grace;
        match tokio::time::timeout(grace + STOP_SLACK, self.backend.stop(id, grace)).await {
            Ok(Ok(())) => info!("Sandbox {} stopped by timeout policy", id),
            Ok(Err(e)) if e.is_not_found() => debug!("Sandbox {} already gone at stop", id),
            Ok(Err(e)) => warn!("Error stopping sandbox {}: {}", id, e),
            Err(_) => warn!("Stop request for sandbox {} did not return in time", id),
        }
    }
}
