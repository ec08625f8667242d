//! Docker sandbox for isolated code execution.
//!
//! Provides container-based isolation for running generated code with
//! fixed resource ceilings, no network access, and guaranteed teardown.
//!
//! The lifecycle logic lives in [`SandboxRuntime`]; the container engine
//! is reached through the [`SandboxBackend`] trait so the lifecycle can be
//! exercised without a Docker daemon.

mod docker;
mod error;
#[cfg(test)]
pub(crate) mod mock;
mod runtime;

pub(crate) use docker::DockerBackend;
pub(crate) use error::SandboxError;
pub(crate) use runtime::{RunOutput, RunStatus, SandboxRuntime, SandboxSettings};
#[cfg(test)]
pub(crate) use runtime::TIMEOUT_SENTINEL_PREFIX;

use async_trait::async_trait;
use std::time::Duration;

/// Resource ceilings applied to every provisioned environment.
///
/// Networking has no field here: every sandbox runs with the network
/// disabled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ResourceLimits {
    /// Hard memory ceiling in bytes.
    pub memory_bytes: i64,
    /// Share of a single CPU core, e.g. `0.5` for half a core.
    pub cpu_fraction: f64,
}

impl ResourceLimits {
    /// CFS scheduler period used to express the CPU ceiling.
    pub const CPU_PERIOD_MICROS: i64 = 100_000;

    /// CPU quota in microseconds per [`Self::CPU_PERIOD_MICROS`].
    #[allow(clippy::cast_possible_truncation)]
    pub fn cpu_quota_micros(&self) -> i64 {
        (self.cpu_fraction * Self::CPU_PERIOD_MICROS as f64).round() as i64
    }
}

/// Everything a backend needs to provision one environment.
#[derive(Debug, Clone)]
pub(crate) struct SandboxSpec {
    /// Image the environment is created from.
    pub image: String,
    /// Entry command; the submitted code is its last argument.
    pub command: Vec<String>,
    /// Resource ceilings.
    pub limits: ResourceLimits,
}

/// Operations the runtime requires of an isolated-execution backend.
///
/// Implementations report a missing target as [`SandboxError::NotFound`];
/// the runtime decides whether that is a fault.
#[async_trait]
pub(crate) trait SandboxBackend: Send + Sync {
    /// Creates an environment with the given limits and returns its id.
    async fn create(&self, spec: &SandboxSpec) -> Result<String, SandboxError>;

    /// Starts a created environment.
    async fn start(&self, id: &str) -> Result<(), SandboxError>;

    /// Appends combined stdout/stderr to `sink` in arrival order until the
    /// environment exits.
    async fn follow_output(&self, id: &str, sink: &mut String) -> Result<(), SandboxError>;

    /// Asks the environment to stop, killing it after `grace`.
    async fn stop(&self, id: &str, grace: Duration) -> Result<(), SandboxError>;

    /// Removes the environment, forcing removal if a graceful one fails.
    async fn remove(&self, id: &str) -> Result<(), SandboxError>;
}
