//! Domain-specific error types for sandbox operations.
//!
//! Typed errors let the runtime tell a provisioning fault from a
//! mid-run fault, and a missing container from a real removal failure,
//! without parsing message strings.

/// Errors reported by a sandbox backend.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// Docker daemon is not running or not accessible.
    #[error("Docker is not available: {message}")]
    DockerUnavailable { message: String },

    /// The environment could not be created or started.
    #[error("Sandbox provisioning failed: {message}")]
    Provisioning { message: String },

    /// The environment was running but output capture or interaction failed.
    #[error("Sandbox runtime failure: {message}")]
    Runtime { message: String },

    /// The backend has no environment with this identifier.
    #[error("Sandbox not found: {id}")]
    NotFound { id: String },

    /// Stop or removal failed for a reason other than absence.
    #[error("Sandbox teardown failed: {message}")]
    Teardown { message: String },
}

impl SandboxError {
    /// Creates a `DockerUnavailable` error.
    pub fn docker_unavailable(message: impl Into<String>) -> Self {
        Self::DockerUnavailable {
            message: message.into(),
        }
    }

    /// Creates a `Provisioning` error.
    pub fn provisioning(message: impl Into<String>) -> Self {
        Self::Provisioning {
            message: message.into(),
        }
    }

    /// Creates a `Runtime` error.
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }

    /// Creates a `NotFound` error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Creates a `Teardown` error.
    pub fn teardown(message: impl Into<String>) -> Self {
        Self::Teardown {
            message: message.into(),
        }
    }

    /// Returns true if the target environment does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if this fault happened before the code started running.
    pub fn is_provisioning(&self) -> bool {
        matches!(
            self,
            Self::Provisioning { .. } | Self::DockerUnavailable { .. }
        )
    }
}
