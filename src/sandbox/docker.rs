use async_trait::async_trait;
use chrono::Utc;
use bollard::container::{
    Config as ContainerConfig, CreateContainerOptions, ListContainersOptions, LogOutput,
    LogsOptions, RemoveContainerOptions, StopContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::service::ContainerSummary;
use bollard::Docker;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{SandboxBackend, SandboxError, SandboxSpec};

/// Label attached to every container this crate creates.
pub(crate) const SANDBOX_LABEL: &str = "phoenix.sandbox";

/// Runs sandboxes as Docker containers.
///
/// `Docker` is a cheap handle over a connection pool, so concurrent runs
/// share it without serializing on each other.
#[derive(Debug, Clone)]
pub(crate) struct DockerBackend {
    docker: Docker,
}

impl DockerBackend {
    /// Connects to the local Docker daemon and checks it responds.
    pub async fn connect() -> Result<Self, SandboxError> {
        let docker = Docker::connect_with_local_defaults().map_err(|e| {
            SandboxError::docker_unavailable(format!(
                "Failed to connect to Docker ({e}). Is Docker running?"
            ))
        })?;

        docker.ping().await.map_err(|e| {
            SandboxError::docker_unavailable(format!(
                "Cannot ping Docker daemon ({e}). Is Docker running?"
            ))
        })?;

        Ok(Self { docker })
    }

    /// Underlying client, for image management.
    pub fn client(&self) -> &Docker {
        &self.docker
    }

    /// Removes sandbox containers left behind by a killed process.
    ///
    /// Only containers older than `min_age` are touched, so runs still in
    /// progress elsewhere keep their sandbox. Returns how many were removed.
    pub async fn remove_orphaned(&self, min_age: Duration) -> Result<u32, SandboxError> {
        let mut filters = HashMap::new();
        filters.insert("label".to_string(), vec![format!("{SANDBOX_LABEL}=true")]);

        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions::<String> {
                all: true,
                filters,
                ..Default::default()
            }))
            .await
            .map_err(|e| SandboxError::runtime(format!("Failed to list containers: {e}")))?;

        let orphans = orphan_ids(&containers, Utc::now().timestamp(), min_age);
        debug!(
            "{} labelled containers, {} orphaned",
            containers.len(),
            orphans.len()
        );

        let mut removed = 0;
        for id in orphans {
            match self.remove(&id).await {
                Ok(()) => {
                    info!("Removed orphaned sandbox {}", id);
                    removed += 1;
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => warn!("Failed to remove orphaned sandbox {}: {}", id, e),
            }
        }

        Ok(removed)
    }

    async fn remove_with(&self, id: &str, force: bool) -> Result<(), BollardError> {
        self.docker
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force,
                    v: true,
                    ..Default::default()
                }),
            )
            .await
    }
}

/// Builds the container configuration for one run.
///
/// Networking is switched off at two levels and is not configurable.
fn container_config(spec: &SandboxSpec) -> ContainerConfig<String> {
    let mut labels = HashMap::new();
    labels.insert(SANDBOX_LABEL.to_string(), "true".to_string());

    ContainerConfig {
        image: Some(spec.image.clone()),
        cmd: Some(spec.command.clone()),
        labels: Some(labels),
        network_disabled: Some(true),
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        host_config: Some(bollard::service::HostConfig {
            memory: Some(spec.limits.memory_bytes),
            memory_swap: Some(spec.limits.memory_bytes),
            cpu_period: Some(super::ResourceLimits::CPU_PERIOD_MICROS),
            cpu_quota: Some(spec.limits.cpu_quota_micros()),
            network_mode: Some("none".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Containers that no live run can own: created at least `min_age` ago.
/// Without a creation time only stopped containers qualify.
fn orphan_ids(containers: &[ContainerSummary], now: i64, min_age: Duration) -> Vec<String> {
    let min_age = i64::try_from(min_age.as_secs()).unwrap_or(i64::MAX);
    containers
        .iter()
        .filter(|c| match c.created {
            Some(created) => now.saturating_sub(created) >= min_age,
            None => matches!(c.state.as_deref(), Some("exited" | "dead")),
        })
        .filter_map(|c| c.id.clone())
        .collect()
}

fn status_code(err: &BollardError) -> Option<u16> {
    match err {
        BollardError::DockerResponseServerError { status_code, .. } => Some(*status_code),
        _ => None,
    }
}

fn is_not_found(err: &BollardError) -> bool {
    status_code(err) == Some(404)
}

#[async_trait]
impl SandboxBackend for DockerBackend {
    async fn create(&self, spec: &SandboxSpec) -> Result<String, SandboxError> {
        let name = format!(
            "phoenix-{}",
            uuid::Uuid::new_v4().simple().to_string().get(..12).unwrap_or("sandbox")
        );
        debug!("Creating container: {}", name);

        let response = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: name.clone(),
                    platform: None,
                }),
                container_config(spec),
            )
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    SandboxError::provisioning(format!(
                        "Image '{}' not found. Run 'phoenix image build' first",
                        spec.image
                    ))
                } else {
                    SandboxError::provisioning(format!("Failed to create container: {e}"))
                }
            })?;

        for warning in &response.warnings {
            warn!("Docker warning for {}: {}", name, warning);
        }
        Ok(response.id)
    }

    async fn start(&self, id: &str) -> Result<(), SandboxError> {
        debug!("Starting container {}", id);
        self.docker
            .start_container::<String>(id, None)
            .await
            .map_err(|e| SandboxError::provisioning(format!("Failed to start container: {e}")))
    }

    async fn follow_output(&self, id: &str, sink: &mut String) -> Result<(), SandboxError> {
        let mut stream = std::pin::pin!(self.docker.logs(
            id,
            Some(LogsOptions::<String> {
                follow: true,
                stdout: true,
                stderr: true,
                ..Default::default()
            }),
        ));

        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(
                    LogOutput::StdOut { message }
                    | LogOutput::StdErr { message }
                    | LogOutput::Console { message },
                ) => sink.push_str(&String::from_utf8_lossy(&message)),
                Ok(LogOutput::StdIn { .. }) => {}
                Err(e) => {
                    return Err(SandboxError::runtime(format!(
                        "Error reading container output: {e}"
                    )))
                }
            }
        }

        debug!("Container {} output stream closed", id);
        Ok(())
    }

    async fn stop(&self, id: &str, grace: Duration) -> Result<(), SandboxError> {
        let t = i64::try_from(grace.as_secs()).unwrap_or(i64::MAX);
        match self
            .docker
            .stop_container(id, Some(StopContainerOptions { t }))
            .await
        {
            Ok(()) => Ok(()),
            // 304: already stopped
            Err(e) if status_code(&e) == Some(304) => Ok(()),
            Err(e) if is_not_found(&e) => Err(SandboxError::not_found(id)),
            Err(e) => Err(SandboxError::teardown(format!("Failed to stop container: {e}"))),
        }
    }

    async fn remove(&self, id: &str) -> Result<(), SandboxError> {
        match self.remove_with(id, false).await {
            Ok(()) => return Ok(()),
            Err(e) if is_not_found(&e) => return Err(SandboxError::not_found(id)),
            Err(e) => debug!("Graceful removal of {} failed ({}), forcing", id, e),
        }

        match self.remove_with(id, true).await {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => Err(SandboxError::not_found(id)),
            Err(e) => Err(SandboxError::teardown(format!(
                "Failed to remove container: {e}"
            ))),
        }
    }
}
