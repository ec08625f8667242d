//! Recording sandbox backend for tests.
//!
//! Plays back scripted runs and records every call in order so tests can
//! assert on the lifecycle without a Docker daemon.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{SandboxBackend, SandboxError, SandboxSpec};

/// Behavior of one scripted run.
#[derive(Debug, Clone)]
pub(crate) enum MockRun {
    /// Runs to completion with this combined output.
    Output(String),
    /// Writes this partial output, then never finishes.
    Hang(String),
    /// Never finishes, and the stop request fails.
    HangAndStopFails,
    /// Creation fails.
    CreateFails,
    /// Creation succeeds, start fails.
    StartFails,
    /// Output capture fails mid-run.
    StreamFails,
}

/// How `remove` responds.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) enum RemoveBehavior {
    #[default]
    Ok,
    NotFound,
    Fails,
}

/// One observed backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BackendCall {
    Create,
    Start(String),
    FollowOutput(String),
    Stop(String),
    Remove(String),
}

#[derive(Debug, Default)]
struct Inner {
    script: VecDeque<MockRun>,
    current: Option<MockRun>,
    calls: Vec<BackendCall>,
    specs: Vec<SandboxSpec>,
    next_id: usize,
}

/// Scripted backend; clones share the same script and call log.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingBackend {
    inner: Arc<Mutex<Inner>>,
    remove: RemoveBehavior,
}

impl RecordingBackend {
    /// Backend that plays `runs` in order, one per `create`. Once the
    /// script is exhausted the last entry repeats.
    pub fn new(runs: Vec<MockRun>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                script: runs.into(),
                ..Inner::default()
            })),
            remove: RemoveBehavior::Ok,
        }
    }

    /// Sets how `remove` responds.
    pub fn with_remove(mut self, behavior: RemoveBehavior) -> Self {
        self.remove = behavior;
        self
    }

    /// All calls so far, in order.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Spec passed to the most recent `create`.
    pub fn last_spec(&self) -> Option<SandboxSpec> {
        self.inner.lock().unwrap().specs.last().cloned()
    }

    /// Code submitted to each `create`, in order.
    pub fn submitted_code(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .specs
            .iter()
            .filter_map(|s| s.command.last().cloned())
            .collect()
    }

    /// Number of `create` calls.
    pub fn run_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, BackendCall::Create))
            .count()
    }

    fn record(&self, call: BackendCall) {
        self.inner.lock().unwrap().calls.push(call);
    }

    fn current(&self) -> Option<MockRun> {
        self.inner.lock().unwrap().current.clone()
    }
}

#[async_trait]
impl SandboxBackend for RecordingBackend {
    async fn create(&self, spec: &SandboxSpec) -> Result<String, SandboxError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(BackendCall::Create);
        inner.specs.push(spec.clone());

        let run = if inner.script.len() > 1 {
            inner.script.pop_front()
        } else {
            inner.script.front().cloned()
        };
        inner.current.clone_from(&run);

        if matches!(run, Some(MockRun::CreateFails)) {
            return Err(SandboxError::provisioning("image not found"));
        }
        inner.next_id += 1;
        Ok(format!("mock-{}", inner.next_id))
    }

    async fn start(&self, id: &str) -> Result<(), SandboxError> {
        self.record(BackendCall::Start(id.to_string()));
        match self.current() {
            Some(MockRun::StartFails) => Err(SandboxError::provisioning("cannot start")),
            _ => Ok(()),
        }
    }

    async fn follow_output(&self, id: &str, sink: &mut String) -> Result<(), SandboxError> {
        self.record(BackendCall::FollowOutput(id.to_string()));
        match self.current() {
            Some(MockRun::Output(out)) => {
                sink.push_str(&out);
                Ok(())
            }
            Some(MockRun::Hang(partial)) => {
                sink.push_str(&partial);
                std::future::pending().await
            }
            Some(MockRun::HangAndStopFails) => std::future::pending().await,
            Some(MockRun::StreamFails) => Err(SandboxError::runtime("log stream closed")),
            _ => Ok(()),
        }
    }

    async fn stop(&self, id: &str, _grace: Duration) -> Result<(), SandboxError> {
        self.record(BackendCall::Stop(id.to_string()));
        match self.current() {
            Some(MockRun::HangAndStopFails) => Err(SandboxError::teardown("stop refused")),
            _ => Ok(()),
        }
    }

    async fn remove(&self, id: &str) -> Result<(), SandboxError> {
        self.record(BackendCall::Remove(id.to_string()));
        match self.remove {
            RemoveBehavior::Ok => Ok(()),
            RemoveBehavior::NotFound => Err(SandboxError::not_found(id)),
            RemoveBehavior::Fails => Err(SandboxError::teardown("device or resource busy")),
        }
    }
}
