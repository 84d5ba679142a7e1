//! Shared test harness: a fully wired system over in-memory backends and a shell
//! runner that records commands instead of executing them.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tenant_provisioner::bootstrap::ProvisioningSystem;
use tenant_provisioner::config::ProvisionerConfig;
use tenant_provisioner::error::Result;
use tenant_provisioner::orchestration::{JobStatus, JobView};
use tenant_provisioner::parameter_store::{InMemoryParameterStore, ParameterKey, ParameterStore};
use tenant_provisioner::services::{CommandOutput, CommandRunner, InMemoryCloud};
use tokio::sync::Notify;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommand {
    pub command: String,
    pub env: BTreeMap<String, String>,
}

/// Blocks one command until released, so tests can act while a step is running.
pub struct CommandGate {
    pub command: String,
    pub started: Arc<Notify>,
    pub release: Arc<Notify>,
}

#[derive(Default)]
pub struct RecordingCommandRunner {
    calls: Mutex<Vec<RecordedCommand>>,
    failures: Mutex<HashMap<String, i32>>,
    responses: Mutex<HashMap<String, String>>,
    gate: Mutex<Option<CommandGate>>,
}

impl RecordingCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `command` exit with `exit_code`.
    pub fn fail_command(&self, command: &str, exit_code: i32) {
        self.failures.lock().insert(command.to_string(), exit_code);
    }

    /// Make `command` print `stdout`.
    pub fn respond(&self, command: &str, stdout: &str) {
        self.responses
            .lock()
            .insert(command.to_string(), stdout.to_string());
    }

    /// Block `command` until the returned release handle is notified.
    pub fn gate(&self, command: &str) -> (Arc<Notify>, Arc<Notify>) {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        *self.gate.lock() = Some(CommandGate {
            command: command.to_string(),
            started: started.clone(),
            release: release.clone(),
        });
        (started, release)
    }

    pub fn calls(&self) -> Vec<RecordedCommand> {
        self.calls.lock().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.command.clone()).collect()
    }
}

#[async_trait]
impl CommandRunner for RecordingCommandRunner {
    async fn run(&self, command: &str, env: &BTreeMap<String, String>) -> Result<CommandOutput> {
        self.calls.lock().push(RecordedCommand {
            command: command.to_string(),
            env: env.clone(),
        });

        let gate = self
            .gate
            .lock()
            .as_ref()
            .filter(|gate| gate.command == command)
            .map(|gate| (gate.started.clone(), gate.release.clone()));
        if let Some((started, release)) = gate {
            started.notify_one();
            release.notified().await;
        }

        let exit_code = self.failures.lock().get(command).copied();
        Ok(match exit_code {
            Some(code) => CommandOutput {
                exit_code: Some(code),
                stdout: String::new(),
                stderr: format!("simulated failure of '{command}'"),
                duration: Duration::from_millis(1),
            },
            None => CommandOutput {
                exit_code: Some(0),
                stdout: self.responses.lock().get(command).cloned().unwrap_or_default(),
                stderr: String::new(),
                duration: Duration::from_millis(1),
            },
        })
    }
}

pub struct TestSystem {
    pub system: ProvisioningSystem,
    pub cloud: Arc<InMemoryCloud>,
    pub store: Arc<InMemoryParameterStore>,
    pub runner: Arc<RecordingCommandRunner>,
}

impl TestSystem {
    pub fn new() -> Self {
        Self::with_config(ProvisionerConfig::default())
    }

    pub fn with_config(config: ProvisionerConfig) -> Self {
        let cloud = Arc::new(InMemoryCloud::new());
        let store = Arc::new(InMemoryParameterStore::new());
        let runner = Arc::new(RecordingCommandRunner::new());
        let system = ProvisioningSystem::from_parts(
            config,
            store.clone(),
            runner.clone(),
            cloud.clone(),
            cloud.clone(),
        );
        Self {
            system,
            cloud,
            store,
            runner,
        }
    }

    pub async fn publish_directory_id(&self, directory_id: &str) {
        self.store
            .put(&ParameterKey::directory_id(), directory_id)
            .await
            .unwrap();
    }

    /// Poll the registry until the job reaches a terminal status.
    pub async fn wait_for_terminal(&self, job_id: Uuid) -> JobView {
        for _ in 0..200 {
            let view = self.system.gateway.status(job_id).unwrap();
            if view.status.is_terminal() {
                return view;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {job_id} did not finish");
    }
}

pub fn assert_status(view: &JobView, expected: JobStatus) {
    assert_eq!(
        view.status, expected,
        "unexpected status for job {}: {:?}",
        view.job_id, view.failure
    );
}
