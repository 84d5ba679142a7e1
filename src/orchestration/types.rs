//! # Orchestration Types
//!
//! Jobs, steps and the records produced while a job runs.

use crate::error::{ProvisioningError, Result};
use crate::naming::{DeploymentName, TenantId};
use crate::parameter_store::ParameterKey;
use crate::provisioning::types::{
    ComputeDeployment, DesktopDeployment, DirectoryDeployment, Stage,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// What a single build step does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
    /// Run a shell command with the job variables in its environment. When `capture`
    /// is set, the last non-empty stdout line is stored under that variable.
    Shell {
        command: String,
        capture: Option<String>,
    },
    /// Read a parameter from the store into a job variable.
    ResolveParameter { key: ParameterKey, into: String },
    /// Resolve the tenant's desktop address (directory id taken from `directory_from`).
    LookupDesktopAddress { directory_from: String, into: String },
    /// Invoke the stage deploy.
    Deploy { stage: Stage },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStep {
    pub name: String,
    pub kind: StepKind,
}

impl BuildStep {
    pub fn shell(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: StepKind::Shell {
                command: command.into(),
                capture: None,
            },
        }
    }

    pub fn resolve(name: impl Into<String>, key: ParameterKey, into: &str) -> Self {
        Self {
            name: name.into(),
            kind: StepKind::ResolveParameter {
                key,
                into: into.to_string(),
            },
        }
    }

    pub fn lookup(name: impl Into<String>, directory_from: &str, into: &str) -> Self {
        Self {
            name: name.into(),
            kind: StepKind::LookupDesktopAddress {
                directory_from: directory_from.to_string(),
                into: into.to_string(),
            },
        }
    }

    pub fn deploy(name: impl Into<String>, stage: Stage) -> Self {
        Self {
            name: name.into(),
            kind: StepKind::Deploy { stage },
        }
    }
}

/// One execution of a stage's ordered steps.
#[derive(Debug, Clone)]
pub struct ProvisioningJob {
    pub job_id: Uuid,
    pub stage: Stage,
    pub tenant: Option<TenantId>,
    pub deployment_name: Option<DeploymentName>,
    /// Injected parameters, seeded into the job environment before the first step.
    pub parameters: BTreeMap<String, String>,
    pub steps: Vec<BuildStep>,
    pub created_at: DateTime<Utc>,
}

impl ProvisioningJob {
    pub fn tenant_label(&self) -> Option<&str> {
        self.tenant.as_ref().map(TenantId::as_str)
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }
}

/// Variables visible to the steps of one job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct JobEnvironment {
    vars: BTreeMap<String, String>,
}

impl JobEnvironment {
    pub fn new(parameters: BTreeMap<String, String>) -> Self {
        Self { vars: parameters }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// A variable an earlier step must have set.
    pub fn require(&self, name: &str) -> Result<&str> {
        self.get(name)
            .ok_or_else(|| ProvisioningError::dependency_missing(name))
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    pub fn into_vars(self) -> BTreeMap<String, String> {
        self.vars
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Accepted,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Accepted => "accepted",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub index: usize,
    pub name: String,
    pub succeeded: bool,
    pub duration_ms: u64,
}

/// A stack created or updated by a job, kept for explicit teardown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedResource {
    pub stage: Stage,
    pub stack_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobFailure {
    pub step: String,
    pub code: String,
    pub message: String,
    #[serde(skip)]
    pub error: ProvisioningError,
}

impl JobFailure {
    pub fn new(step: impl Into<String>, error: ProvisioningError) -> Self {
        Self {
            step: step.into(),
            code: error.error_code().to_string(),
            message: error.to_string(),
            error,
        }
    }
}

/// Result of the stage deploy step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageDeployment {
    Directory(DirectoryDeployment),
    Desktop(DesktopDeployment),
    Compute(ComputeDeployment),
}

#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub job_id: Uuid,
    pub stage: Stage,
    pub tenant: Option<TenantId>,
    pub status: JobStatus,
    pub steps: Vec<StepRecord>,
    pub created_resources: Vec<CreatedResource>,
    pub deployment: Option<StageDeployment>,
    pub variables: BTreeMap<String, String>,
    pub failure: Option<JobFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Succeeded
    }

    pub fn error(&self) -> Option<&ProvisioningError> {
        self.failure.as_ref().map(|f| &f.error)
    }

    /// Names of the steps that actually ran, in order.
    pub fn executed_steps(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }
}

/// Result of destroying a job's created stacks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    pub destroyed: Vec<String>,
    pub failed: Vec<TeardownFailure>,
    /// Stacks left alone because a later job recorded them too.
    pub superseded: Vec<SupersededStack>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupersededStack {
    pub stack_name: String,
    pub newer_job_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeardownFailure {
    pub stack_name: String,
    pub message: String,
}

impl TeardownReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}
