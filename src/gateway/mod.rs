//! # Trigger Gateway
//!
//! Starts one provisioning job per trigger and hands back a [`JobHandle`] as soon as
//! the job is accepted. Acceptance and completion are separate: the handle can be
//! awaited for the terminal [`JobOutcome`], and the job registry reports status to
//! anyone who only holds the job id.

use crate::error::{ProvisioningError, Result};
use crate::logging::log_job_operation;
use crate::naming::{DeploymentName, NamingPolicy, TenantId};
use crate::orchestration::{
    BuildOrchestrator, JobOutcome, JobRegistry, JobStatus, JobTemplate, JobView, TeardownReport,
};
use crate::provisioning::types::Stage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

/// Body of a trigger request. The tenant travels as `userName`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRequest {
    #[serde(rename = "userName", default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
}

impl TriggerRequest {
    pub fn for_tenant(user_name: impl Into<String>) -> Self {
        Self {
            user_name: Some(user_name.into()),
        }
    }
}

/// What the caller learns at acceptance time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobAcceptance {
    pub job_id: Uuid,
    pub stage: Stage,
    pub status: JobStatus,
    pub tenant: Option<TenantId>,
    pub deployment_name: Option<DeploymentName>,
    pub accepted_at: DateTime<Utc>,
}

/// Awaitable, cancellable handle to an accepted job.
///
/// Dropping the handle detaches it; the job keeps running.
pub struct JobHandle {
    acceptance: JobAcceptance,
    task: JoinHandle<JobOutcome>,
    cancel: Arc<watch::Sender<bool>>,
}

impl JobHandle {
    pub fn job_id(&self) -> Uuid {
        self.acceptance.job_id
    }

    pub fn acceptance(&self) -> &JobAcceptance {
        &self.acceptance
    }

    /// Ask the job to stop before its next step.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub async fn wait(self) -> Result<JobOutcome> {
        self.task
            .await
            .map_err(|e| ProvisioningError::Internal(format!("job task failed: {e}")))
    }
}

pub struct TriggerGateway {
    orchestrator: Arc<BuildOrchestrator>,
    naming: NamingPolicy,
    install_commands: Vec<String>,
}

impl TriggerGateway {
    pub fn new(
        orchestrator: Arc<BuildOrchestrator>,
        naming: NamingPolicy,
        install_commands: Vec<String>,
    ) -> Self {
        Self {
            orchestrator,
            naming,
            install_commands,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        self.orchestrator.registry()
    }

    pub fn naming(&self) -> NamingPolicy {
        self.naming
    }

    /// Accept a job for `stage` and start it on its own task.
    ///
    /// Fails only when the job cannot be built, e.g. a tenant stage without a valid
    /// `userName`. Must be called from within a tokio runtime.
    pub fn trigger(&self, stage: Stage, request: TriggerRequest) -> Result<JobHandle> {
        let tenant = if stage.requires_tenant() {
            let raw = request.user_name.ok_or_else(|| {
                ProvisioningError::InvalidTenant("request body is missing 'userName'".to_string())
            })?;
            Some(TenantId::new(raw)?)
        } else {
            None
        };

        let job = JobTemplate::for_stage(stage)
            .with_install_commands(&self.install_commands)
            .instantiate(tenant, self.naming)?;

        let acceptance = JobAcceptance {
            job_id: job.job_id,
            stage: job.stage,
            status: JobStatus::Accepted,
            tenant: job.tenant.clone(),
            deployment_name: job.deployment_name.clone(),
            accepted_at: job.created_at,
        };

        let (sender, receiver) = watch::channel(false);
        let cancel = Arc::new(sender);
        self.registry().register(&job, Some(cancel.clone()));
        log_job_operation(
            "accept",
            job.job_id,
            stage.as_str(),
            job.tenant_label(),
            JobStatus::Accepted.as_str(),
            None,
        );

        let orchestrator = self.orchestrator.clone();
        let task = tokio::spawn(async move { orchestrator.run_job_with_cancel(job, receiver).await });

        Ok(JobHandle {
            acceptance,
            task,
            cancel,
        })
    }

    pub fn status(&self, job_id: Uuid) -> Result<JobView> {
        self.registry().status(job_id)
    }

    pub fn cancel(&self, job_id: Uuid) -> Result<bool> {
        self.registry().request_cancel(job_id)
    }

    /// Destroy the stacks a finished job created, newest first.
    ///
    /// A job is torn down at most once. Stacks that a later job recorded again are
    /// reported as superseded and left in place.
    pub async fn teardown(&self, job_id: Uuid) -> Result<TeardownReport> {
        let resources = self.registry().begin_teardown(job_id)?;
        let superseded = self.registry().superseded_stacks(job_id, &resources);
        for stack in &superseded {
            warn!(
                job_id = %job_id,
                stack = %stack.stack_name,
                newer_job_id = %stack.newer_job_id,
                "Stack recorded by a later job; leaving it in place"
            );
        }
        let owned: Vec<_> = resources
            .into_iter()
            .filter(|r| !superseded.iter().any(|s| s.stack_name == r.stack_name))
            .collect();

        let mut report = self.orchestrator.compensate(&owned).await;
        report.superseded = superseded;
        self.registry().end_teardown(job_id, report.is_complete());
        info!(
            job_id = %job_id,
            destroyed = report.destroyed.len(),
            failed = report.failed.len(),
            superseded = report.superseded.len(),
            "Teardown finished"
        );
        Ok(report)
    }
}
