//! # Build Orchestrator
//!
//! Executes a [`ProvisioningJob`]'s steps strictly in order. The first failing step
//! ends the job: later steps never run, and effects of earlier steps (published
//! parameters, deployed stacks) are left in place. Nothing is retried.
//!
//! Every stack a job creates is recorded as a [`CreatedResource`]. Undoing them is an
//! explicit operator action through [`BuildOrchestrator::compensate`], never automatic.
//!
//! Cancellation is cooperative: it is checked before each step, so a step that has
//! started always runs to completion.

use crate::constants::variables;
use crate::error::{ProvisioningError, Result};
use crate::logging::{log_error, log_job_operation, log_step_operation};
use crate::naming::TenantId;
use crate::orchestration::registry::JobRegistry;
use crate::orchestration::types::{
    BuildStep, CreatedResource, JobEnvironment, JobFailure, JobOutcome, JobStatus,
    ProvisioningJob, StageDeployment, StepKind, StepRecord, TeardownFailure, TeardownReport,
};
use crate::parameter_store::ParameterStore;
use crate::provisioning::types::{DeployedStacks, DesktopAddress, DirectoryId, Stage};
use crate::provisioning::{ComputeProvisioner, DesktopProvisioner, DirectoryProvisioner};
use crate::services::command::CommandRunner;
use crate::services::deployer::StackDeployer;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

/// The three stage provisioners a job's deploy step dispatches to.
pub struct StageProvisioners {
    pub directory: DirectoryProvisioner,
    pub desktop: DesktopProvisioner,
    pub compute: ComputeProvisioner,
}

pub struct BuildOrchestrator {
    runner: Arc<dyn CommandRunner>,
    store: Arc<dyn ParameterStore>,
    deployer: Arc<dyn StackDeployer>,
    provisioners: StageProvisioners,
    registry: Arc<JobRegistry>,
}

/// Mutable state carried across the steps of one job.
struct JobRun {
    env: JobEnvironment,
    steps: Vec<StepRecord>,
    created: Vec<CreatedResource>,
    deployment: Option<StageDeployment>,
}

impl BuildOrchestrator {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        store: Arc<dyn ParameterStore>,
        deployer: Arc<dyn StackDeployer>,
        provisioners: StageProvisioners,
        registry: Arc<JobRegistry>,
    ) -> Self {
        Self {
            runner,
            store,
            deployer,
            provisioners,
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn provisioners(&self) -> &StageProvisioners {
        &self.provisioners
    }

    /// Run a job that cannot be cancelled.
    pub async fn run_job(&self, job: ProvisioningJob) -> JobOutcome {
        let (_sender, receiver) = watch::channel(false);
        self.run_job_with_cancel(job, receiver).await
    }

    #[instrument(skip_all, fields(job_id = %job.job_id, stage = %job.stage, tenant = ?job.tenant_label()))]
    pub async fn run_job_with_cancel(
        &self,
        job: ProvisioningJob,
        cancel: watch::Receiver<bool>,
    ) -> JobOutcome {
        let started_at = Utc::now();
        self.registry.register(&job, None);
        self.registry.mark_running(job.job_id);
        log_job_operation(
            "run",
            job.job_id,
            job.stage.as_str(),
            job.tenant_label(),
            JobStatus::Running.as_str(),
            None,
        );

        let mut run = JobRun {
            env: JobEnvironment::new(job.parameters.clone()),
            steps: Vec::with_capacity(job.steps.len()),
            created: Vec::new(),
            deployment: None,
        };

        let mut failure = None;
        let mut status = JobStatus::Succeeded;

        for (index, step) in job.steps.iter().enumerate() {
            let cancelled = *cancel.borrow();
            if cancelled {
                warn!(step = %step.name, "Job cancelled before step");
                status = JobStatus::Cancelled;
                failure = Some(JobFailure::new(
                    &step.name,
                    ProvisioningError::Cancelled {
                        step: step.name.clone(),
                    },
                ));
                break;
            }

            self.registry.step_started(job.job_id, &step.name);
            let created_before = run.created.len();
            let step_started = Instant::now();
            let result = self.execute_step(&job, step, &mut run).await;
            let duration_ms = step_started.elapsed().as_millis() as u64;

            let record = StepRecord {
                index,
                name: step.name.clone(),
                succeeded: result.is_ok(),
                duration_ms,
            };
            self.registry.record_step(job.job_id, record.clone());
            run.steps.push(record);
            for resource in &run.created[created_before..] {
                self.registry.record_resource(job.job_id, resource.clone());
            }

            match result {
                Ok(()) => log_step_operation(
                    job.job_id,
                    index,
                    &step.name,
                    "succeeded",
                    Some(duration_ms),
                    None,
                ),
                Err(error) => {
                    let message = error.to_string();
                    log_step_operation(
                        job.job_id,
                        index,
                        &step.name,
                        "failed",
                        Some(duration_ms),
                        Some(&message),
                    );
                    log_error("build_orchestrator", &step.name, &message, Some(error.error_code()));
                    status = JobStatus::Failed;
                    failure = Some(JobFailure::new(&step.name, error));
                    break;
                }
            }
        }

        let outcome = JobOutcome {
            job_id: job.job_id,
            stage: job.stage,
            tenant: job.tenant.clone(),
            status,
            steps: run.steps,
            created_resources: run.created,
            deployment: run.deployment,
            variables: run.env.into_vars(),
            failure,
            started_at,
            finished_at: Utc::now(),
        };

        self.registry.finish(&outcome);
        log_job_operation(
            "finish",
            job.job_id,
            job.stage.as_str(),
            job.tenant_label(),
            status.as_str(),
            outcome.failure.as_ref().map(|f| f.message.as_str()),
        );
        outcome
    }

    async fn execute_step(
        &self,
        job: &ProvisioningJob,
        step: &BuildStep,
        run: &mut JobRun,
    ) -> Result<()> {
        debug!(step = %step.name, "Executing step");
        match &step.kind {
            StepKind::Shell { command, capture } => {
                let output = self.runner.run(command, run.env.vars()).await?;
                if !output.success() {
                    let stderr = output.stderr.trim();
                    return Err(ProvisioningError::StepExecutionFailed {
                        step: step.name.clone(),
                        exit_code: output.exit_code,
                        reason: if stderr.is_empty() {
                            "command exited unsuccessfully".to_string()
                        } else {
                            stderr.to_string()
                        },
                    });
                }
                if let Some(name) = capture {
                    run.env.set(name.clone(), output.last_line().unwrap_or_default());
                }
                Ok(())
            }
            StepKind::ResolveParameter { key, into } => {
                let value = self.store.get(key).await?;
                debug!(key = %key, variable = %into, "Resolved parameter");
                run.env.set(into.clone(), value);
                Ok(())
            }
            StepKind::LookupDesktopAddress {
                directory_from,
                into,
            } => {
                let tenant = required_tenant(job)?;
                let directory_id = DirectoryId::new(run.env.require(directory_from)?);
                let address = self
                    .provisioners
                    .compute
                    .resolve_desktop_address(&directory_id, tenant)
                    .await?;
                run.env.set(into.clone(), address.to_string());
                Ok(())
            }
            StepKind::Deploy { stage } => self.deploy_stage(job, *stage, run).await,
        }
    }

    async fn deploy_stage(&self, job: &ProvisioningJob, stage: Stage, run: &mut JobRun) -> Result<()> {
        let mut deployed = DeployedStacks::new();
        let result = self.deploy_stage_tracked(job, stage, run, &mut deployed).await;
        if result.is_err() && !deployed.is_empty() {
            warn!(stacks = ?deployed.names(), "Stage failed after its stack was deployed");
        }
        for stack_name in deployed.names() {
            run.created.push(created(stage, stack_name));
        }
        result
    }

    async fn deploy_stage_tracked(
        &self,
        job: &ProvisioningJob,
        stage: Stage,
        run: &mut JobRun,
        deployed: &mut DeployedStacks,
    ) -> Result<()> {
        match stage {
            Stage::Directory => {
                let deployment = self
                    .provisioners
                    .directory
                    .ensure_directory_tracked(deployed)
                    .await?;
                run.env.set(variables::DIRECTORY_ID, deployment.directory_id.as_str());
                run.deployment = Some(StageDeployment::Directory(deployment));
            }
            Stage::Desktop => {
                let tenant = required_tenant(job)?;
                let directory_id = DirectoryId::new(run.env.require(variables::DIRECTORY_ID)?);
                let deployment = self
                    .provisioners
                    .desktop
                    .provision_desktop_tracked(tenant, &directory_id, deployed)
                    .await?;
                run.deployment = Some(StageDeployment::Desktop(deployment));
            }
            Stage::Compute => {
                let tenant = required_tenant(job)?;
                let address = match run.env.get(variables::DESKTOP_ADDRESS) {
                    Some(raw) => DesktopAddress::parse(raw)
                        .map_err(|reason| ProvisioningError::lookup_failed(tenant.as_str(), reason))?,
                    None => DesktopAddress::Placeholder,
                };
                let deployment = self
                    .provisioners
                    .compute
                    .deploy_tracked(tenant, &address, deployed)
                    .await?;
                run.deployment = Some(StageDeployment::Compute(deployment));
            }
        }
        Ok(())
    }

    /// Destroy `resources` in reverse creation order. Every stack is attempted even
    /// when an earlier destroy fails.
    #[instrument(skip_all, fields(stacks = resources.len()))]
    pub async fn compensate(&self, resources: &[CreatedResource]) -> TeardownReport {
        let mut report = TeardownReport::default();
        for resource in resources.iter().rev() {
            match self.deployer.destroy(&resource.stack_name).await {
                Ok(()) => {
                    info!(stack = %resource.stack_name, stage = %resource.stage, "Stack torn down");
                    report.destroyed.push(resource.stack_name.clone());
                }
                Err(error) => {
                    log_error(
                        "build_orchestrator",
                        "compensate",
                        &error.to_string(),
                        Some(&resource.stack_name),
                    );
                    report.failed.push(TeardownFailure {
                        stack_name: resource.stack_name.clone(),
                        message: error.to_string(),
                    });
                }
            }
        }
        report
    }
}

fn required_tenant(job: &ProvisioningJob) -> Result<&TenantId> {
    job.tenant.as_ref().ok_or_else(|| {
        ProvisioningError::InvalidTenant(format!("job {} has no tenant", job.job_id))
    })
}

fn created(stage: Stage, stack_name: &str) -> CreatedResource {
    CreatedResource {
        stage,
        stack_name: stack_name.to_string(),
        created_at: Utc::now(),
    }
}
