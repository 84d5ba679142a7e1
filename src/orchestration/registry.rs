//! # Job Registry
//!
//! In-process record of accepted jobs: their status, the steps that have run, the
//! stacks they created and, for jobs still running, the handle used to request
//! cancellation. Backs the job status and teardown routes.
//!
//! Running jobs are always kept. Finished jobs are kept up to a retention bound; past
//! it the oldest finished job is evicted and can no longer be queried or torn down.

use crate::constants::DEFAULT_RETAINED_FINISHED_JOBS;
use crate::error::{ProvisioningError, Result};
use crate::orchestration::types::{
    CreatedResource, JobFailure, JobOutcome, JobStatus, ProvisioningJob, StepRecord,
    SupersededStack,
};
use crate::provisioning::types::Stage;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

/// Serializable snapshot of one job.
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub job_id: Uuid,
    pub stage: Stage,
    pub tenant: Option<String>,
    pub deployment_name: Option<String>,
    pub status: JobStatus,
    pub current_step: Option<String>,
    pub steps: Vec<StepRecord>,
    pub created_resources: Vec<CreatedResource>,
    pub failure: Option<JobFailure>,
    pub accepted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub torn_down_at: Option<DateTime<Utc>>,
}

struct JobEntry {
    view: JobView,
    cancel: Option<Arc<watch::Sender<bool>>>,
    tearing_down: bool,
}

pub struct JobRegistry {
    jobs: DashMap<Uuid, JobEntry>,
    /// Finished job ids, oldest first.
    finished: Mutex<VecDeque<Uuid>>,
    retain_finished: usize,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RETAINED_FINISHED_JOBS)
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `retain_finished` finished jobs (at least one).
    pub fn with_retention(retain_finished: usize) -> Self {
        Self {
            jobs: DashMap::new(),
            finished: Mutex::new(VecDeque::new()),
            retain_finished: retain_finished.max(1),
        }
    }

    /// Record a newly accepted job. Re-registering an existing id is a no-op.
    pub fn register(&self, job: &ProvisioningJob, cancel: Option<Arc<watch::Sender<bool>>>) {
        self.jobs.entry(job.job_id).or_insert_with(|| JobEntry {
            view: JobView {
                job_id: job.job_id,
                stage: job.stage,
                tenant: job.tenant_label().map(str::to_string),
                deployment_name: job.deployment_name.as_ref().map(|n| n.as_str().to_string()),
                status: JobStatus::Accepted,
                current_step: None,
                steps: Vec::new(),
                created_resources: Vec::new(),
                failure: None,
                accepted_at: job.created_at,
                started_at: None,
                finished_at: None,
                torn_down_at: None,
            },
            cancel,
            tearing_down: false,
        });
        debug!(job_id = %job.job_id, stage = %job.stage, "Job registered");
    }

    pub fn mark_running(&self, job_id: Uuid) {
        if let Some(mut entry) = self.jobs.get_mut(&job_id) {
            entry.view.status = JobStatus::Running;
            entry.view.started_at = Some(Utc::now());
        }
    }

    pub fn step_started(&self, job_id: Uuid, step: &str) {
        if let Some(mut entry) = self.jobs.get_mut(&job_id) {
            entry.view.current_step = Some(step.to_string());
        }
    }

    pub fn record_step(&self, job_id: Uuid, record: StepRecord) {
        if let Some(mut entry) = self.jobs.get_mut(&job_id) {
            entry.view.steps.push(record);
        }
    }

    pub fn record_resource(&self, job_id: Uuid, resource: CreatedResource) {
        if let Some(mut entry) = self.jobs.get_mut(&job_id) {
            entry.view.created_resources.push(resource);
        }
    }

    /// Store the terminal state, release the cancel handle and evict the oldest
    /// finished jobs beyond the retention bound.
    pub fn finish(&self, outcome: &JobOutcome) {
        {
            let Some(mut entry) = self.jobs.get_mut(&outcome.job_id) else {
                return;
            };
            entry.view.status = outcome.status;
            entry.view.current_step = None;
            entry.view.steps = outcome.steps.clone();
            entry.view.created_resources = outcome.created_resources.clone();
            entry.view.failure = outcome.failure.clone();
            entry.view.finished_at = Some(outcome.finished_at);
            entry.cancel = None;
        }

        let evicted = {
            let mut finished = self.finished.lock();
            finished.push_back(outcome.job_id);
            let excess = finished.len().saturating_sub(self.retain_finished);
            finished.drain(..excess).collect::<Vec<_>>()
        };
        for job_id in evicted {
            self.jobs.remove(&job_id);
            debug!(job_id = %job_id, "Finished job evicted from registry");
        }
    }

    pub fn get(&self, job_id: Uuid) -> Option<JobView> {
        self.jobs.get(&job_id).map(|entry| entry.view.clone())
    }

    pub fn status(&self, job_id: Uuid) -> Result<JobView> {
        self.get(job_id).ok_or(ProvisioningError::JobNotFound(job_id))
    }

    /// Request cancellation. Returns `false` when the job already finished.
    /// Takes effect before the job's next step; a step already running completes.
    pub fn request_cancel(&self, job_id: Uuid) -> Result<bool> {
        let entry = self
            .jobs
            .get(&job_id)
            .ok_or(ProvisioningError::JobNotFound(job_id))?;
        match &entry.cancel {
            Some(sender) if !entry.view.status.is_terminal() => {
                sender.send_replace(true);
                info!(job_id = %job_id, "Cancellation requested");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Claim a finished job for teardown and return the stacks it created.
    ///
    /// Fails with `JobNotFinished` while the job runs and `JobAlreadyTornDown` once a
    /// teardown completed or while another one is in progress. Every claim must be
    /// closed with [`Self::end_teardown`].
    pub fn begin_teardown(&self, job_id: Uuid) -> Result<Vec<CreatedResource>> {
        let mut entry = self
            .jobs
            .get_mut(&job_id)
            .ok_or(ProvisioningError::JobNotFound(job_id))?;
        if !entry.view.status.is_terminal() {
            return Err(ProvisioningError::JobNotFinished(job_id));
        }
        if entry.view.torn_down_at.is_some() || entry.tearing_down {
            return Err(ProvisioningError::JobAlreadyTornDown(job_id));
        }
        entry.tearing_down = true;
        Ok(entry.view.created_resources.clone())
    }

    /// Release a teardown claim. A complete teardown marks the job torn down for good;
    /// otherwise it may be attempted again.
    pub fn end_teardown(&self, job_id: Uuid, complete: bool) {
        if let Some(mut entry) = self.jobs.get_mut(&job_id) {
            entry.tearing_down = false;
            if complete {
                entry.view.torn_down_at = Some(Utc::now());
            }
        }
    }

    /// Stacks of `job_id` that a later, not yet torn down job also recorded. Stack
    /// names are deterministic per tenant, so the later job owns them now.
    pub fn superseded_stacks(
        &self,
        job_id: Uuid,
        resources: &[CreatedResource],
    ) -> Vec<SupersededStack> {
        let Some(accepted_at) = self.jobs.get(&job_id).map(|entry| entry.view.accepted_at)
        else {
            return Vec::new();
        };
        let mut superseded = Vec::new();
        for resource in resources {
            let newer = self.jobs.iter().find(|other| {
                other.view.job_id != job_id
                    && other.view.accepted_at > accepted_at
                    && other.view.torn_down_at.is_none()
                    && other
                        .view
                        .created_resources
                        .iter()
                        .any(|r| r.stack_name == resource.stack_name)
            });
            if let Some(other) = newer {
                superseded.push(SupersededStack {
                    stack_name: resource.stack_name.clone(),
                    newer_job_id: other.view.job_id,
                });
            }
        }
        superseded
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::{NamingPolicy, TenantId};
    use crate::orchestration::job_template::JobTemplate;

    fn job() -> ProvisioningJob {
        JobTemplate::desktop()
            .instantiate(Some(TenantId::new("bob").unwrap()), NamingPolicy::Substitute)
            .unwrap()
    }

    #[test]
    fn test_register_and_status() {
        let registry = JobRegistry::new();
        let job = job();
        registry.register(&job, None);

        let view = registry.status(job.job_id).unwrap();
        assert_eq!(view.status, JobStatus::Accepted);
        assert_eq!(view.tenant.as_deref(), Some("bob"));
        assert_eq!(view.deployment_name.as_deref(), Some("bob"));
    }

    #[test]
    fn test_unknown_job() {
        let registry = JobRegistry::new();
        let id = Uuid::new_v4();
        assert_eq!(
            registry.status(id).unwrap_err(),
            ProvisioningError::JobNotFound(id)
        );
        assert!(registry.request_cancel(id).is_err());
    }

    #[test]
    fn test_cancel_signals_receiver() {
        let registry = JobRegistry::new();
        let job = job();
        let (sender, receiver) = watch::channel(false);
        registry.register(&job, Some(Arc::new(sender)));

        assert!(registry.request_cancel(job.job_id).unwrap());
        assert!(*receiver.borrow());
    }

    fn finished(registry: &JobRegistry, job: &ProvisioningJob, stacks: &[&str]) {
        let now = Utc::now();
        registry.finish(&JobOutcome {
            job_id: job.job_id,
            stage: job.stage,
            tenant: job.tenant.clone(),
            status: JobStatus::Succeeded,
            steps: Vec::new(),
            created_resources: stacks
                .iter()
                .map(|name| CreatedResource {
                    stage: job.stage,
                    stack_name: name.to_string(),
                    created_at: now,
                })
                .collect(),
            deployment: None,
            variables: Default::default(),
            failure: None,
            started_at: now,
            finished_at: now,
        });
    }

    #[test]
    fn test_teardown_requires_terminal_job() {
        let registry = JobRegistry::new();
        let job = job();
        registry.register(&job, None);
        registry.mark_running(job.job_id);
        assert_eq!(
            registry.begin_teardown(job.job_id).unwrap_err(),
            ProvisioningError::JobNotFinished(job.job_id)
        );
    }

    #[test]
    fn test_teardown_claimed_once() {
        let registry = JobRegistry::new();
        let job = job();
        registry.register(&job, None);
        finished(&registry, &job, &["WorkspacesStack-bob"]);

        let resources = registry.begin_teardown(job.job_id).unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(
            registry.begin_teardown(job.job_id).unwrap_err(),
            ProvisioningError::JobAlreadyTornDown(job.job_id)
        );

        // An incomplete teardown can be retried; a complete one cannot.
        registry.end_teardown(job.job_id, false);
        assert!(registry.begin_teardown(job.job_id).is_ok());
        registry.end_teardown(job.job_id, true);
        assert!(registry.status(job.job_id).unwrap().torn_down_at.is_some());
        assert_eq!(
            registry.begin_teardown(job.job_id).unwrap_err(),
            ProvisioningError::JobAlreadyTornDown(job.job_id)
        );
    }

    #[test]
    fn test_finished_jobs_beyond_retention_are_evicted() {
        let registry = JobRegistry::with_retention(2);
        let jobs: Vec<_> = (0..3).map(|_| job()).collect();
        for job in &jobs {
            registry.register(job, None);
        }
        let running = job();
        registry.register(&running, None);
        registry.mark_running(running.job_id);

        for job in &jobs {
            finished(&registry, job, &[]);
        }

        assert_eq!(registry.len(), 3);
        assert!(registry.get(jobs[0].job_id).is_none());
        assert!(registry.get(jobs[1].job_id).is_some());
        assert!(registry.get(jobs[2].job_id).is_some());
        assert_eq!(
            registry.status(running.job_id).unwrap().status,
            JobStatus::Running
        );
    }

    #[test]
    fn test_later_job_supersedes_shared_stack() {
        let registry = JobRegistry::new();
        let older = job();
        let mut newer = job();
        newer.created_at = older.created_at + chrono::Duration::seconds(1);
        registry.register(&older, None);
        registry.register(&newer, None);
        finished(&registry, &older, &["WorkspacesStack-bob"]);
        finished(&registry, &newer, &["WorkspacesStack-bob"]);

        let resources = registry.begin_teardown(older.job_id).unwrap();
        let superseded = registry.superseded_stacks(older.job_id, &resources);
        assert_eq!(superseded.len(), 1);
        assert_eq!(superseded[0].newer_job_id, newer.job_id);
        assert!(registry
            .superseded_stacks(newer.job_id, &registry.begin_teardown(newer.job_id).unwrap())
            .is_empty());
    }
}
