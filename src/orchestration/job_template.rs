//! # Job Templates
//!
//! The fixed step script behind each stage. A template has an install phase (the
//! configured toolchain commands, run as plain shell steps) followed by the stage's
//! build phase. Instantiating it for a tenant injects `USER_NAME`, `DEPLOYMENT_NAME`
//! and `JOB_ID` as job parameters.

use crate::constants::variables;
use crate::error::{ProvisioningError, Result};
use crate::naming::{NamingPolicy, TenantId};
use crate::orchestration::types::{BuildStep, ProvisioningJob};
use crate::parameter_store::ParameterKey;
use crate::provisioning::types::Stage;
use chrono::Utc;
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTemplate {
    pub stage: Stage,
    pub install: Vec<String>,
    pub build: Vec<BuildStep>,
}

impl JobTemplate {
    pub fn directory() -> Self {
        Self {
            stage: Stage::Directory,
            install: Vec::new(),
            build: vec![BuildStep::deploy("deploy-directory", Stage::Directory)],
        }
    }

    pub fn desktop() -> Self {
        Self {
            stage: Stage::Desktop,
            install: Vec::new(),
            build: vec![
                BuildStep::shell("echo-tenant", format!("echo \"${}\"", variables::TENANT)),
                BuildStep::resolve(
                    "resolve-directory-id",
                    ParameterKey::directory_id(),
                    variables::DIRECTORY_ID,
                ),
                BuildStep::deploy("deploy-desktop", Stage::Desktop),
            ],
        }
    }

    pub fn compute() -> Self {
        Self {
            stage: Stage::Compute,
            install: Vec::new(),
            build: vec![
                BuildStep::resolve(
                    "resolve-directory-id",
                    ParameterKey::directory_id(),
                    variables::DIRECTORY_ID,
                ),
                BuildStep::lookup(
                    "lookup-desktop-address",
                    variables::DIRECTORY_ID,
                    variables::DESKTOP_ADDRESS,
                ),
                BuildStep::deploy("deploy-compute", Stage::Compute),
            ],
        }
    }

    pub fn for_stage(stage: Stage) -> Self {
        match stage {
            Stage::Directory => Self::directory(),
            Stage::Desktop => Self::desktop(),
            Stage::Compute => Self::compute(),
        }
    }

    pub fn with_install_commands(mut self, commands: &[String]) -> Self {
        self.install = commands.to_vec();
        self
    }

    /// Build a job from this template. Tenant stages reject a missing tenant.
    pub fn instantiate(
        &self,
        tenant: Option<TenantId>,
        naming: NamingPolicy,
    ) -> Result<ProvisioningJob> {
        if self.stage.requires_tenant() && tenant.is_none() {
            return Err(ProvisioningError::InvalidTenant(format!(
                "the {} stage requires a tenant identifier",
                self.stage
            )));
        }

        let job_id = Uuid::new_v4();
        let deployment_name = tenant.as_ref().map(|t| naming.apply(t));

        let mut parameters = BTreeMap::new();
        parameters.insert(variables::JOB_ID.to_string(), job_id.to_string());
        if let (Some(tenant), Some(name)) = (&tenant, &deployment_name) {
            parameters.insert(variables::TENANT.to_string(), tenant.as_str().to_string());
            parameters.insert(variables::DEPLOYMENT_NAME.to_string(), name.as_str().to_string());
        }

        let steps = self
            .install
            .iter()
            .enumerate()
            .map(|(i, command)| BuildStep::shell(format!("install-{}", i + 1), command.clone()))
            .chain(self.build.iter().cloned())
            .collect();

        Ok(ProvisioningJob {
            job_id,
            stage: self.stage,
            tenant,
            deployment_name,
            parameters,
            steps,
            created_at: Utc::now(),
        })
    }
}
