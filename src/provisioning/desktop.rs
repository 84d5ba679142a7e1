//! # Desktop Provisioner (stage 2)
//!
//! Creates one virtual desktop per tenant inside the shared directory. Nothing is
//! written back to the parameter store; the desktop's address becomes discoverable
//! later through the desktop lookup keyed by (directory id, tenant).

use crate::config::DesktopProfile;
use crate::constants::{context, outputs, stacks::DESKTOP_STACK_PREFIX};
use crate::error::{ProvisioningError, Result};
use crate::naming::{NamingPolicy, TenantId};
use crate::parameter_store::ParameterStore;
use crate::provisioning::resolve_directory_id;
use crate::provisioning::types::{
    DeployedResourceSet, DeployedStacks, DesktopDeployment, DesktopId, DirectoryId, Stage,
};
use crate::services::deployer::{ResourceSpec, StackDeployer, StackRequest};
use std::sync::Arc;
use tracing::{info, instrument};

pub struct DesktopProvisioner {
    deployer: Arc<dyn StackDeployer>,
    store: Arc<dyn ParameterStore>,
    naming: NamingPolicy,
    profile: DesktopProfile,
}

impl DesktopProvisioner {
    pub fn new(
        deployer: Arc<dyn StackDeployer>,
        store: Arc<dyn ParameterStore>,
        naming: NamingPolicy,
        profile: DesktopProfile,
    ) -> Self {
        Self {
            deployer,
            store,
            naming,
            profile,
        }
    }

    pub fn stack_name(&self, tenant: &TenantId) -> String {
        self.naming.apply(tenant).stack_name(DESKTOP_STACK_PREFIX)
    }

    /// Resolve the published directory id, then provision.
    pub async fn provision_desktop_from_store(&self, tenant: &TenantId) -> Result<DesktopDeployment> {
        let directory_id = resolve_directory_id(self.store.as_ref()).await?;
        self.provision_desktop(tenant, &directory_id).await
    }

    pub async fn provision_desktop(
        &self,
        tenant: &TenantId,
        directory_id: &DirectoryId,
    ) -> Result<DesktopDeployment> {
        self.provision_desktop_tracked(tenant, directory_id, &mut DeployedStacks::new())
            .await
    }

    /// Like [`Self::provision_desktop`], recording the stack in `deployed` as soon as
    /// its deploy succeeds.
    #[instrument(skip(self, deployed), fields(tenant = %tenant, directory_id = %directory_id))]
    pub async fn provision_desktop_tracked(
        &self,
        tenant: &TenantId,
        directory_id: &DirectoryId,
        deployed: &mut DeployedStacks,
    ) -> Result<DesktopDeployment> {
        let deployment_name = self.naming.apply(tenant);
        let request = self.stack_request(tenant, directory_id);
        let stack_outputs = self.deployer.deploy(&request).await?;
        deployed.record(&request.stack_name);

        let desktop_id = stack_outputs
            .get(outputs::DESKTOP_ID)
            .map(DesktopId::new)
            .ok_or_else(|| {
                ProvisioningError::deploy_failed(
                    &request.stack_name,
                    format!("stack did not report output '{}'", outputs::DESKTOP_ID),
                )
            })?;

        info!(
            desktop_id = %desktop_id,
            deployment_name = %deployment_name,
            stack = %request.stack_name,
            "Desktop provisioned"
        );

        Ok(DesktopDeployment {
            desktop_id,
            directory_id: directory_id.clone(),
            resources: DeployedResourceSet {
                stage: Stage::Desktop,
                stack_name: request.stack_name,
                deployment_name: Some(deployment_name),
                outputs: stack_outputs.outputs,
            },
        })
    }

    pub fn stack_request(&self, tenant: &TenantId, directory_id: &DirectoryId) -> StackRequest {
        let deployment_name = self.naming.apply(tenant);
        StackRequest::new(deployment_name.stack_name(DESKTOP_STACK_PREFIX), Stage::Desktop)
            .with_tag("Name", deployment_name.as_str())
            .with_context(context::USER_NAME, tenant.as_str())
            .with_context(context::DIRECTORY_ID, directory_id.as_str())
            .with_resource(ResourceSpec::Desktop {
                directory_id: directory_id.as_str().to_string(),
                user_name: tenant.as_str().to_string(),
                profile: self.profile.clone(),
            })
    }
}
