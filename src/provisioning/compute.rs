//! # Compute Provisioner (stage 3)
//!
//! Resolves the tenant's desktop address through the desktop lookup and deploys the
//! tenant's compute stack: one security group whose only ingress rule admits exactly
//! that address, an instance role, and [`COMPUTE_INSTANCE_COUNT`] instances named
//! `<deployment-name>-Instance<i>`.
//!
//! A placeholder address (`0.0.0.0`) still deploys, but with no ingress rule at all.

use crate::config::ComputeProfile;
use crate::constants::{
    context, outputs, stacks::COMPUTE_STACK_PREFIX, variables, COMPUTE_INSTANCE_COUNT,
    INSTANCE_LABEL,
};
use crate::error::{ProvisioningError, Result};
use crate::naming::{DeploymentName, NamingPolicy, TenantId};
use crate::parameter_store::{ParameterKey, ParameterStore};
use crate::provisioning::resolve_directory_id;
use crate::provisioning::types::{
    ComputeDeployment, DeployedResourceSet, DeployedStacks, DesktopAddress, DirectoryId, InstanceRecord, Stage,
};
use crate::services::deployer::{AccessRule, ResourceSpec, StackDeployer, StackRequest};
use crate::services::lookup::DesktopLookup;
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub struct ComputeProvisioner {
    deployer: Arc<dyn StackDeployer>,
    store: Arc<dyn ParameterStore>,
    lookup: Arc<dyn DesktopLookup>,
    naming: NamingPolicy,
    profile: ComputeProfile,
}

impl ComputeProvisioner {
    pub fn new(
        deployer: Arc<dyn StackDeployer>,
        store: Arc<dyn ParameterStore>,
        lookup: Arc<dyn DesktopLookup>,
        naming: NamingPolicy,
        profile: ComputeProfile,
    ) -> Self {
        Self {
            deployer,
            store,
            lookup,
            naming,
            profile,
        }
    }

    pub fn stack_name(&self, tenant: &TenantId) -> String {
        self.naming.apply(tenant).stack_name(COMPUTE_STACK_PREFIX)
    }

    /// Directory id, then desktop address, then deploy. Each step must succeed
    /// before the next one runs.
    #[instrument(skip(self), fields(tenant = %tenant))]
    pub async fn provision_compute(&self, tenant: &TenantId) -> Result<ComputeDeployment> {
        let directory_id = resolve_directory_id(self.store.as_ref()).await?;
        let address = self.resolve_desktop_address(&directory_id, tenant).await?;
        self.deploy(tenant, &address).await
    }

    /// Look up the desktop address for `(directory_id, tenant)`.
    ///
    /// No desktop, or a desktop whose address is still unassigned or malformed, is
    /// `LookupFailed`. The resolved value is also recorded under the tenant's own
    /// parameter namespace.
    pub async fn resolve_desktop_address(
        &self,
        directory_id: &DirectoryId,
        tenant: &TenantId,
    ) -> Result<DesktopAddress> {
        let record = self
            .lookup
            .describe_desktop(directory_id, tenant)
            .await?
            .ok_or_else(|| {
                ProvisioningError::lookup_failed(
                    tenant.as_str(),
                    format!("no desktop found in directory {directory_id}"),
                )
            })?;

        let raw = record.ip_address.as_deref().unwrap_or_default();
        let address = DesktopAddress::parse(raw)
            .map_err(|reason| ProvisioningError::lookup_failed(tenant.as_str(), reason))?;

        let key = ParameterKey::tenant(&self.naming.apply(tenant), variables::DESKTOP_ADDRESS);
        self.store.put(&key, &address.to_string()).await?;

        info!(
            desktop_id = %record.desktop_id,
            address = %address,
            parameter = %key,
            "Resolved desktop address"
        );
        Ok(address)
    }

    pub async fn deploy(
        &self,
        tenant: &TenantId,
        address: &DesktopAddress,
    ) -> Result<ComputeDeployment> {
        self.deploy_tracked(tenant, address, &mut DeployedStacks::new())
            .await
    }

    /// Like [`Self::deploy`], recording the stack in `deployed` as soon as its deploy
    /// succeeds.
    #[instrument(skip(self, deployed), fields(tenant = %tenant, address = %address))]
    pub async fn deploy_tracked(
        &self,
        tenant: &TenantId,
        address: &DesktopAddress,
        deployed: &mut DeployedStacks,
    ) -> Result<ComputeDeployment> {
        let deployment_name = self.naming.apply(tenant);
        let access_rule = self.access_rule(address);
        if access_rule.is_none() {
            warn!(
                deployment_name = %deployment_name,
                "Desktop address is a placeholder; deploying without an ingress rule"
            );
        }

        let request = self.build_request(tenant, &deployment_name, address, access_rule.clone());
        let stack_outputs = self.deployer.deploy(&request).await?;
        deployed.record(&request.stack_name);

        let instances = (1..=COMPUTE_INSTANCE_COUNT)
            .map(|index| InstanceRecord {
                name: deployment_name.indexed(INSTANCE_LABEL, index),
                private_dns_name: stack_outputs
                    .get(&outputs::instance_private_dns(index))
                    .map(str::to_string),
            })
            .collect::<Vec<_>>();

        info!(
            stack = %request.stack_name,
            instances = instances.len(),
            ingress = access_rule.as_ref().map(|r| r.cidr.as_str()).unwrap_or("none"),
            "Compute provisioned"
        );

        Ok(ComputeDeployment {
            desktop_address: *address,
            access_rule,
            instances,
            resources: DeployedResourceSet {
                stage: Stage::Compute,
                stack_name: request.stack_name,
                deployment_name: Some(deployment_name),
                outputs: stack_outputs.outputs,
            },
        })
    }

    pub fn stack_request(&self, tenant: &TenantId, address: &DesktopAddress) -> StackRequest {
        let deployment_name = self.naming.apply(tenant);
        self.build_request(tenant, &deployment_name, address, self.access_rule(address))
    }

    fn access_rule(&self, address: &DesktopAddress) -> Option<AccessRule> {
        address.resolved().map(|ip| {
            AccessRule::single_host(ip, self.profile.ssh_port, "SSH from the tenant desktop")
        })
    }

    fn build_request(
        &self,
        tenant: &TenantId,
        deployment_name: &DeploymentName,
        address: &DesktopAddress,
        access_rule: Option<AccessRule>,
    ) -> StackRequest {
        let security_group = format!("{deployment_name}-SecurityGroup");
        let role = format!("{deployment_name}-InstanceRole");

        let mut request = StackRequest::new(
            deployment_name.stack_name(COMPUTE_STACK_PREFIX),
            Stage::Compute,
        )
        .with_tag("Name", deployment_name.as_str())
        .with_context(context::USER_NAME, tenant.as_str())
        .with_context(context::DESKTOP_ADDRESS, address.to_string())
        .with_resource(ResourceSpec::SecurityGroup {
            name: security_group.clone(),
            vpc_name: self.profile.vpc_name.clone(),
            allow_all_outbound: true,
            ingress: access_rule.into_iter().collect(),
        })
        .with_resource(ResourceSpec::InstanceRole {
            name: role.clone(),
            managed_policies: self.profile.managed_policies.clone(),
        });

        for index in 1..=COMPUTE_INSTANCE_COUNT {
            request = request.with_resource(ResourceSpec::Instance {
                name: deployment_name.indexed(INSTANCE_LABEL, index),
                index,
                security_group: security_group.clone(),
                role: role.clone(),
                profile: self.profile.clone(),
            });
        }
        request
    }
}
