//! # Directory Provisioner (stage 1)
//!
//! Ensures the single shared identity directory exists and publishes its id under
//! `/managedAd/id`. No tenant input.
//!
//! With `reuse_existing` enabled (the default) a re-run is a no-op when the id is
//! already published and the directory stack still exists. With it disabled the stack
//! is deployed unconditionally, which may create a second directory when the
//! underlying service does not dedupe by name.

use crate::config::DirectoryConfig;
use crate::constants::{outputs, stacks::DIRECTORY_STACK, DIRECTORY_ID_PARAMETER};
use crate::error::{ProvisioningError, Result};
use crate::parameter_store::{ParameterKey, ParameterStore};
use crate::provisioning::types::{
    DeployedResourceSet, DeployedStacks, DirectoryDeployment, DirectoryId, Stage,
};
use crate::services::deployer::{ResourceSpec, StackDeployer, StackRequest};
use std::sync::Arc;
use tracing::{info, instrument};

pub struct DirectoryProvisioner {
    deployer: Arc<dyn StackDeployer>,
    store: Arc<dyn ParameterStore>,
    config: DirectoryConfig,
}

impl DirectoryProvisioner {
    pub fn new(
        deployer: Arc<dyn StackDeployer>,
        store: Arc<dyn ParameterStore>,
        config: DirectoryConfig,
    ) -> Self {
        Self {
            deployer,
            store,
            config,
        }
    }

    pub fn stack_name(&self) -> &'static str {
        DIRECTORY_STACK
    }

    /// Ensure the directory and return its id.
    pub async fn provision_directory(&self) -> Result<DirectoryId> {
        Ok(self.ensure_directory().await?.directory_id)
    }

    pub async fn ensure_directory(&self) -> Result<DirectoryDeployment> {
        self.ensure_directory_tracked(&mut DeployedStacks::new()).await
    }

    /// Like [`Self::ensure_directory`], recording the stack in `deployed` as soon as
    /// its deploy succeeds. A reused directory records nothing.
    #[instrument(skip_all, fields(stack = DIRECTORY_STACK))]
    pub async fn ensure_directory_tracked(
        &self,
        deployed: &mut DeployedStacks,
    ) -> Result<DirectoryDeployment> {
        if self.config.reuse_existing {
            if let Some(directory_id) = self.existing_directory().await? {
                info!(directory_id = %directory_id, "Reusing published directory");
                return Ok(DirectoryDeployment {
                    directory_id,
                    created: false,
                    resources: None,
                });
            }
        }

        let request = self.stack_request();
        let stack_outputs = self.deployer.deploy(&request).await?;
        deployed.record(DIRECTORY_STACK);

        let directory_id = stack_outputs
            .get(outputs::DIRECTORY_ID)
            .map(DirectoryId::new)
            .ok_or_else(|| {
                ProvisioningError::deploy_failed(
                    DIRECTORY_STACK,
                    format!("stack did not report output '{}'", outputs::DIRECTORY_ID),
                )
            })?;

        let version = self
            .store
            .put(&ParameterKey::directory_id(), directory_id.as_str())
            .await?;

        info!(
            directory_id = %directory_id,
            parameter = DIRECTORY_ID_PARAMETER,
            version = version,
            "Directory provisioned and published"
        );

        Ok(DirectoryDeployment {
            directory_id,
            created: true,
            resources: Some(DeployedResourceSet {
                stage: Stage::Directory,
                stack_name: DIRECTORY_STACK.to_string(),
                deployment_name: None,
                outputs: stack_outputs.outputs,
            }),
        })
    }

    async fn existing_directory(&self) -> Result<Option<DirectoryId>> {
        let Some(published) = self.store.try_get(&ParameterKey::directory_id()).await? else {
            return Ok(None);
        };
        if self.deployer.stack_exists(DIRECTORY_STACK).await? {
            Ok(Some(DirectoryId::new(published)))
        } else {
            Ok(None)
        }
    }

    pub fn stack_request(&self) -> StackRequest {
        let network = self.config.network.clone();
        let vpc_name = network.vpc_name.clone();
        StackRequest::new(DIRECTORY_STACK, Stage::Directory)
            .with_tag("Name", vpc_name.clone())
            .with_resource(ResourceSpec::Network { profile: network })
            .with_resource(ResourceSpec::Directory {
                domain_name: self.config.domain_name.clone(),
                edition: self.config.edition.clone(),
                admin_password_secret: self.config.admin_password_secret.clone(),
                vpc_name,
            })
            .with_resource(ResourceSpec::Parameter {
                name: DIRECTORY_ID_PARAMETER.to_string(),
                value_from_output: outputs::DIRECTORY_ID.to_string(),
            })
    }
}
