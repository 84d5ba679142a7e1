//! # Provisioning System Bootstrap
//!
//! Wires the configured backends (parameter store, deployer, desktop lookup, shell
//! runner) into the stage provisioners, the build orchestrator and the trigger
//! gateway. The same wiring serves the server binary and the integration tests.

use crate::config::{DeployerBackend, ProvisionerConfig};
use crate::error::Result;
use crate::gateway::TriggerGateway;
use crate::orchestration::{BuildOrchestrator, JobRegistry, StageProvisioners};
use crate::parameter_store::{build_parameter_store, ParameterStore};
use crate::provisioning::{ComputeProvisioner, DesktopProvisioner, DirectoryProvisioner};
use crate::services::{
    CommandDesktopLookup, CommandRunner, CommandStackDeployer, DesktopLookup, InMemoryCloud,
    ShellCommandRunner, StackDeployer,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Fully wired provisioning pipeline.
pub struct ProvisioningSystem {
    pub config: Arc<ProvisionerConfig>,
    pub store: Arc<dyn ParameterStore>,
    pub deployer: Arc<dyn StackDeployer>,
    pub lookup: Arc<dyn DesktopLookup>,
    pub orchestrator: Arc<BuildOrchestrator>,
    pub gateway: Arc<TriggerGateway>,
}

impl ProvisioningSystem {
    /// Build every collaborator from configuration.
    pub async fn bootstrap(config: ProvisionerConfig) -> Result<Self> {
        config.validate()?;

        let store = build_parameter_store(&config.parameter_store).await?;
        let runner: Arc<dyn CommandRunner> = Arc::new(
            ShellCommandRunner::new(config.jobs.shell.clone())
                .with_timeout(config.jobs.shell_timeout())
                .with_working_directory(config.jobs.working_directory.as_ref().map(PathBuf::from)),
        );

        let (deployer, lookup): (Arc<dyn StackDeployer>, Arc<dyn DesktopLookup>) =
            match config.deployer.backend {
                DeployerBackend::InMemory => {
                    let cloud = Arc::new(InMemoryCloud::new());
                    (cloud.clone(), cloud)
                }
                DeployerBackend::Command => (
                    Arc::new(CommandStackDeployer::new(
                        runner.clone(),
                        config.deployer.deploy_command.clone(),
                        config.deployer.destroy_command.clone(),
                        config.deployer.describe_command.clone(),
                    )
                    .with_outputs_flag(config.deployer.outputs_flag.clone())),
                    Arc::new(CommandDesktopLookup::new(
                        runner.clone(),
                        config.deployer.lookup_command.clone(),
                    )),
                ),
            };

        info!(
            parameter_store = store.backend_name(),
            deployer = ?config.deployer.backend,
            naming = ?config.naming.policy,
            "Bootstrapping provisioning system"
        );

        Ok(Self::from_parts(config, store, runner, deployer, lookup))
    }

    /// Wire the pipeline around explicit collaborators.
    pub fn from_parts(
        config: ProvisionerConfig,
        store: Arc<dyn ParameterStore>,
        runner: Arc<dyn CommandRunner>,
        deployer: Arc<dyn StackDeployer>,
        lookup: Arc<dyn DesktopLookup>,
    ) -> Self {
        let naming = config.naming.policy;
        let provisioners = StageProvisioners {
            directory: DirectoryProvisioner::new(
                deployer.clone(),
                store.clone(),
                config.directory.clone(),
            ),
            desktop: DesktopProvisioner::new(
                deployer.clone(),
                store.clone(),
                naming,
                config.desktop.clone(),
            ),
            compute: ComputeProvisioner::new(
                deployer.clone(),
                store.clone(),
                lookup.clone(),
                naming,
                config.compute.clone(),
            ),
        };

        let orchestrator = Arc::new(BuildOrchestrator::new(
            runner,
            store.clone(),
            deployer.clone(),
            provisioners,
            Arc::new(JobRegistry::with_retention(
                config.jobs.retain_finished_jobs,
            )),
        ));
        let gateway = Arc::new(TriggerGateway::new(
            orchestrator.clone(),
            naming,
            config.jobs.install_commands.clone(),
        ));

        Self {
            config: Arc::new(config),
            store,
            deployer,
            lookup,
            orchestrator,
            gateway,
        }
    }
}
