//! # Provisioner Configuration
//!
//! Layered configuration for the provisioning pipeline, loaded through the `config`
//! crate from `config/provisioner.toml`, an optional `config/<environment>.toml`
//! overlay and `PROVISIONER__SECTION__KEY` environment variables.
//!
//! Every section has defaults, so an empty configuration yields a development
//! setup with in-memory backends.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tenant_provisioner::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let bind = &manager.config().web.bind_address;
//! let bundle = &manager.config().desktop.bundle_id;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::DEFAULT_RETAINED_FINISHED_JOBS;
use crate::naming::NamingPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring provisioner.toml
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProvisionerConfig {
    /// Trigger gateway HTTP settings
    pub web: WebConfig,

    /// Parameter store backend
    pub parameter_store: ParameterStoreConfig,

    /// Deployment name derivation
    pub naming: NamingConfig,

    /// Deploy tool and desktop lookup adapters
    pub deployer: DeployerConfig,

    /// Build job execution
    pub jobs: JobConfig,

    /// Stage 1 static configuration
    pub directory: DirectoryConfig,

    /// Stage 2 static configuration
    pub desktop: DesktopProfile,

    /// Stage 3 static configuration
    pub compute: ComputeProfile,
}

impl ProvisionerConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.web.bind_address.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "web.bind_address",
                "cannot be empty",
            ));
        }
        if self.web.request_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "web.request_timeout_ms",
                "must be greater than zero",
            ));
        }

        if self.parameter_store.backend == ParameterStoreBackend::Postgres {
            let has_url = self
                .parameter_store
                .database_url
                .as_deref()
                .is_some_and(|url| !url.trim().is_empty());
            if !has_url {
                return Err(ConfigurationError::missing_field(
                    "database_url",
                    "parameter_store (postgres backend)",
                ));
            }
            if self.parameter_store.max_connections == 0 {
                return Err(ConfigurationError::invalid_value(
                    "parameter_store.max_connections",
                    "must be greater than zero",
                ));
            }
        }

        if self.deployer.backend == DeployerBackend::Command {
            for (field, value) in [
                ("deployer.deploy_command", &self.deployer.deploy_command),
                ("deployer.destroy_command", &self.deployer.destroy_command),
                ("deployer.describe_command", &self.deployer.describe_command),
                ("deployer.lookup_command", &self.deployer.lookup_command),
            ] {
                if value.trim().is_empty() {
                    return Err(ConfigurationError::invalid_value(field, "cannot be empty"));
                }
            }
        }

        if self.jobs.shell.trim().is_empty() {
            return Err(ConfigurationError::invalid_value("jobs.shell", "cannot be empty"));
        }
        if self.jobs.shell_timeout_seconds == Some(0) {
            return Err(ConfigurationError::invalid_value(
                "jobs.shell_timeout_seconds",
                "must be greater than zero when set",
            ));
        }
        if self.jobs.retain_finished_jobs == 0 {
            return Err(ConfigurationError::invalid_value(
                "jobs.retain_finished_jobs",
                "must be greater than zero",
            ));
        }

        let auto_stop = self.desktop.auto_stop_timeout_minutes;
        if auto_stop == 0 || auto_stop % 60 != 0 {
            return Err(ConfigurationError::invalid_value(
                "desktop.auto_stop_timeout_minutes",
                format!("must be a positive multiple of 60, got {auto_stop}"),
            ));
        }
        if self.desktop.bundle_id.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "desktop.bundle_id",
                "cannot be empty",
            ));
        }

        if self.compute.ssh_port == 0 {
            return Err(ConfigurationError::invalid_value(
                "compute.ssh_port",
                "must be non-zero",
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebConfig {
    pub bind_address: String,
    pub request_timeout_ms: u64,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_ms: 30_000,
        }
    }
}

impl WebConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterStoreBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ParameterStoreConfig {
    pub backend: ParameterStoreBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
}

impl Default for ParameterStoreConfig {
    fn default() -> Self {
        Self {
            backend: ParameterStoreBackend::Memory,
            database_url: None,
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct NamingConfig {
    pub policy: NamingPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployerBackend {
    /// Simulated cloud kept in process memory
    #[default]
    InMemory,
    /// External deploy CLI driven through the shell
    Command,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeployerConfig {
    pub backend: DeployerBackend,
    pub deploy_command: String,
    /// Flag asking the deploy tool to write stack outputs as JSON to a file.
    /// Empty disables it; outputs are then read from the last stdout line.
    pub outputs_flag: String,
    pub destroy_command: String,
    /// Exit status zero means the stack exists.
    pub describe_command: String,
    /// `{directory_id}` and `{user_name}` are substituted before running.
    pub lookup_command: String,
}

impl Default for DeployerConfig {
    fn default() -> Self {
        Self {
            backend: DeployerBackend::InMemory,
            deploy_command: "cdk deploy".to_string(),
            outputs_flag: "--outputs-file".to_string(),
            destroy_command: "cdk destroy --force".to_string(),
            describe_command: "aws cloudformation describe-stacks --stack-name".to_string(),
            lookup_command: "aws workspaces describe-workspaces --directory-id {directory_id} \
                             --user-name {user_name} \
                             --query \"Workspaces[0].[WorkspaceId,IpAddress]\" --output text"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct JobConfig {
    pub shell: String,
    /// No timeout unless set.
    pub shell_timeout_seconds: Option<u64>,
    pub working_directory: Option<String>,
    /// Install-phase commands run before every job's build steps.
    pub install_commands: Vec<String>,
    /// Finished jobs kept for status and teardown; older ones are evicted.
    pub retain_finished_jobs: usize,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            shell_timeout_seconds: None,
            working_directory: None,
            install_commands: Vec::new(),
            retain_finished_jobs: DEFAULT_RETAINED_FINISHED_JOBS,
        }
    }
}

impl JobConfig {
    pub fn shell_timeout(&self) -> Option<Duration> {
        self.shell_timeout_seconds.map(Duration::from_secs)
    }
}

/// Network shared by the directory and the compute instances
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkProfile {
    pub vpc_name: String,
    pub max_azs: u32,
    pub nat_gateways: u32,
}

impl Default for NetworkProfile {
    fn default() -> Self {
        Self {
            vpc_name: "ADVPC".to_string(),
            max_azs: 2,
            nat_gateways: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Reuse a published directory whose stack still exists instead of creating another.
    pub reuse_existing: bool,
    pub domain_name: String,
    pub edition: String,
    /// Secret name holding the admin password; the value is never inlined.
    pub admin_password_secret: String,
    pub network: NetworkProfile,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            reuse_existing: true,
            domain_name: "example.com".to_string(),
            edition: "Standard".to_string(),
            admin_password_secret: "/managedAd/adminPassword".to_string(),
            network: NetworkProfile::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DesktopProfile {
    pub bundle_id: String,
    pub running_mode: String,
    pub auto_stop_timeout_minutes: u32,
    pub root_volume_size_gib: u32,
    pub user_volume_size_gib: u32,
    pub compute_type: String,
}

impl Default for DesktopProfile {
    fn default() -> Self {
        Self {
            bundle_id: "wsb-55rrhyyg1".to_string(),
            running_mode: "AUTO_STOP".to_string(),
            auto_stop_timeout_minutes: 60,
            root_volume_size_gib: 80,
            user_volume_size_gib: 50,
            compute_type: "STANDARD".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ComputeProfile {
    pub vpc_name: String,
    pub instance_type: String,
    pub machine_image: String,
    pub subnet_type: String,
    pub ssh_port: u16,
    pub managed_policies: Vec<String>,
}

impl Default for ComputeProfile {
    fn default() -> Self {
        Self {
            vpc_name: "ADVPC".to_string(),
            instance_type: "t3.medium".to_string(),
            machine_image: "amazon-linux-2023".to_string(),
            subnet_type: "PRIVATE_WITH_EGRESS".to_string(),
            ssh_port: 22,
            managed_policies: vec![
                "AmazonSSMManagedInstanceCore".to_string(),
                "AmazonEC2ReadOnlyAccess".to_string(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ProvisionerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.parameter_store.backend, ParameterStoreBackend::Memory);
        assert_eq!(config.deployer.backend, DeployerBackend::InMemory);
        assert!(config.directory.reuse_existing);
    }

    #[test]
    fn test_postgres_backend_requires_url() {
        let mut config = ProvisionerConfig::default();
        config.parameter_store.backend = ParameterStoreBackend::Postgres;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::MissingField { .. })
        ));

        config.parameter_store.database_url = Some("postgresql://localhost/params".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_auto_stop_must_be_hour_multiple() {
        let mut config = ProvisionerConfig::default();
        config.desktop.auto_stop_timeout_minutes = 45;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_zero_shell_timeout_rejected() {
        let mut config = ProvisionerConfig::default();
        config.jobs.shell_timeout_seconds = Some(0);
        assert!(config.validate().is_err());
        config.jobs.shell_timeout_seconds = Some(600);
        assert_eq!(config.jobs.shell_timeout(), Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_zero_job_retention_rejected() {
        let mut config = ProvisionerConfig::default();
        assert_eq!(config.jobs.retain_finished_jobs, DEFAULT_RETAINED_FINISHED_JOBS);
        config.jobs.retain_finished_jobs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidValue { .. })
        ));
    }
}
