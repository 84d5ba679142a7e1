//! # Stack Deployer
//!
//! Deploy-unit abstraction consumed by the stage provisioners. A stage describes its
//! resources as a [`StackRequest`] built from static configuration; the deployer turns
//! it into real infrastructure and reports the stack outputs.

use crate::config::{ComputeProfile, DesktopProfile, NetworkProfile};
use crate::constants::STACK_MANIFEST_ENV;
use crate::error::{ProvisioningError, Result};
use crate::provisioning::types::Stage;
use crate::services::command::{shell_quote, CommandRunner};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Inbound allow-list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRule {
    pub cidr: String,
    pub protocol: String,
    pub port: u16,
    pub description: String,
}

impl AccessRule {
    /// Allow exactly one host; never broadened beyond `/32`.
    pub fn single_host(address: Ipv4Addr, port: u16, description: impl Into<String>) -> Self {
        Self {
            cidr: format!("{address}/32"),
            protocol: "tcp".to_string(),
            port,
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceSpec {
    Network {
        profile: NetworkProfile,
    },
    Directory {
        domain_name: String,
        edition: String,
        admin_password_secret: String,
        vpc_name: String,
    },
    Parameter {
        name: String,
        /// Stack output whose value is published under `name`.
        value_from_output: String,
    },
    Desktop {
        directory_id: String,
        user_name: String,
        profile: DesktopProfile,
    },
    SecurityGroup {
        name: String,
        vpc_name: String,
        allow_all_outbound: bool,
        ingress: Vec<AccessRule>,
    },
    InstanceRole {
        name: String,
        managed_policies: Vec<String>,
    },
    Instance {
        name: String,
        index: usize,
        security_group: String,
        role: String,
        profile: ComputeProfile,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackRequest {
    pub stack_name: String,
    pub stage: Stage,
    pub tags: BTreeMap<String, String>,
    /// Context values passed to the deploy tool as `-c key=value`.
    pub context: BTreeMap<String, String>,
    pub resources: Vec<ResourceSpec>,
}

impl StackRequest {
    pub fn new(stack_name: impl Into<String>, stage: Stage) -> Self {
        Self {
            stack_name: stack_name.into(),
            stage,
            tags: BTreeMap::new(),
            context: BTreeMap::new(),
            resources: Vec::new(),
        }
    }

    pub fn with_tag(mut self, key: &str, value: impl Into<String>) -> Self {
        self.tags.insert(key.to_string(), value.into());
        self
    }

    pub fn with_context(mut self, key: &str, value: impl Into<String>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }

    pub fn with_resource(mut self, resource: ResourceSpec) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn ingress_rules(&self) -> Vec<&AccessRule> {
        self.resources
            .iter()
            .filter_map(|resource| match resource {
                ResourceSpec::SecurityGroup { ingress, .. } => Some(ingress.iter()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    pub fn instance_names(&self) -> Vec<&str> {
        self.resources
            .iter()
            .filter_map(|resource| match resource {
                ResourceSpec::Instance { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackOutputs {
    pub stack_name: String,
    pub outputs: BTreeMap<String, String>,
}

impl StackOutputs {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.outputs.get(key).map(String::as_str)
    }
}

#[async_trait]
pub trait StackDeployer: Send + Sync {
    /// Create or update the stack named in `request`.
    async fn deploy(&self, request: &StackRequest) -> Result<StackOutputs>;

    async fn destroy(&self, stack_name: &str) -> Result<()>;

    async fn stack_exists(&self, stack_name: &str) -> Result<bool>;
}

/// Drives an external deploy CLI through a [`CommandRunner`].
///
/// The resource manifest travels as JSON in `STACK_MANIFEST`. Stack outputs are read
/// from the file named by the outputs flag (`cdk deploy --outputs-file <path>` writes
/// `{"<stack>": {"<output>": "<value>"}}`). Without a flag, or when the tool wrote no
/// file, the last stdout line is used if it is a flat JSON object.
pub struct CommandStackDeployer {
    runner: Arc<dyn CommandRunner>,
    deploy_command: String,
    destroy_command: String,
    describe_command: String,
    outputs_flag: Option<String>,
}

impl CommandStackDeployer {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        deploy_command: impl Into<String>,
        destroy_command: impl Into<String>,
        describe_command: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            deploy_command: deploy_command.into(),
            destroy_command: destroy_command.into(),
            describe_command: describe_command.into(),
            outputs_flag: None,
        }
    }

    /// Ask the deploy tool to write stack outputs to a file via `flag`.
    /// An empty flag keeps stdout parsing only.
    pub fn with_outputs_flag(mut self, flag: impl Into<String>) -> Self {
        let flag = flag.into();
        self.outputs_flag = (!flag.trim().is_empty()).then_some(flag);
        self
    }

    pub fn deploy_command_line(&self, request: &StackRequest, outputs_file: Option<&Path>) -> String {
        let mut line = format!(
            "{} {} --require-approval never",
            self.deploy_command,
            shell_quote(&request.stack_name)
        );
        if let (Some(flag), Some(path)) = (&self.outputs_flag, outputs_file) {
            line.push(' ');
            line.push_str(flag);
            line.push(' ');
            line.push_str(&shell_quote(&path.to_string_lossy()));
        }
        for (key, value) in &request.context {
            line.push_str(" -c ");
            line.push_str(&shell_quote(&format!("{key}={value}")));
        }
        line
    }

    fn parse_outputs(stack_name: &str, stdout_last_line: Option<&str>) -> StackOutputs {
        let outputs = stdout_last_line
            .filter(|line| line.starts_with('{'))
            .and_then(|line| serde_json::from_str::<BTreeMap<String, String>>(line).ok())
            .unwrap_or_default();
        StackOutputs {
            stack_name: stack_name.to_string(),
            outputs,
        }
    }

    /// Outputs file contents, nested under the stack name or flat.
    fn parse_outputs_file(stack_name: &str, contents: &str) -> Option<BTreeMap<String, String>> {
        let value: serde_json::Value = serde_json::from_str(contents).ok()?;
        let section = value.get(stack_name).unwrap_or(&value).as_object()?;
        Some(
            section
                .iter()
                .filter_map(|(key, value)| value.as_str().map(|v| (key.clone(), v.to_string())))
                .collect(),
        )
    }

    fn outputs_file_path(&self, stack_name: &str) -> Option<PathBuf> {
        self.outputs_flag.as_ref().map(|_| {
            std::env::temp_dir().join(format!("{stack_name}.{}.outputs.json", Uuid::new_v4()))
        })
    }

    async fn read_outputs_file(stack_name: &str, path: &Path) -> Option<BTreeMap<String, String>> {
        let contents = tokio::fs::read_to_string(path).await.ok()?;
        if let Err(e) = tokio::fs::remove_file(path).await {
            debug!(path = %path.display(), error = %e, "Could not remove outputs file");
        }
        Self::parse_outputs_file(stack_name, &contents)
    }
}

#[async_trait]
impl StackDeployer for CommandStackDeployer {
    async fn deploy(&self, request: &StackRequest) -> Result<StackOutputs> {
        let manifest = serde_json::to_string(request)?;
        let env = BTreeMap::from([(STACK_MANIFEST_ENV.to_string(), manifest)]);
        let outputs_file = self.outputs_file_path(&request.stack_name);
        let command = self.deploy_command_line(request, outputs_file.as_deref());

        info!(stack = %request.stack_name, stage = %request.stage, "Deploying stack");
        let output = self.runner.run(&command, &env).await?;
        if !output.success() {
            return Err(ProvisioningError::deploy_failed(
                &request.stack_name,
                format!("exit code {:?}: {}", output.exit_code, output.stderr.trim()),
            ));
        }

        let from_file = match &outputs_file {
            Some(path) => Self::read_outputs_file(&request.stack_name, path).await,
            None => None,
        };
        let outputs = match from_file {
            Some(outputs) => StackOutputs {
                stack_name: request.stack_name.clone(),
                outputs,
            },
            None => Self::parse_outputs(&request.stack_name, output.last_line()),
        };
        if outputs.outputs.is_empty() {
            warn!(stack = %request.stack_name, "Deploy tool reported no stack outputs");
        }
        Ok(outputs)
    }

    async fn destroy(&self, stack_name: &str) -> Result<()> {
        let command = format!("{} {}", self.destroy_command, shell_quote(stack_name));
        let output = self.runner.run(&command, &BTreeMap::new()).await?;
        if !output.success() {
            return Err(ProvisioningError::deploy_failed(
                stack_name,
                format!("destroy failed: {}", output.stderr.trim()),
            ));
        }
        info!(stack = %stack_name, "Stack destroyed");
        Ok(())
    }

    async fn stack_exists(&self, stack_name: &str) -> Result<bool> {
        let command = format!("{} {}", self.describe_command, shell_quote(stack_name));
        let output = self.runner.run(&command, &BTreeMap::new()).await?;
        debug!(stack = %stack_name, exists = output.success(), "Described stack");
        Ok(output.success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_host_rule_is_slash_32() {
        let rule = AccessRule::single_host(Ipv4Addr::new(10, 0, 1, 5), 22, "ssh");
        assert_eq!(rule.cidr, "10.0.1.5/32");
        assert_eq!(rule.port, 22);
        assert_eq!(rule.protocol, "tcp");
    }

    #[test]
    fn test_parse_outputs_from_json_line() {
        let outputs = CommandStackDeployer::parse_outputs(
            "AdtStack",
            Some(r#"{"AdtManagedAdId":"d-1234","AdtVpcId":"vpc-1"}"#),
        );
        assert_eq!(outputs.get("AdtManagedAdId"), Some("d-1234"));

        let empty = CommandStackDeployer::parse_outputs("AdtStack", Some("Deployment complete"));
        assert!(empty.outputs.is_empty());
    }

    #[test]
    fn test_parse_outputs_file_nested_under_stack() {
        let nested = r#"{"WorkspacesStack-bob":{"WorkspaceId":"ws-1","Count":3}}"#;
        let outputs =
            CommandStackDeployer::parse_outputs_file("WorkspacesStack-bob", nested).unwrap();
        assert_eq!(outputs.get("WorkspaceId").map(String::as_str), Some("ws-1"));
        assert!(!outputs.contains_key("Count"));

        let flat = CommandStackDeployer::parse_outputs_file("AdtStack", r#"{"AdtManagedAdId":"d-1"}"#)
            .unwrap();
        assert_eq!(flat.get("AdtManagedAdId").map(String::as_str), Some("d-1"));

        assert!(CommandStackDeployer::parse_outputs_file("AdtStack", "not json").is_none());
    }

    /// Writes the outputs file named on the command line, like `cdk deploy --outputs-file`.
    struct OutputsFileRunner {
        contents: String,
    }

    #[async_trait]
    impl CommandRunner for OutputsFileRunner {
        async fn run(
            &self,
            command: &str,
            _env: &BTreeMap<String, String>,
        ) -> Result<crate::services::command::CommandOutput> {
            let path = command
                .split("--outputs-file '")
                .nth(1)
                .and_then(|rest| rest.split('\'').next())
                .unwrap();
            tokio::fs::write(path, &self.contents).await.unwrap();
            Ok(crate::services::command::CommandOutput {
                exit_code: Some(0),
                stdout: "Deployment complete".to_string(),
                stderr: String::new(),
                duration: std::time::Duration::from_millis(1),
            })
        }
    }

    #[tokio::test]
    async fn test_deploy_reads_outputs_file() {
        let runner = Arc::new(OutputsFileRunner {
            contents: r#"{"AdtStack":{"AdtManagedAdId":"d-9876"}}"#.to_string(),
        });
        let deployer = CommandStackDeployer::new(runner, "cdk deploy", "cdk destroy", "describe")
            .with_outputs_flag("--outputs-file");

        let outputs = deployer
            .deploy(&StackRequest::new("AdtStack", Stage::Directory))
            .await
            .unwrap();

        assert_eq!(outputs.get("AdtManagedAdId"), Some("d-9876"));
    }

    #[test]
    fn test_command_line_without_outputs_flag() {
        let deployer = CommandStackDeployer::new(
            Arc::new(OutputsFileRunner {
                contents: String::new(),
            }),
            "cdk deploy",
            "cdk destroy",
            "describe",
        )
        .with_outputs_flag("");
        let request = StackRequest::new("AdtStack", Stage::Directory);
        let line = deployer.deploy_command_line(&request, Some(Path::new("/tmp/out.json")));
        assert_eq!(line, "cdk deploy 'AdtStack' --require-approval never");
    }

    #[test]
    fn test_manifest_serialization_tags_resources() {
        let request = StackRequest::new("AdtStack", Stage::Directory).with_resource(
            ResourceSpec::Parameter {
                name: "/managedAd/id".to_string(),
                value_from_output: "AdtManagedAdId".to_string(),
            },
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stage"], "directory");
        assert_eq!(json["resources"][0]["type"], "parameter");
    }
}
