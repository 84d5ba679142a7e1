//! Domain types shared by the stage provisioners.

use crate::constants::{ABSENT_VALUE, PLACEHOLDER_ADDRESS};
use crate::naming::DeploymentName;
use crate::services::deployer::AccessRule;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;

/// One ordered phase of the provisioning pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Directory,
    Desktop,
    Compute,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Directory => "directory",
            Stage::Desktop => "desktop",
            Stage::Compute => "compute",
        }
    }

    /// The directory is shared; every later stage is per tenant.
    pub fn requires_tenant(&self) -> bool {
        !matches!(self, Stage::Directory)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirectoryId(String);

impl DirectoryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DirectoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DesktopId(String);

impl DesktopId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DesktopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Network address of a tenant's desktop, as used by the compute stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "address", rename_all = "snake_case")]
pub enum DesktopAddress {
    Resolved(Ipv4Addr),
    /// Known-unset address; the compute stack is deployed without an ingress rule.
    Placeholder,
}

impl DesktopAddress {
    /// Parse a raw address. Empty and `None` are unresolved and yield `Err`;
    /// the unspecified address `0.0.0.0` is the placeholder.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == ABSENT_VALUE {
            return Err("desktop address is unresolved".to_string());
        }
        let address: Ipv4Addr = trimmed
            .parse()
            .map_err(|_| format!("'{trimmed}' is not an IPv4 address"))?;
        if address.is_unspecified() {
            Ok(DesktopAddress::Placeholder)
        } else {
            Ok(DesktopAddress::Resolved(address))
        }
    }

    pub fn resolved(&self) -> Option<Ipv4Addr> {
        match self {
            DesktopAddress::Resolved(address) => Some(*address),
            DesktopAddress::Placeholder => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, DesktopAddress::Placeholder)
    }
}

impl fmt::Display for DesktopAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DesktopAddress::Resolved(address) => write!(f, "{address}"),
            DesktopAddress::Placeholder => f.write_str(PLACEHOLDER_ADDRESS),
        }
    }
}

/// Stacks a provisioning call has deployed, in order.
///
/// A stack is recorded the moment its deploy returns, before outputs are checked or
/// published, so a later failure in the same call still leaves a teardown record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployedStacks(Vec<String>);

impl DeployedStacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stack_name: impl Into<String>) {
        self.0.push(stack_name.into());
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Resources created by one stage deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedResourceSet {
    pub stage: Stage,
    pub stack_name: String,
    pub deployment_name: Option<DeploymentName>,
    pub outputs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryDeployment {
    pub directory_id: DirectoryId,
    /// `false` when an existing directory was reused.
    pub created: bool,
    pub resources: Option<DeployedResourceSet>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesktopDeployment {
    pub desktop_id: DesktopId,
    pub directory_id: DirectoryId,
    pub resources: DeployedResourceSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub name: String,
    pub private_dns_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeDeployment {
    pub desktop_address: DesktopAddress,
    /// `None` when the desktop address was a placeholder.
    pub access_rule: Option<AccessRule>,
    pub instances: Vec<InstanceRecord>,
    pub resources: DeployedResourceSet,
}

impl ComputeDeployment {
    pub fn instance_names(&self) -> Vec<&str> {
        self.instances.iter().map(|i| i.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolved_address() {
        assert_eq!(
            DesktopAddress::parse(" 10.0.1.5\n"),
            Ok(DesktopAddress::Resolved(Ipv4Addr::new(10, 0, 1, 5)))
        );
    }

    #[test]
    fn test_parse_placeholder_address() {
        let address = DesktopAddress::parse("0.0.0.0").unwrap();
        assert!(address.is_placeholder());
        assert_eq!(address.resolved(), None);
        assert_eq!(address.to_string(), "0.0.0.0");
    }

    #[test]
    fn test_parse_unresolved_address() {
        assert!(DesktopAddress::parse("").is_err());
        assert!(DesktopAddress::parse("None").is_err());
        assert!(DesktopAddress::parse("10.0.1.0/24").is_err());
    }

    #[test]
    fn test_stage_tenant_requirement() {
        assert!(!Stage::Directory.requires_tenant());
        assert!(Stage::Desktop.requires_tenant());
        assert!(Stage::Compute.requires_tenant());
    }
}
