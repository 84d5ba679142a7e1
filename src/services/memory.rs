//! # In-Memory Cloud
//!
//! Simulated deploy target and desktop service kept in process memory. Backs the
//! development profile and the test suite. Deploying a desktop stack registers a
//! desktop whose address is allocated from `10.0.1.0/24`, so the compute stage can
//! resolve it through [`DesktopLookup`] exactly as it would against the real service.

use crate::constants::outputs;
use crate::error::{ProvisioningError, Result};
use crate::naming::TenantId;
use crate::provisioning::types::DirectoryId;
use crate::services::deployer::{ResourceSpec, StackDeployer, StackOutputs, StackRequest};
use crate::services::lookup::{DesktopLookup, DesktopRecord};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::Ipv4Addr;
use tracing::{debug, info};
use uuid::Uuid;

const FIRST_DESKTOP_ADDRESS: Ipv4Addr = Ipv4Addr::new(10, 0, 1, 10);
const FIRST_INSTANCE_HOST: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedStack {
    pub request: StackRequest,
    pub outputs: BTreeMap<String, String>,
    /// Incremented on every deploy of the same stack name.
    pub revision: u32,
}

#[derive(Debug, Default)]
struct CloudState {
    stacks: BTreeMap<String, DeployedStack>,
    desktops: HashMap<(String, String), DesktopRecord>,
    failing_stacks: HashSet<String>,
    destroyed: Vec<String>,
    allocated_desktops: u32,
    allocated_instances: u32,
}

impl CloudState {
    fn next_desktop_address(&mut self) -> Ipv4Addr {
        let address = Ipv4Addr::from(u32::from(FIRST_DESKTOP_ADDRESS) + self.allocated_desktops);
        self.allocated_desktops += 1;
        address
    }

    fn next_instance_dns(&mut self) -> String {
        let host = FIRST_INSTANCE_HOST + self.allocated_instances;
        self.allocated_instances += 1;
        format!("ip-10-0-2-{host}.ec2.internal")
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCloud {
    state: RwLock<CloudState>,
}

fn short_id(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &id[..10])
}

impl InMemoryCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a desktop directly, as if created outside this system.
    pub fn register_desktop(
        &self,
        directory_id: &DirectoryId,
        tenant: &TenantId,
        ip_address: Option<&str>,
    ) -> String {
        let desktop_id = short_id("ws");
        self.state.write().desktops.insert(
            (directory_id.as_str().to_string(), tenant.as_str().to_string()),
            DesktopRecord {
                desktop_id: desktop_id.clone(),
                user_name: tenant.as_str().to_string(),
                ip_address: ip_address.map(str::to_string),
            },
        );
        desktop_id
    }

    /// Make every subsequent deploy of `stack_name` fail.
    pub fn fail_deploys_of(&self, stack_name: &str) {
        self.state.write().failing_stacks.insert(stack_name.to_string());
    }

    pub fn stack(&self, stack_name: &str) -> Option<DeployedStack> {
        self.state.read().stacks.get(stack_name).cloned()
    }

    pub fn stack_names(&self) -> Vec<String> {
        self.state.read().stacks.keys().cloned().collect()
    }

    pub fn destroyed_stacks(&self) -> Vec<String> {
        self.state.read().destroyed.clone()
    }

    pub fn desktop_count(&self) -> usize {
        self.state.read().desktops.len()
    }
}

#[async_trait]
impl StackDeployer for InMemoryCloud {
    async fn deploy(&self, request: &StackRequest) -> Result<StackOutputs> {
        let mut state = self.state.write();
        if state.failing_stacks.contains(&request.stack_name) {
            return Err(ProvisioningError::deploy_failed(
                &request.stack_name,
                "simulated deploy failure",
            ));
        }

        let (mut outputs, revision) = match state.stacks.get(&request.stack_name) {
            Some(existing) => (existing.outputs.clone(), existing.revision + 1),
            None => (BTreeMap::new(), 1),
        };

        for resource in &request.resources {
            match resource {
                ResourceSpec::Network { .. } => {
                    outputs
                        .entry(outputs::VPC_ID.to_string())
                        .or_insert_with(|| short_id("vpc"));
                }
                ResourceSpec::Directory { .. } => {
                    outputs
                        .entry(outputs::DIRECTORY_ID.to_string())
                        .or_insert_with(|| short_id("d"));
                }
                ResourceSpec::Desktop {
                    directory_id,
                    user_name,
                    ..
                } => {
                    let key = (directory_id.clone(), user_name.clone());
                    let existing = state.desktops.get(&key).map(|r| r.desktop_id.clone());
                    let desktop_id = match existing {
                        Some(id) => id,
                        None => {
                            let address = state.next_desktop_address();
                            let record = DesktopRecord {
                                desktop_id: short_id("ws"),
                                user_name: user_name.clone(),
                                ip_address: Some(address.to_string()),
                            };
                            let id = record.desktop_id.clone();
                            state.desktops.insert(key, record);
                            id
                        }
                    };
                    outputs.insert(outputs::DESKTOP_ID.to_string(), desktop_id);
                }
                ResourceSpec::Instance { index, .. } => {
                    let output_key = outputs::instance_private_dns(*index);
                    if !outputs.contains_key(&output_key) {
                        let dns = state.next_instance_dns();
                        outputs.insert(output_key, dns);
                    }
                }
                ResourceSpec::Parameter { .. }
                | ResourceSpec::SecurityGroup { .. }
                | ResourceSpec::InstanceRole { .. } => {}
            }
        }

        state.stacks.insert(
            request.stack_name.clone(),
            DeployedStack {
                request: request.clone(),
                outputs: outputs.clone(),
                revision,
            },
        );

        info!(
            stack = %request.stack_name,
            stage = %request.stage,
            revision = revision,
            resources = request.resources.len(),
            "Stack deployed to in-memory cloud"
        );

        Ok(StackOutputs {
            stack_name: request.stack_name.clone(),
            outputs,
        })
    }

    async fn destroy(&self, stack_name: &str) -> Result<()> {
        let mut state = self.state.write();
        if let Some(stack) = state.stacks.remove(stack_name) {
            for resource in &stack.request.resources {
                if let ResourceSpec::Desktop {
                    directory_id,
                    user_name,
                    ..
                } = resource
                {
                    state
                        .desktops
                        .remove(&(directory_id.clone(), user_name.clone()));
                }
            }
            state.destroyed.push(stack_name.to_string());
            info!(stack = %stack_name, "Stack destroyed in in-memory cloud");
        } else {
            debug!(stack = %stack_name, "Destroy requested for unknown stack");
        }
        Ok(())
    }

    async fn stack_exists(&self, stack_name: &str) -> Result<bool> {
        Ok(self.state.read().stacks.contains_key(stack_name))
    }
}

#[async_trait]
impl DesktopLookup for InMemoryCloud {
    async fn describe_desktop(
        &self,
        directory_id: &DirectoryId,
        tenant: &TenantId,
    ) -> Result<Option<DesktopRecord>> {
        let key = (directory_id.as_str().to_string(), tenant.as_str().to_string());
        Ok(self.state.read().desktops.get(&key).cloned())
    }
}
