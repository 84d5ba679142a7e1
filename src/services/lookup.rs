//! Desktop lookup: resolves a tenant's desktop record within a directory.

use crate::constants::ABSENT_VALUE;
use crate::error::{ProvisioningError, Result};
use crate::naming::TenantId;
use crate::provisioning::types::DirectoryId;
use crate::services::command::{shell_quote, CommandRunner};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesktopRecord {
    pub desktop_id: String,
    pub user_name: String,
    /// `None` until the desktop service has assigned an address.
    pub ip_address: Option<String>,
}

#[async_trait]
pub trait DesktopLookup: Send + Sync {
    /// `Ok(None)` when the directory has no desktop for this tenant.
    async fn describe_desktop(
        &self,
        directory_id: &DirectoryId,
        tenant: &TenantId,
    ) -> Result<Option<DesktopRecord>>;
}

/// Runs a describe command and parses `<desktop-id> <ip-address>` text output.
pub struct CommandDesktopLookup {
    runner: Arc<dyn CommandRunner>,
    command_template: String,
}

impl CommandDesktopLookup {
    pub fn new(runner: Arc<dyn CommandRunner>, command_template: impl Into<String>) -> Self {
        Self {
            runner,
            command_template: command_template.into(),
        }
    }

    pub fn render(&self, directory_id: &DirectoryId, tenant: &TenantId) -> String {
        self.command_template
            .replace("{directory_id}", &shell_quote(directory_id.as_str()))
            .replace("{user_name}", &shell_quote(tenant.as_str()))
    }

    fn parse(tenant: &TenantId, stdout: &str) -> Option<DesktopRecord> {
        let mut fields = stdout.split_whitespace();
        let desktop_id = fields.next().filter(|id| *id != ABSENT_VALUE)?;
        let ip_address = fields
            .next()
            .filter(|ip| *ip != ABSENT_VALUE)
            .map(str::to_string);
        Some(DesktopRecord {
            desktop_id: desktop_id.to_string(),
            user_name: tenant.as_str().to_string(),
            ip_address,
        })
    }
}

#[async_trait]
impl DesktopLookup for CommandDesktopLookup {
    async fn describe_desktop(
        &self,
        directory_id: &DirectoryId,
        tenant: &TenantId,
    ) -> Result<Option<DesktopRecord>> {
        let command = self.render(directory_id, tenant);
        let output = self.runner.run(&command, &BTreeMap::new()).await?;
        if !output.success() {
            return Err(ProvisioningError::lookup_failed(
                tenant.as_str(),
                format!(
                    "describe command exited with {:?}: {}",
                    output.exit_code,
                    output.stderr.trim()
                ),
            ));
        }

        let record = Self::parse(tenant, &output.stdout);
        debug!(
            directory_id = %directory_id,
            tenant = %tenant,
            found = record.is_some(),
            "Desktop lookup completed"
        );
        Ok(record)
    }
}
