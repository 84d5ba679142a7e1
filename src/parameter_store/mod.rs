//! # Parameter Store
//!
//! Durable key/value store that hands values produced by one stage to a later stage.
//!
//! Keys are explicit [`ParameterKey`] values. The shared directory id lives under a
//! global key because there is exactly one directory for the whole system; anything
//! produced per tenant must be keyed with [`ParameterKey::tenant`] so concurrent jobs
//! for different tenants never share a slot.
//!
//! Writes to the same key are last-writer-wins. No locking is attempted across jobs.

pub mod memory;
pub mod postgres;

use crate::config::{ParameterStoreBackend, ParameterStoreConfig};
use crate::constants::{DIRECTORY_ID_PARAMETER, TENANT_PARAMETER_PREFIX};
use crate::error::{ProvisioningError, Result};
use crate::naming::DeploymentName;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub use memory::InMemoryParameterStore;
pub use postgres::PgParameterStore;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ParameterKey(String);

impl ParameterKey {
    /// System-wide key, normalized to a single leading `/`.
    pub fn global(name: &str) -> Self {
        Self(format!("/{}", name.trim_start_matches('/')))
    }

    /// Key scoped to one tenant: `/tenants/<deployment>/<name>`.
    pub fn tenant(deployment: &DeploymentName, name: &str) -> Self {
        Self(format!(
            "{TENANT_PARAMETER_PREFIX}/{deployment}/{}",
            name.trim_start_matches('/')
        ))
    }

    /// The shared directory id slot.
    pub fn directory_id() -> Self {
        Self::global(DIRECTORY_ID_PARAMETER)
    }

    pub fn is_tenant_scoped(&self) -> bool {
        self.0.starts_with(&format!("{TENANT_PARAMETER_PREFIX}/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParameterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterStoreError {
    #[error("Parameter not found: {key}")]
    NotFound { key: String },

    #[error("Parameter store backend error: {0}")]
    Backend(String),
}

impl From<ParameterStoreError> for ProvisioningError {
    fn from(error: ParameterStoreError) -> Self {
        match error {
            ParameterStoreError::NotFound { key } => ProvisioningError::DependencyMissing { key },
            ParameterStoreError::Backend(reason) => ProvisioningError::ParameterStoreError(reason),
        }
    }
}

impl From<sqlx::Error> for ParameterStoreError {
    fn from(error: sqlx::Error) -> Self {
        ParameterStoreError::Backend(error.to_string())
    }
}

#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// Write `value`, overwriting any previous value. Returns the new version.
    async fn put(&self, key: &ParameterKey, value: &str) -> std::result::Result<i64, ParameterStoreError>;

    async fn get(&self, key: &ParameterKey) -> std::result::Result<String, ParameterStoreError>;

    /// `get` with `NotFound` mapped to `None`.
    async fn try_get(
        &self,
        key: &ParameterKey,
    ) -> std::result::Result<Option<String>, ParameterStoreError> {
        match self.get(key).await {
            Ok(value) => Ok(Some(value)),
            Err(ParameterStoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn backend_name(&self) -> &'static str;
}

/// Build the configured store backend.
pub async fn build_parameter_store(
    config: &ParameterStoreConfig,
) -> Result<Arc<dyn ParameterStore>> {
    match config.backend {
        ParameterStoreBackend::Memory => Ok(Arc::new(InMemoryParameterStore::new())),
        ParameterStoreBackend::Postgres => {
            let url = config.database_url.as_deref().ok_or_else(|| {
                ProvisioningError::ConfigurationError(
                    "parameter_store.database_url is required for the postgres backend".to_string(),
                )
            })?;
            let store = PgParameterStore::connect(url, config.max_connections).await?;
            store.ensure_schema().await?;
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::{normalize, TenantId};

    #[test]
    fn test_global_key_normalization() {
        assert_eq!(ParameterKey::global("managedAd/id").as_str(), "/managedAd/id");
        assert_eq!(ParameterKey::global("/managedAd/id").as_str(), "/managedAd/id");
        assert_eq!(ParameterKey::directory_id().as_str(), "/managedAd/id");
        assert!(!ParameterKey::directory_id().is_tenant_scoped());
    }

    #[test]
    fn test_tenant_keys_are_disjoint() {
        let alice = normalize(&TenantId::new("alice.smith").unwrap());
        let bob = normalize(&TenantId::new("bob").unwrap());
        let alice_key = ParameterKey::tenant(&alice, "desktop/address");
        let bob_key = ParameterKey::tenant(&bob, "desktop/address");
        assert_eq!(alice_key.as_str(), "/tenants/alice-smith/desktop/address");
        assert!(alice_key.is_tenant_scoped());
        assert_ne!(alice_key, bob_key);
    }

    #[test]
    fn test_not_found_maps_to_dependency_missing() {
        let err: ProvisioningError = ParameterStoreError::NotFound {
            key: "/managedAd/id".to_string(),
        }
        .into();
        assert_eq!(err, ProvisioningError::dependency_missing("/managedAd/id"));
    }
}
