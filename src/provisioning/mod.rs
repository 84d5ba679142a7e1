//! # Stage Provisioners
//!
//! One provisioner per stage of the pipeline:
//!
//! - [`directory`] - ensures the shared identity directory and publishes its id
//! - [`desktop`] - creates a tenant's virtual desktop inside that directory
//! - [`compute`] - resolves the desktop address and deploys the tenant's instances
//!
//! Each provisioner owns the creation of exactly its own stack and only reads what
//! earlier stages published (parameter store) or made discoverable (desktop lookup).

pub mod compute;
pub mod desktop;
pub mod directory;
pub mod types;

use crate::error::Result;
use crate::parameter_store::{ParameterKey, ParameterStore};
use tracing::debug;

pub use compute::ComputeProvisioner;
pub use desktop::DesktopProvisioner;
pub use directory::DirectoryProvisioner;
pub use types::{
    ComputeDeployment, DeployedResourceSet, DeployedStacks, DesktopAddress, DesktopDeployment, DesktopId,
    DirectoryDeployment, DirectoryId, InstanceRecord, Stage,
};

/// Read the shared directory id; `DependencyMissing` if it was never published.
pub async fn resolve_directory_id(store: &dyn ParameterStore) -> Result<DirectoryId> {
    let key = ParameterKey::directory_id();
    let value = store.get(&key).await?;
    debug!(key = %key, directory_id = %value, "Resolved directory id");
    Ok(DirectoryId::new(value))
}
