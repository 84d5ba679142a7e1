//! # Web API Application State

use crate::bootstrap::ProvisioningSystem;
use crate::config::ProvisionerConfig;
use crate::gateway::TriggerGateway;
use crate::parameter_store::ParameterStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProvisionerConfig>,
    pub gateway: Arc<TriggerGateway>,
    pub store: Arc<dyn ParameterStore>,
}

impl AppState {
    pub fn from_system(system: &ProvisioningSystem) -> Self {
        Self {
            config: system.config.clone(),
            gateway: system.gateway.clone(),
            store: system.store.clone(),
        }
    }
}
