use std::path::PathBuf;
use tenant_provisioner::bootstrap::ProvisioningSystem;
use tenant_provisioner::config::{
    ConfigManager, ConfigurationError, DeployerBackend, ParameterStoreBackend,
};
use tenant_provisioner::naming::NamingPolicy;
use tenant_provisioner::parameter_store::ParameterStore;

fn shipped_config_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config")
}

#[test]
fn shipped_base_and_test_overlay_load() {
    let manager = ConfigManager::load_from_directory_with_env(Some(shipped_config_dir()), "test")
        .expect("test configuration loads");
    let config = manager.config();

    assert_eq!(config.web.bind_address, "127.0.0.1:0");
    assert_eq!(config.parameter_store.backend, ParameterStoreBackend::Memory);
    assert_eq!(config.deployer.backend, DeployerBackend::InMemory);
    assert_eq!(config.naming.policy, NamingPolicy::Substitute);
    assert_eq!(config.directory.network.vpc_name, "ADVPC");
    assert_eq!(config.desktop.auto_stop_timeout_minutes, 60);
    assert_eq!(config.compute.instance_type, "t3.medium");
    assert_eq!(config.compute.managed_policies.len(), 2);
}

#[test]
fn shipped_production_overlay_requires_database_url() {
    if std::env::var("PROVISIONER__PARAMETER_STORE__DATABASE_URL").is_ok() {
        return;
    }
    let result =
        ConfigManager::load_from_directory_with_env(Some(shipped_config_dir()), "production");
    assert!(matches!(
        result,
        Err(ConfigurationError::MissingField { .. })
    ));
}

#[test]
fn environment_overlay_can_switch_naming_policy() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::copy(
        shipped_config_dir().join("provisioner.toml"),
        dir.path().join("provisioner.toml"),
    )
    .unwrap();
    std::fs::write(
        dir.path().join("staging.toml"),
        "[naming]\npolicy = \"hash_suffix\"\n\n[directory]\nreuse_existing = false\n",
    )
    .unwrap();

    let manager =
        ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "staging")
            .unwrap();

    assert_eq!(manager.environment(), "staging");
    assert_eq!(manager.config().naming.policy, NamingPolicy::HashSuffix);
    assert!(!manager.config().directory.reuse_existing);
    assert_eq!(manager.config().directory.domain_name, "example.com");
}

#[tokio::test]
async fn bootstrap_from_shipped_development_config() {
    let manager =
        ConfigManager::load_from_directory_with_env(Some(shipped_config_dir()), "development")
            .expect("development configuration loads");

    let system = ProvisioningSystem::bootstrap(manager.config().clone())
        .await
        .expect("bootstrap");

    assert_eq!(system.store.backend_name(), "memory");
    assert!(system.gateway.registry().is_empty());
}
