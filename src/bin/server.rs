//! # Tenant Provisioner Server
//!
//! Runs the trigger gateway as an HTTP service.
//!
//! ```bash
//! # Development profile: in-memory store and simulated cloud
//! cargo run --bin tenant-provisioner
//!
//! # Production profile from config/production.toml plus PROVISIONER__* overrides
//! PROVISIONER_ENV=production cargo run --release --bin tenant-provisioner
//! ```

use anyhow::Context;
use tenant_provisioner::bootstrap::ProvisioningSystem;
use tenant_provisioner::config::ConfigManager;
use tenant_provisioner::logging;
use tenant_provisioner::web::{create_app, state::AppState};
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_structured_logging();

    info!("Starting tenant provisioner");
    info!("   Version: {}", env!("CARGO_PKG_VERSION"));

    let config_manager = ConfigManager::load().context("failed to load configuration")?;
    info!("   Environment: {}", config_manager.environment());

    let system = ProvisioningSystem::bootstrap(config_manager.config().clone())
        .await
        .context("failed to bootstrap provisioning system")?;

    let bind_address = system.config.web.bind_address.clone();
    let app = create_app(AppState::from_system(&system));
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;

    info!("   Listening on {bind_address}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Tenant provisioner stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
