#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

//! # Tenant Provisioner
//!
//! Provisions per-tenant environments (a shared identity directory, one virtual
//! desktop per tenant and a pair of compute instances reachable only from that
//! desktop) through an HTTP-triggered, three-stage build pipeline.
//!
//! ## Pipeline
//!
//! 1. **Directory** - ensure the shared directory, publish its id under `/managedAd/id`
//! 2. **Desktop** - read the directory id, create the tenant's desktop
//! 3. **Compute** - read the directory id, look up the desktop address, deploy the
//!    instances with an ingress rule scoped to exactly that address
//!
//! Each stage runs as a [`orchestration::ProvisioningJob`]: an ordered list of steps
//! executed fail-fast by the [`orchestration::BuildOrchestrator`]. The
//! [`gateway::TriggerGateway`] accepts triggers and returns awaitable job handles.
//!
//! ## Module Organization
//!
//! - [`naming`] - tenant id to deployment name, with explicit collision policies
//! - [`parameter_store`] - key/value hand-off between stages (memory, Postgres)
//! - [`provisioning`] - the three stage provisioners
//! - [`services`] - shell runner, stack deployer and desktop lookup adapters
//! - [`orchestration`] - job templates, orchestrator, job registry
//! - [`gateway`] - trigger entry point and job handles
//! - [`web`] - axum routes over the gateway
//! - [`config`] - layered configuration
//! - [`logging`] - structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tenant_provisioner::bootstrap::ProvisioningSystem;
//! use tenant_provisioner::config::ProvisionerConfig;
//! use tenant_provisioner::gateway::TriggerRequest;
//! use tenant_provisioner::provisioning::Stage;
//!
//! # tokio_test::block_on(async {
//! let system = ProvisioningSystem::bootstrap(ProvisionerConfig::default()).await.unwrap();
//! system
//!     .gateway
//!     .trigger(Stage::Directory, TriggerRequest::default())
//!     .unwrap()
//!     .wait()
//!     .await
//!     .unwrap();
//!
//! let handle = system
//!     .gateway
//!     .trigger(Stage::Desktop, TriggerRequest::for_tenant("alice.smith"))
//!     .unwrap();
//! let outcome = handle.wait().await.unwrap();
//! assert!(outcome.is_success());
//! # });
//! ```

pub mod bootstrap;
pub mod config;
pub mod constants;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod naming;
pub mod orchestration;
pub mod parameter_store;
pub mod provisioning;
pub mod services;
pub mod web;

pub use error::{ProvisioningError, Result};
pub use naming::{DeploymentName, NamingPolicy, TenantId};
