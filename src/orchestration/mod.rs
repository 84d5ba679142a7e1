//! # Orchestration Engine
//!
//! Turns a triggered stage into a parameterized build job and runs it.
//!
//! ## Core Components
//!
//! - **JobTemplate**: the fixed step script of each stage (install phase, then build phase)
//! - **BuildOrchestrator**: sequential, fail-fast execution of a job's steps
//! - **JobRegistry**: status of every accepted job, cancel handles, created stacks
//!
//! Jobs for different tenants run as independent tasks with no coordination between
//! them. Within a job, each step sees the side effects of the steps before it.

pub mod job_template;
pub mod orchestrator;
pub mod registry;
pub mod types;

pub use job_template::JobTemplate;
pub use orchestrator::{BuildOrchestrator, StageProvisioners};
pub use registry::{JobRegistry, JobView};
pub use types::{
    BuildStep, CreatedResource, JobEnvironment, JobFailure, JobOutcome, JobStatus,
    ProvisioningJob, StageDeployment, StepKind, StepRecord, SupersededStack, TeardownFailure,
    TeardownReport,
};
