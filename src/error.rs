//! # Provisioning Errors
//!
//! Error taxonomy shared by every stage of the provisioning pipeline.
//!
//! Nothing here is retried automatically. A failed stage surfaces as the terminal
//! failure of its job and the next attempt is a wholly new trigger.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvisioningError {
    /// A required upstream parameter was never published.
    #[error("Dependency missing: parameter '{key}' has not been published")]
    DependencyMissing { key: String },

    /// The external lookup returned no usable value.
    #[error("Lookup failed for tenant '{tenant}': {reason}")]
    LookupFailed { tenant: String, reason: String },

    /// The job runner reported a non-zero result for a step.
    #[error("Step '{step}' failed (exit code {exit_code:?}): {reason}")]
    StepExecutionFailed {
        step: String,
        exit_code: Option<i32>,
        reason: String,
    },

    #[error("Deploy of stack '{stack}' failed: {reason}")]
    DeployFailed { stack: String, reason: String },

    #[error("Parameter store error: {0}")]
    ParameterStoreError(String),

    #[error("Invalid tenant identifier: {0}")]
    InvalidTenant(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Job cancelled before step '{step}'")]
    Cancelled { step: String },

    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    #[error("Job {0} has not finished")]
    JobNotFinished(Uuid),

    /// Teardown already ran to completion, or is running now.
    #[error("Job {0} has already been torn down")]
    JobAlreadyTornDown(Uuid),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProvisioningError {
    pub fn dependency_missing(key: impl Into<String>) -> Self {
        Self::DependencyMissing { key: key.into() }
    }

    pub fn lookup_failed(tenant: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LookupFailed {
            tenant: tenant.into(),
            reason: reason.into(),
        }
    }

    pub fn deploy_failed(stack: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DeployFailed {
            stack: stack.into(),
            reason: reason.into(),
        }
    }

    /// Stable machine-readable code, used in job status payloads.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DependencyMissing { .. } => "DEPENDENCY_MISSING",
            Self::LookupFailed { .. } => "LOOKUP_FAILED",
            Self::StepExecutionFailed { .. } => "STEP_EXECUTION_FAILED",
            Self::DeployFailed { .. } => "DEPLOY_FAILED",
            Self::ParameterStoreError(_) => "PARAMETER_STORE_ERROR",
            Self::InvalidTenant(_) => "INVALID_TENANT",
            Self::ConfigurationError(_) => "CONFIGURATION_ERROR",
            Self::Cancelled { .. } => "CANCELLED",
            Self::JobNotFound(_) => "JOB_NOT_FOUND",
            Self::JobNotFinished(_) => "JOB_NOT_FINISHED",
            Self::JobAlreadyTornDown(_) => "JOB_ALREADY_TORN_DOWN",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<serde_json::Error> for ProvisioningError {
    fn from(error: serde_json::Error) -> Self {
        ProvisioningError::Internal(format!("JSON serialization error: {error}"))
    }
}

impl From<crate::config::ConfigurationError> for ProvisioningError {
    fn from(error: crate::config::ConfigurationError) -> Self {
        ProvisioningError::ConfigurationError(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ProvisioningError>;
