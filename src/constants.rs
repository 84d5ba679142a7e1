//! # System Constants
//!
//! Fixed names shared by the stages of the provisioning pipeline: parameter keys,
//! stack names, job variables and stack outputs.

/// Parameter store slot holding the shared directory identifier.
pub const DIRECTORY_ID_PARAMETER: &str = "/managedAd/id";

/// Prefix for tenant-scoped parameter keys.
pub const TENANT_PARAMETER_PREFIX: &str = "/tenants";

/// Deploy unit names for each stage
pub mod stacks {
    pub const DIRECTORY_STACK: &str = "AdtStack";
    pub const DESKTOP_STACK_PREFIX: &str = "WorkspacesStack";
    pub const COMPUTE_STACK_PREFIX: &str = "Ec2Stack";
}

/// Variables available to build steps while a job runs
pub mod variables {
    /// Injected by the trigger gateway from the request body.
    pub const TENANT: &str = "USER_NAME";
    pub const DIRECTORY_ID: &str = "managedAdId";
    pub const DESKTOP_ADDRESS: &str = "workspaceIp";
    pub const DEPLOYMENT_NAME: &str = "DEPLOYMENT_NAME";
    pub const JOB_ID: &str = "JOB_ID";
}

/// Context keys handed to the deploy tool
pub mod context {
    pub const USER_NAME: &str = "userName";
    pub const DIRECTORY_ID: &str = "managedAdId";
    pub const DESKTOP_ADDRESS: &str = "workspaceIp";
}

/// Stack output names
pub mod outputs {
    pub const VPC_ID: &str = "AdtVpcId";
    pub const DIRECTORY_ID: &str = "AdtManagedAdId";
    pub const DESKTOP_ID: &str = "WorkspaceId";

    pub fn instance_private_dns(index: usize) -> String {
        format!("EC2Instance{index}PrivateDnsName")
    }
}

/// Label used in per-instance names: `<deployment>-Instance<n>`.
pub const INSTANCE_LABEL: &str = "Instance";

/// Number of compute instances deployed per tenant.
pub const COMPUTE_INSTANCE_COUNT: usize = 2;

/// Address used when a desktop has no resolved address yet.
pub const PLACEHOLDER_ADDRESS: &str = "0.0.0.0";

/// Text emitted by describe tooling for an absent value.
pub const ABSENT_VALUE: &str = "None";

/// Name of the environment variable carrying the JSON stack manifest.
pub const STACK_MANIFEST_ENV: &str = "STACK_MANIFEST";

/// Finished jobs kept in the job registry before the oldest are evicted.
pub const DEFAULT_RETAINED_FINISHED_JOBS: usize = 1000;
