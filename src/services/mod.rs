//! External collaborators: shell execution, stack deployment and desktop lookup.

pub mod command;
pub mod deployer;
pub mod lookup;
pub mod memory;

pub use command::{CommandOutput, CommandRunner, ShellCommandRunner};
pub use deployer::{
    AccessRule, CommandStackDeployer, ResourceSpec, StackDeployer, StackOutputs, StackRequest,
};
pub use lookup::{CommandDesktopLookup, DesktopLookup, DesktopRecord};
pub use memory::{DeployedStack, InMemoryCloud};
