pub mod runtime;
pub mod topology;

pub use runtime::{CommandOutput, ContainerRuntime, DockerCompose};
pub use topology::{ComposeFile, ServiceGraph};
