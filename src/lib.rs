pub mod core;
pub mod orchestration;
pub mod registry;
pub mod security;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::core::*;
pub use orchestration::{CheckReport, PackagePublisher, PublishOutcome, PublishPipeline, PublishReport};
pub use registry::{FlatContainerClient, RegistryLookup, RegistryQuery};
pub use security::{CommandError, CommandOutput, CommandRunner, SafeCommandExecutor, SecretMasker};
pub use validation::{ConfigValidator, ResolvedVersion, ValidatedConfig, VersionResolver};
