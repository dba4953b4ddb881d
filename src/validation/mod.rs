pub mod config_validator;
pub mod version_resolver;

pub use config_validator::{ConfigValidator, ValidatedConfig};
pub use version_resolver::{ResolvedVersion, VersionResolver};
