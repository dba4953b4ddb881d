//! Registry Query - has this exact version already been published?

pub mod flat_container;

pub use flat_container::{FlatContainerClient, classify};

use crate::core::error::PublishError;
use crate::validation::version_resolver::ResolvedVersion;
use async_trait::async_trait;
use serde::Serialize;

/// Result of looking up one package version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegistryLookup {
    /// The version is listed; publishing is skipped
    Exists,
    /// The id or the version is unknown to the registry
    NotFound,
    /// The registry answered but the answer could not be interpreted
    Ambiguous { reason: String },
}

impl RegistryLookup {
    /// `NotFound` and `Ambiguous` both proceed to publishing
    pub fn is_publishable(&self) -> bool {
        !matches!(self, Self::Exists)
    }
}

/// Read-only registry lookup
#[async_trait]
pub trait RegistryQuery: Send + Sync {
    async fn lookup(
        &self,
        package_id: &str,
        version: &ResolvedVersion,
    ) -> Result<RegistryLookup, PublishError>;
}
