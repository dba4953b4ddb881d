//! Publish pipeline: validate, resolve, query, publish
//!
//! Each stage completes before the next begins. A version the registry
//! already lists ends the run successfully without running any command.

use crate::core::config::PublishConfig;
use crate::core::error::PublishError;
use crate::orchestration::package_publisher::{PackagePublisher, PublishOutcome, StepRecord};
use crate::registry::{RegistryLookup, RegistryQuery};
use crate::security::command_executor::CommandRunner;
use crate::validation::config_validator::{ConfigValidator, ValidatedConfig};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;

/// Result of a `publish` run
#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    pub package_id: String,
    pub version: String,
    pub registry_url: String,
    pub lookup: RegistryLookup,
    pub outcome: PublishOutcome,
    pub steps: Vec<StepRecord>,
    pub duration_ms: u64,
    pub finished_at: DateTime<Utc>,
}

/// Result of a `check` run
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub package_id: String,
    pub version: String,
    pub registry_url: String,
    pub lookup: RegistryLookup,
    /// Whether `publish` would run the publish sequence
    pub would_publish: bool,
    /// Whether an api key is configured for the push
    pub can_push: bool,
}

pub struct PublishPipeline<'a> {
    registry: &'a dyn RegistryQuery,
    runner: &'a dyn CommandRunner,
}

impl<'a> PublishPipeline<'a> {
    pub fn new(registry: &'a dyn RegistryQuery, runner: &'a dyn CommandRunner) -> Self {
        Self { registry, runner }
    }

    /// Run every stage, publishing when the version is not yet listed
    pub async fn run(&self, config: PublishConfig) -> Result<PublishReport, PublishError> {
        let start = Instant::now();
        let validated = ConfigValidator::validate(config)?;
        let lookup = lookup(self.registry, &validated).await?;

        let (outcome, steps) = if lookup.is_publishable() {
            let summary = PackagePublisher::new(self.runner).publish(&validated).await?;
            (summary.outcome, summary.steps)
        } else {
            tracing::info!(
                version = %validated.version(),
                "Version already published, nothing to do"
            );
            (PublishOutcome::AlreadyPublished, Vec::new())
        };

        let config = validated.config();
        Ok(PublishReport {
            package_id: config.package_id.clone(),
            version: validated.version().to_string(),
            registry_url: config.registry_url.clone(),
            lookup,
            outcome,
            steps,
            duration_ms: start.elapsed().as_millis() as u64,
            finished_at: Utc::now(),
        })
    }

    /// Validate and query the registry; needs no command runner
    pub async fn check(
        registry: &dyn RegistryQuery,
        config: PublishConfig,
    ) -> Result<CheckReport, PublishError> {
        let validated = ConfigValidator::validate(config)?;
        let lookup = lookup(registry, &validated).await?;
        let config = validated.config();

        Ok(CheckReport {
            package_id: config.package_id.clone(),
            version: validated.version().to_string(),
            registry_url: config.registry_url.clone(),
            would_publish: lookup.is_publishable(),
            can_push: config.api_key.is_some(),
            lookup,
        })
    }
}

async fn lookup(
    registry: &dyn RegistryQuery,
    validated: &ValidatedConfig,
) -> Result<RegistryLookup, PublishError> {
    let config = validated.config();
    let lookup = registry
        .lookup(&config.package_id, validated.version())
        .await?;

    match lookup {
        RegistryLookup::Exists => {}
        RegistryLookup::NotFound => {
            tracing::info!(package = %config.package_id, "Version not found in registry")
        }
        RegistryLookup::Ambiguous { ref reason } => tracing::warn!(
            reason = %reason,
            "Registry answer could not be interpreted, assuming the version is new"
        ),
    }
    Ok(lookup)
}
