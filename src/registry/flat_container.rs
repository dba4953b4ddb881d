//! NuGet v3 flat container lookup
//!
//! `GET {base}/v3-flatcontainer/{id}/index.json` lists every published
//! version of a package id. The id is lower-cased in the URL; the version
//! is compared verbatim against each listed entry.

use crate::core::error::PublishError;
use crate::registry::{RegistryLookup, RegistryQuery};
use crate::validation::version_resolver::ResolvedVersion;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct FlatContainerIndex {
    versions: Vec<String>,
}

/// Classify a flat-container response for `version`
pub fn classify(status: u16, body: &str, version: &str) -> RegistryLookup {
    match StatusCode::from_u16(status) {
        Ok(StatusCode::NOT_FOUND) => RegistryLookup::NotFound,
        Ok(StatusCode::OK) => match serde_json::from_str::<FlatContainerIndex>(body) {
            Ok(index) if index.versions.iter().any(|v| v == version) => RegistryLookup::Exists,
            Ok(_) => RegistryLookup::NotFound,
            Err(e) => RegistryLookup::Ambiguous {
                reason: format!("unreadable version index: {}", e),
            },
        },
        _ => RegistryLookup::Ambiguous {
            reason: format!("unexpected HTTP status {}", status),
        },
    }
}

/// Registry client for the NuGet v3 flat container resource
#[derive(Debug, Clone)]
pub struct FlatContainerClient {
    base_url: String,
    http: Client,
}

impl FlatContainerClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PublishError> {
        let http = Client::builder()
            .user_agent(format!("nuget-publisher/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| PublishError::NetworkError {
                url: base_url.to_string(),
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Version index URL for `package_id`
    pub fn index_url(&self, package_id: &str) -> String {
        format!(
            "{}/v3-flatcontainer/{}/index.json",
            self.base_url,
            package_id.to_lowercase()
        )
    }
}

#[async_trait]
impl RegistryQuery for FlatContainerClient {
    async fn lookup(
        &self,
        package_id: &str,
        version: &ResolvedVersion,
    ) -> Result<RegistryLookup, PublishError> {
        let url = self.index_url(package_id);
        tracing::debug!(url = %url, "Querying package registry");

        let network_error = |e: reqwest::Error| PublishError::NetworkError {
            url: url.clone(),
            message: e.to_string(),
        };

        let response = self.http.get(&url).send().await.map_err(network_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(network_error)?;

        let lookup = classify(status, &body, version.as_str());
        tracing::debug!(status, lookup = ?lookup, "Registry lookup finished");
        Ok(lookup)
    }
}
