//! Config Validator - fail-fast checks before anything touches the network
//!
//! Checks run in a fixed order and stop at the first violation:
//!
//! 1. project file exists
//! 2. package id is a valid NuGet id
//! 3. the version resolves (file exists, pattern matches)
//! 4. signing credentials are complete or absent
//! 5. the tag template has exactly one placeholder (when tagging)
//! 6. the registry URL is an absolute http(s) URL

use crate::core::config::{PublishConfig, SigningCredentials, SigningInput, TagTemplate, VersionSource};
use crate::core::error::PublishError;
use crate::security::token_manager::SecretMasker;
use crate::validation::version_resolver::{ResolvedVersion, VersionResolver};
use secrecy::ExposeSecret;

/// Maximum NuGet package id length
const MAX_PACKAGE_ID_LENGTH: usize = 100;

fn is_package_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

/// Configuration that passed validation, with its version resolved once
#[derive(Debug)]
pub struct ValidatedConfig {
    config: PublishConfig,
    version: ResolvedVersion,
    signing: Option<SigningCredentials>,
    tag_template: Option<TagTemplate>,
}

impl ValidatedConfig {
    pub fn config(&self) -> &PublishConfig {
        &self.config
    }

    pub fn version(&self) -> &ResolvedVersion {
        &self.version
    }

    /// Complete signing credentials, if signing is enabled
    pub fn signing(&self) -> Option<&SigningCredentials> {
        self.signing.as_ref()
    }

    /// Tag template, if tagging is enabled
    pub fn tag_template(&self) -> Option<&TagTemplate> {
        self.tag_template.as_ref()
    }

    /// Masker covering the api key and the certificate password
    pub fn secret_masker(&self) -> SecretMasker {
        let mut masker = self.config.secret_masker();
        if let Some(ref signing) = self.signing {
            masker.register_redacted(&signing.certificate_password);
        }
        masker
    }
}

/// Validates a `PublishConfig` and resolves its version
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, consuming it
    pub fn validate(mut config: PublishConfig) -> Result<ValidatedConfig, PublishError> {
        tracing::info!("Publish configuration:\n{}", config.redacted());

        Self::check_project_file(&config)?;
        Self::check_package_id(&config.package_id)?;
        Self::check_version_file(&config)?;
        let version = VersionResolver::resolve(&config.version_source)?;
        tracing::debug!(version = %version, "Resolved package version");

        let signing = Self::check_signing(std::mem::take(&mut config.signing))?;

        let tag_template = if config.tag_commit {
            Some(TagTemplate::parse(&config.tag_template)?)
        } else {
            None
        };

        Self::check_registry_url(&config.registry_url)?;

        Ok(ValidatedConfig {
            config,
            version,
            signing,
            tag_template,
        })
    }

    fn check_project_file(config: &PublishConfig) -> Result<(), PublishError> {
        if config.project_file.as_os_str().is_empty() || !config.project_file.is_file() {
            return Err(PublishError::validation(
                "project_file",
                format!("Project file not found: {}", config.project_file.display()),
            ));
        }
        Ok(())
    }

    /// The id is a registry identifier, not a local path
    fn check_package_id(package_id: &str) -> Result<(), PublishError> {
        if package_id.trim().is_empty() {
            return Err(PublishError::validation("package_id", "Package name is required"));
        }
        if package_id.len() > MAX_PACKAGE_ID_LENGTH {
            return Err(PublishError::validation(
                "package_id",
                format!(
                    "Package name must be at most {} characters",
                    MAX_PACKAGE_ID_LENGTH
                ),
            ));
        }
        if package_id.starts_with(['.', '-']) || !package_id.chars().all(is_package_id_char) {
            return Err(PublishError::validation(
                "package_id",
                format!(
                    "Package name `{}` may only contain letters, digits, '.', '_' and '-'",
                    package_id
                ),
            ));
        }
        Ok(())
    }

    fn check_version_file(config: &PublishConfig) -> Result<(), PublishError> {
        let VersionSource::Extract { ref file, .. } = config.version_source else {
            return Ok(());
        };
        // Already checked above when it is the project file
        if *file != config.project_file && !file.is_file() {
            return Err(PublishError::validation(
                "version_file",
                format!("Version file not found: {}", file.display()),
            ));
        }
        Ok(())
    }

    fn check_signing(input: SigningInput) -> Result<Option<SigningCredentials>, PublishError> {
        let path = input
            .certificate_path
            .filter(|p| !p.as_os_str().is_empty());
        let password = input
            .certificate_password
            .filter(|p| !p.expose_secret().is_empty());

        match (path, password) {
            (None, None) => Ok(None),
            (Some(certificate_path), Some(certificate_password)) => {
                if !certificate_path.is_file() {
                    return Err(PublishError::validation(
                        "certificate_path",
                        format!("Certificate not found: {}", certificate_path.display()),
                    ));
                }
                Ok(Some(SigningCredentials {
                    certificate_path,
                    certificate_password,
                }))
            }
            (Some(_), None) => Err(PublishError::validation(
                "certificate_password",
                "Certificate path is set but the certificate password is missing",
            )),
            (None, Some(_)) => Err(PublishError::validation(
                "certificate_path",
                "Certificate password is set but the certificate path is missing",
            )),
        }
    }

    fn check_registry_url(url: &str) -> Result<(), PublishError> {
        match reqwest::Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
            Ok(parsed) => Err(PublishError::validation(
                "registry_url",
                format!("Unsupported registry URL scheme: {}", parsed.scheme()),
            )),
            Err(e) => Err(PublishError::validation(
                "registry_url",
                format!("Invalid registry URL `{}`: {}", url, e),
            )),
        }
    }
}
