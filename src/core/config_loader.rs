//! Configuration loader for nuget-publisher
//!
//! Layers, lowest to highest priority:
//! 1. defaults
//! 2. YAML config file (`.nuget-publish.yaml` or an explicit path)
//! 3. environment (`INPUT_X`, falling back to `X`)
//! 4. CLI arguments
//!
//! The environment is passed in as a map; nothing here reads the process
//! environment.

use super::config::*;
use crate::core::error::PublishError;
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Configuration file name, looked up in the working directory
pub const CONFIG_FILENAME: &str = ".nuget-publish.yaml";

/// Keys that must never be stored in the config file
const SECRET_FILE_KEYS: &[&str] = &["nuget_key", "api_key", "certificate_password"];

/// Configuration load options
#[derive(Debug, Default)]
pub struct ConfigLoadOptions {
    /// Directory the config file is looked up in
    pub working_dir: PathBuf,

    /// Explicit config file; must exist when set
    pub config_file: Option<PathBuf>,

    /// Environment variables
    pub env: HashMap<String, String>,

    /// CLI arguments (highest priority)
    pub cli: ConfigOverrides,
}

/// One configuration layer; `None` leaves the lower layer's value
#[derive(Debug, Default)]
pub struct ConfigOverrides {
    pub project_file: Option<PathBuf>,
    pub package_id: Option<String>,
    pub version_file: Option<PathBuf>,
    pub version: Option<String>,
    pub version_pattern: Option<String>,
    pub api_key: Option<SecretString>,
    pub registry_url: Option<String>,
    pub include_symbols: Option<bool>,
    pub no_build: Option<bool>,
    pub tag_commit: Option<bool>,
    pub tag_template: Option<String>,
    pub certificate_path: Option<PathBuf>,
    pub certificate_password: Option<SecretString>,
    pub working_dir: Option<PathBuf>,
    pub http_timeout: Option<Duration>,
    pub command_timeout: Option<Duration>,
}

impl ConfigOverrides {
    /// Overlay `other` on top of `self`
    pub fn merge(self, other: ConfigOverrides) -> ConfigOverrides {
        ConfigOverrides {
            project_file: other.project_file.or(self.project_file),
            package_id: other.package_id.or(self.package_id),
            version_file: other.version_file.or(self.version_file),
            version: other.version.or(self.version),
            version_pattern: other.version_pattern.or(self.version_pattern),
            api_key: other.api_key.or(self.api_key),
            registry_url: other.registry_url.or(self.registry_url),
            include_symbols: other.include_symbols.or(self.include_symbols),
            no_build: other.no_build.or(self.no_build),
            tag_commit: other.tag_commit.or(self.tag_commit),
            tag_template: other.tag_template.or(self.tag_template),
            certificate_path: other.certificate_path.or(self.certificate_path),
            certificate_password: other.certificate_password.or(self.certificate_password),
            working_dir: other.working_dir.or(self.working_dir),
            http_timeout: other.http_timeout.or(self.http_timeout),
            command_timeout: other.command_timeout.or(self.command_timeout),
        }
    }

    /// Apply the defaults and build the final configuration
    ///
    /// Missing required values are left empty for the validator to report.
    pub fn into_config(self) -> PublishConfig {
        let project_file = self.project_file.unwrap_or_default();
        let mut config = PublishConfig::new(project_file.clone(), self.package_id.unwrap_or_default());

        config.version_source = match self.version {
            Some(version) => VersionSource::Explicit(version),
            None => VersionSource::Extract {
                file: self.version_file.unwrap_or(project_file),
                pattern: self
                    .version_pattern
                    .unwrap_or_else(|| DEFAULT_VERSION_PATTERN.to_string()),
            },
        };
        config.api_key = self.api_key;
        if let Some(url) = self.registry_url {
            config.registry_url = url;
        }
        config.include_symbols = self.include_symbols.unwrap_or(false);
        config.no_build = self.no_build.unwrap_or(false);
        config.tag_commit = self.tag_commit.unwrap_or(false);
        if let Some(template) = self.tag_template {
            config.tag_template = template;
        }
        config.signing = SigningInput {
            certificate_path: self.certificate_path,
            certificate_password: self.certificate_password,
        };
        if let Some(dir) = self.working_dir {
            config.working_dir = dir;
        }
        if let Some(timeout) = self.http_timeout {
            config.http_timeout = timeout;
        }
        if let Some(timeout) = self.command_timeout {
            config.command_timeout = timeout;
        }
        config
    }
}

/// YAML config file contents; secrets are rejected before parsing
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub project_file: Option<PathBuf>,
    pub package_name: Option<String>,
    pub version_file: Option<PathBuf>,
    pub version: Option<String>,
    pub version_regex: Option<String>,
    pub nuget_source: Option<String>,
    pub include_symbols: Option<bool>,
    pub no_build: Option<bool>,
    pub tag_commit: Option<bool>,
    pub tag_format: Option<String>,
    pub certificate_path: Option<PathBuf>,
    pub http_timeout_secs: Option<u64>,
    pub command_timeout_secs: Option<u64>,
}

impl From<FileConfig> for ConfigOverrides {
    fn from(file: FileConfig) -> Self {
        ConfigOverrides {
            project_file: file.project_file,
            package_id: non_empty(file.package_name),
            version_file: file.version_file,
            version: non_empty(file.version),
            version_pattern: non_empty(file.version_regex),
            registry_url: non_empty(file.nuget_source),
            include_symbols: file.include_symbols,
            no_build: file.no_build,
            tag_commit: file.tag_commit,
            tag_template: non_empty(file.tag_format),
            certificate_path: file.certificate_path,
            http_timeout: file.http_timeout_secs.map(Duration::from_secs),
            command_timeout: file.command_timeout_secs.map(Duration::from_secs),
            ..Default::default()
        }
    }
}

/// Configuration file loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from every layer, highest priority last
    pub async fn load(options: ConfigLoadOptions) -> Result<PublishConfig, PublishError> {
        let mut layers = vec![ConfigOverrides {
            working_dir: Some(options.working_dir.clone()),
            ..Default::default()
        }];

        let file_layer = match options.config_file {
            Some(ref path) => Some(Self::load_config_file(path).await?),
            None => {
                let default_path = options.working_dir.join(CONFIG_FILENAME);
                if fs::try_exists(&default_path).await.unwrap_or(false) {
                    Some(Self::load_config_file(&default_path).await?)
                } else {
                    None
                }
            }
        };
        if let Some(file) = file_layer {
            layers.push(file.into());
        }

        layers.push(Self::load_env_config(&options.env)?);
        layers.push(options.cli);

        let merged = layers
            .into_iter()
            .fold(ConfigOverrides::default(), ConfigOverrides::merge);
        let mut config = merged.into_config();
        resolve_paths(&mut config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub async fn load_config_file(path: &Path) -> Result<FileConfig, PublishError> {
        let content = fs::read_to_string(path).await.map_err(|e| PublishError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;
        Self::parse_config_file(&content)
    }

    fn parse_config_file(content: &str) -> Result<FileConfig, PublishError> {
        let parse_error = |e: serde_yaml::Error| PublishError::Config {
            message: format!("Failed to parse YAML config: {}", e),
        };

        let value: serde_yaml::Value = serde_yaml::from_str(content).map_err(parse_error)?;
        if value.is_null() {
            return Ok(FileConfig::default());
        }
        if let Some(mapping) = value.as_mapping() {
            for key in SECRET_FILE_KEYS {
                if mapping.contains_key(*key) {
                    return Err(PublishError::Config {
                        message: format!(
                            "`{}` must not be stored in the config file; use the environment",
                            key
                        ),
                    });
                }
            }
        }
        serde_yaml::from_value(value).map_err(parse_error)
    }

    /// Load configuration from action-style environment variables
    pub fn load_env_config(env: &HashMap<String, String>) -> Result<ConfigOverrides, PublishError> {
        Ok(ConfigOverrides {
            project_file: env_value(env, "PROJECT_FILE_PATH").map(PathBuf::from),
            package_id: env_value(env, "PACKAGE_NAME").map(str::to_string),
            version_file: env_value(env, "VERSION_FILE_PATH").map(PathBuf::from),
            version: env_value(env, "VERSION_STATIC").map(str::to_string),
            version_pattern: env_value(env, "VERSION_REGEX").map(str::to_string),
            api_key: env_value(env, "NUGET_KEY").map(|v| SecretString::from(v.to_string())),
            registry_url: env_value(env, "NUGET_SOURCE").map(str::to_string),
            include_symbols: env_bool(env, "INCLUDE_SYMBOLS")?,
            no_build: env_bool(env, "NO_BUILD")?,
            tag_commit: env_bool(env, "TAG_COMMIT")?,
            tag_template: env_value(env, "TAG_FORMAT").map(str::to_string),
            certificate_path: env_value(env, "CODESIGN_CERT_PATH").map(PathBuf::from),
            certificate_password: env_value(env, "CODESIGN_CERT_PASSWORD")
                .map(|v| SecretString::from(v.to_string())),
            ..Default::default()
        })
    }
}

/// Makes `working_dir` absolute and anchors relative file paths to it,
/// so validation and the commands see the same files
fn resolve_paths(config: &mut PublishConfig) -> Result<(), PublishError> {
    config.working_dir = std::path::absolute(&config.working_dir).map_err(|e| PublishError::Config {
        message: format!(
            "Failed to resolve working directory {}: {}",
            config.working_dir.display(),
            e
        ),
    })?;

    let base = config.working_dir.clone();
    let anchor = |path: &mut PathBuf| {
        if !path.as_os_str().is_empty() && path.is_relative() {
            *path = base.join(&*path);
        }
    };
    anchor(&mut config.project_file);
    if let VersionSource::Extract { ref mut file, .. } = config.version_source {
        anchor(file);
    }
    if let Some(ref mut path) = config.signing.certificate_path {
        anchor(path);
    }
    Ok(())
}

/// `INPUT_{name}`, then `{name}`; blank values count as unset
fn env_value<'a>(env: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    [format!("INPUT_{}", name), name.to_string()]
        .iter()
        .filter_map(|key| env.get(key))
        .map(String::as_str)
        .find(|value| !value.trim().is_empty())
}

fn env_bool(env: &HashMap<String, String>, name: &str) -> Result<Option<bool>, PublishError> {
    env_value(env, name).map(|v| parse_bool(name, v)).transpose()
}

/// `true`/`false`, case-insensitive
pub fn parse_bool(name: &str, value: &str) -> Result<bool, PublishError> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(PublishError::Config {
            message: format!("{} must be `true` or `false`, got `{}`", name, value),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
