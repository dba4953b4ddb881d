//! Configuration structures and types for nuget-publisher
//!
//! `PublishConfig` is built once at the process boundary (see
//! `config_loader`) and then only read by the pipeline stages.

use crate::core::error::PublishError;
use crate::security::token_manager::SecretMasker;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default NuGet source
pub const DEFAULT_REGISTRY_URL: &str = "https://api.nuget.org";

/// Default version extraction pattern (MSBuild `<Version>` element)
pub const DEFAULT_VERSION_PATTERN: &str = r"^\s*<Version>(.*)<\/Version>\s*$";

/// Default tag template
pub const DEFAULT_TAG_TEMPLATE: &str = "v*";

/// Placeholder replaced by the resolved version in tag templates
pub const TAG_PLACEHOLDER: char = '*';

/// Default timeout for the registry lookup
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for a single external command
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Where the version string comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSource {
    /// Version given verbatim; no file is read
    Explicit(String),
    /// First capture group of `pattern` matched against `file`
    Extract { file: PathBuf, pattern: String },
}

/// Code signing inputs as supplied, before the both-or-neither check
#[derive(Debug, Default)]
pub struct SigningInput {
    pub certificate_path: Option<PathBuf>,
    pub certificate_password: Option<SecretString>,
}

impl SigningInput {
    pub fn is_empty(&self) -> bool {
        self.certificate_path.is_none() && self.certificate_password.is_none()
    }
}

/// Complete signing credentials
#[derive(Debug)]
pub struct SigningCredentials {
    pub certificate_path: PathBuf,
    pub certificate_password: SecretString,
}

/// Tag name template with exactly one `*` placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagTemplate(String);

impl TagTemplate {
    pub fn parse(template: &str) -> Result<Self, PublishError> {
        let placeholders = template.matches(TAG_PLACEHOLDER).count();
        if placeholders != 1 {
            return Err(PublishError::validation(
                "tag_template",
                format!(
                    "Tag template `{}` must contain exactly one `{}` placeholder (found {})",
                    template, TAG_PLACEHOLDER, placeholders
                ),
            ));
        }
        Ok(Self(template.to_string()))
    }

    /// Substitute the version for the placeholder
    pub fn render(&self, version: &str) -> String {
        self.0.replacen(TAG_PLACEHOLDER, version, 1)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Root configuration object for one publish attempt
#[derive(Debug)]
pub struct PublishConfig {
    /// Path to the .csproj (or other buildable project)
    pub project_file: PathBuf,

    /// Package id as known by the registry
    pub package_id: String,

    /// Explicit version or file + pattern
    pub version_source: VersionSource,

    /// Registry API key; `None` disables pushing
    pub api_key: Option<SecretString>,

    /// Registry base URL (e.g. https://api.nuget.org)
    pub registry_url: String,

    /// Also produce a .snupkg symbol package
    pub include_symbols: bool,

    /// Skip `dotnet build`
    pub no_build: bool,

    /// Create and push a git tag after a successful push
    pub tag_commit: bool,

    /// Tag name template, `*` is replaced by the version
    pub tag_template: String,

    /// Optional code signing inputs
    pub signing: SigningInput,

    /// Directory packages are produced in and cleaned from
    pub working_dir: PathBuf,

    pub http_timeout: Duration,

    pub command_timeout: Duration,
}

impl PublishConfig {
    /// Create a configuration with default settings for the given project and package
    pub fn new(project_file: impl Into<PathBuf>, package_id: impl Into<String>) -> Self {
        let project_file = project_file.into();
        Self {
            version_source: VersionSource::Extract {
                file: project_file.clone(),
                pattern: DEFAULT_VERSION_PATTERN.to_string(),
            },
            project_file,
            package_id: package_id.into(),
            api_key: None,
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            include_symbols: false,
            no_build: false,
            tag_commit: false,
            tag_template: DEFAULT_TAG_TEMPLATE.to_string(),
            signing: SigningInput::default(),
            working_dir: PathBuf::from("."),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Masker that knows every secret of this configuration
    pub fn secret_masker(&self) -> SecretMasker {
        let mut masker = SecretMasker::new();
        if let Some(ref key) = self.api_key {
            masker.register(key);
        }
        if let Some(ref password) = self.signing.certificate_password {
            masker.register_redacted(password);
        }
        masker
    }

    /// Human-readable view of the configuration with secrets masked
    pub fn redacted(&self) -> RedactedConfig<'_> {
        RedactedConfig(self)
    }
}

/// Display adapter for `PublishConfig` that never prints secrets
pub struct RedactedConfig<'a>(&'a PublishConfig);

impl fmt::Display for RedactedConfig<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let config = self.0;
        let mask = |secret: &Option<SecretString>| match secret {
            Some(s) => SecretMasker::mask_token(s.expose_secret()),
            None => "<unset>".to_string(),
        };

        writeln!(f, "project_file: {}", config.project_file.display())?;
        writeln!(f, "package_id: {}", config.package_id)?;
        match &config.version_source {
            VersionSource::Explicit(version) => writeln!(f, "version: {}", version)?,
            VersionSource::Extract { file, pattern } => {
                writeln!(f, "version_file: {}", file.display())?;
                writeln!(f, "version_pattern: {}", pattern)?;
            }
        }
        writeln!(f, "registry_url: {}", config.registry_url)?;
        writeln!(f, "api_key: {}", mask(&config.api_key))?;
        writeln!(f, "include_symbols: {}", config.include_symbols)?;
        writeln!(f, "no_build: {}", config.no_build)?;
        writeln!(f, "tag_commit: {}", config.tag_commit)?;
        writeln!(f, "tag_template: {}", config.tag_template)?;
        match &config.signing.certificate_path {
            Some(path) => writeln!(f, "certificate_path: {}", path.display())?,
            None => writeln!(f, "certificate_path: <unset>")?,
        }
        let password = match config.signing.certificate_password {
            Some(_) => "****",
            None => "<unset>",
        };
        write!(f, "certificate_password: {}", password)
    }
}
