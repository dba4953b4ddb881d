//! Version Resolver - produces the single version string of a publish run
//!
//! The version is either given verbatim or extracted from a file with a
//! regular expression evaluated in multi-line mode; the first capture group
//! is the version.
//!
//! # Example
//!
//! ```
//! use nuget_publisher::core::VersionSource;
//! use nuget_publisher::validation::VersionResolver;
//!
//! let source = VersionSource::Explicit("1.2.3".to_string());
//! let version = VersionResolver::resolve(&source).unwrap();
//! assert_eq!(version.as_str(), "1.2.3");
//! ```

use crate::core::config::VersionSource;
use crate::core::error::PublishError;
use regex::RegexBuilder;
use semver::Version;
use std::fmt;
use std::path::Path;

/// Version used for the registry comparison and the tag name
///
/// Only the resolver can create one, and it has no mutating methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVersion(String);

impl ResolvedVersion {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// SemVer 2.0 or a NuGet four-part numeric version (1.2.3.4)
    pub fn is_well_formed(&self) -> bool {
        if Version::parse(&self.0).is_ok() {
            return true;
        }
        let parts: Vec<&str> = self.0.split('.').collect();
        parts.len() == 4
            && parts
                .iter()
                .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
    }
}

impl fmt::Display for ResolvedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves a `VersionSource` into a `ResolvedVersion`
pub struct VersionResolver;

impl VersionResolver {
    /// Resolve the version; reads the version file only for `VersionSource::Extract`
    pub fn resolve(source: &VersionSource) -> Result<ResolvedVersion, PublishError> {
        let version = match source {
            VersionSource::Explicit(version) => {
                let version = version.trim();
                if version.is_empty() {
                    return Err(PublishError::validation(
                        "version",
                        "Explicit version is empty",
                    ));
                }
                ResolvedVersion(version.to_string())
            }
            VersionSource::Extract { file, pattern } => {
                let content = std::fs::read_to_string(file).map_err(|e| {
                    PublishError::validation(
                        "version_file",
                        format!("Unable to read version file {}: {}", file.display(), e),
                    )
                })?;
                ResolvedVersion(Self::extract(&content, pattern, file)?)
            }
        };

        if !version.is_well_formed() {
            tracing::warn!(
                version = %version,
                "Resolved version is neither SemVer nor a four-part NuGet version"
            );
        }

        Ok(version)
    }

    /// Apply `pattern` to `content` and return the first capture group
    pub fn extract(content: &str, pattern: &str, file: &Path) -> Result<String, PublishError> {
        let regex = RegexBuilder::new(pattern)
            .multi_line(true)
            .build()
            .map_err(|e| PublishError::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;

        // captures_len counts the implicit whole-match group
        if regex.captures_len() < 2 {
            return Err(PublishError::InvalidPattern {
                pattern: pattern.to_string(),
                message: "pattern has no capturing group".to_string(),
            });
        }

        let not_found = || PublishError::VersionNotFound {
            file: file.display().to_string(),
            pattern: pattern.to_string(),
        };

        let captures = regex.captures(content).ok_or_else(not_found)?;
        let version = captures
            .get(1)
            .map(|m| m.as_str().trim())
            .filter(|v| !v.is_empty())
            .ok_or_else(not_found)?;

        Ok(version.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::DEFAULT_VERSION_PATTERN;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    const CSPROJ: &str = r#"<Project Sdk="Microsoft.NET.Sdk">
  <PropertyGroup>
    <TargetFramework>net8.0</TargetFramework>
    <Version>1.4.2</Version>
  </PropertyGroup>
</Project>
"#;

    #[test]
    fn test_explicit_version_never_reads_file() {
        let source = VersionSource::Explicit("2.0.0".to_string());
        let version = VersionResolver::resolve(&source).unwrap();
        assert_eq!(version.as_str(), "2.0.0");
    }

    #[test]
    fn test_explicit_version_is_trimmed() {
        let source = VersionSource::Explicit(" 2.0.0\n".to_string());
        assert_eq!(VersionResolver::resolve(&source).unwrap().as_str(), "2.0.0");
    }

    #[test]
    fn test_empty_explicit_version_rejected() {
        let source = VersionSource::Explicit("  ".to_string());
        assert!(VersionResolver::resolve(&source).is_err());
    }

    #[test]
    fn test_extract_with_default_pattern() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(CSPROJ.as_bytes()).unwrap();

        let source = VersionSource::Extract {
            file: file.path().to_path_buf(),
            pattern: DEFAULT_VERSION_PATTERN.to_string(),
        };

        let version = VersionResolver::resolve(&source).unwrap();
        assert_eq!(version.to_string(), "1.4.2");
    }

    #[test]
    fn test_extract_uses_first_match_only() {
        let content = "<Version>1.0.0</Version>\n<Version>9.9.9</Version>\n";
        let version =
            VersionResolver::extract(content, DEFAULT_VERSION_PATTERN, Path::new("x")).unwrap();
        assert_eq!(version, "1.0.0");
    }

    #[test]
    fn test_extract_requires_multiline_anchors() {
        // `^` and `$` must match at line boundaries, not only at text boundaries
        let content = "header\n    <Version>3.1.0-beta.2</Version>   \nfooter";
        let version =
            VersionResolver::extract(content, DEFAULT_VERSION_PATTERN, Path::new("x")).unwrap();
        assert_eq!(version, "3.1.0-beta.2");
    }

    #[test]
    fn test_extract_no_match() {
        let err = VersionResolver::extract(
            "<Project></Project>",
            DEFAULT_VERSION_PATTERN,
            Path::new("Foo.csproj"),
        )
        .unwrap_err();

        assert_eq!(err.code(), "VERSION_NOT_FOUND");
        assert!(err.to_string().contains("Foo.csproj"));
    }

    #[test]
    fn test_extract_pattern_without_group() {
        let err = VersionResolver::extract("1.0.0", r"\d+\.\d+\.\d+", Path::new("x")).unwrap_err();
        assert_eq!(err.code(), "INVALID_PATTERN");
    }

    #[test]
    fn test_extract_invalid_pattern() {
        let err = VersionResolver::extract("1.0.0", r"(\d+", Path::new("x")).unwrap_err();
        assert_eq!(err.code(), "INVALID_PATTERN");
    }

    #[test]
    fn test_extract_optional_group_not_participating() {
        let err =
            VersionResolver::extract("version:", r"version:(\d+)?", Path::new("x")).unwrap_err();
        assert_eq!(err.code(), "VERSION_NOT_FOUND");
    }

    #[test]
    fn test_extract_custom_pattern() {
        let content = "name = demo\nversion = \"0.7.1\"\n";
        let version =
            VersionResolver::extract(content, r#"^version = "([^"]+)"$"#, Path::new("x")).unwrap();
        assert_eq!(version, "0.7.1");
    }

    #[test]
    fn test_missing_version_file() {
        let source = VersionSource::Extract {
            file: PathBuf::from("/nonexistent/Version.props"),
            pattern: DEFAULT_VERSION_PATTERN.to_string(),
        };
        let err = VersionResolver::resolve(&source).unwrap_err();
        assert!(err.is_validation_error());
    }

    #[test]
    fn test_is_well_formed() {
        let check = |v: &str| ResolvedVersion(v.to_string()).is_well_formed();
        assert!(check("1.2.3"));
        assert!(check("1.2.3-alpha.1"));
        assert!(check("1.2.3.4"));
        assert!(!check("1.2"));
        assert!(!check("1.2.3.x"));
        assert!(!check("latest"));
    }
}
