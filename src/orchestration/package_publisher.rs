//! Package Publisher - runs the external publish sequence
//!
//! Steps, in order:
//! - remove stale `.nupkg`/`.snupkg` files from the working directory
//! - build (unless disabled)
//! - pack (optionally with a symbol package)
//! - sign (when signing credentials are configured)
//! - push every produced `.nupkg`
//! - create and push the git tag (when tagging is enabled)
//!
//! Every command must exit with status zero. Push and sign output is also
//! scanned for the literal `error`, which the NuGet CLI prints on some
//! failures while still exiting successfully.

use crate::core::error::PublishError;
use crate::core::error::PublishStep;
use crate::security::command_executor::{CommandError, CommandOutput, CommandRunner};
use crate::security::token_manager::SecretMasker;
use crate::validation::config_validator::ValidatedConfig;
use secrecy::ExposeSecret;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

const NUPKG_EXTENSION: &str = "nupkg";
const SNUPKG_EXTENSION: &str = "snupkg";

/// How a publish attempt ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PublishOutcome {
    /// Packages were pushed (and the tag created, when enabled)
    Published {
        packages: Vec<String>,
        tag: Option<String>,
    },
    /// No api key configured; nothing was changed
    SkippedNoApiKey,
    /// The registry already lists this version
    AlreadyPublished,
}

impl PublishOutcome {
    pub fn tag(&self) -> Option<&str> {
        match self {
            Self::Published { tag, .. } => tag.as_deref(),
            _ => None,
        }
    }
}

/// One executed step of the sequence
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub step: PublishStep,
    /// Command line with secrets masked, or a description for local steps
    pub detail: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishSummary {
    pub outcome: PublishOutcome,
    pub steps: Vec<StepRecord>,
}

/// Runs the publish sequence through a `CommandRunner`
pub struct PackagePublisher<'a> {
    runner: &'a dyn CommandRunner,
    masker: SecretMasker,
    steps: Vec<StepRecord>,
}

impl<'a> PackagePublisher<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self {
            runner,
            masker: SecretMasker::new(),
            steps: Vec::new(),
        }
    }

    /// Publish the package described by `validated`
    ///
    /// Only called when the registry does not list the resolved version.
    pub async fn publish(mut self, validated: &ValidatedConfig) -> Result<PublishSummary, PublishError> {
        let config = validated.config();
        let version = validated.version().as_str();

        tracing::info!(
            package = %config.package_id,
            version = %version,
            "Found new version of package"
        );

        let Some(ref api_key) = config.api_key else {
            tracing::warn!("NUGET_KEY not given, skipping publish");
            return Ok(PublishSummary {
                outcome: PublishOutcome::SkippedNoApiKey,
                steps: Vec::new(),
            });
        };

        self.masker = validated.secret_masker();
        let working_dir = config.working_dir.as_path();
        let project = config.project_file.display().to_string();

        tracing::info!(source = %config.registry_url, "Publishing to NuGet source");

        self.clean(working_dir)?;

        if !config.no_build {
            self.run_step(
                PublishStep::Build,
                "dotnet",
                args(&["build", "-c", "Release", &project]),
            )
            .await?;
        }

        let mut pack = args(&["pack"]);
        if config.include_symbols {
            pack.extend(args(&["--include-symbols", "-p:SymbolPackageFormat=snupkg"]));
        }
        pack.extend(args(&["-c", "Release", &project, "-o", "."]));
        self.run_step(PublishStep::Pack, "dotnet", pack).await?;

        if let Some(signing) = validated.signing() {
            let packages = find_packages(working_dir, NUPKG_EXTENSION)?;
            let [package] = packages.as_slice() else {
                return Err(PublishError::Artifact {
                    message: format!(
                        "signing needs exactly one .nupkg in {}, found {}",
                        working_dir.display(),
                        packages.len()
                    ),
                });
            };
            let output = self
                .run_step(
                    PublishStep::Sign,
                    "dotnet",
                    vec![
                        "nuget".to_string(),
                        "sign".to_string(),
                        file_arg(package),
                        "--certificate-path".to_string(),
                        signing.certificate_path.display().to_string(),
                        "--certificate-password".to_string(),
                        signing.certificate_password.expose_secret().to_string(),
                    ],
                )
                .await?;
            self.reject_reported_error(PublishStep::Sign, &output)?;
        }

        let packages = find_packages(working_dir, NUPKG_EXTENSION)?;
        if packages.is_empty() {
            return Err(PublishError::Artifact {
                message: format!("pack produced no .nupkg in {}", working_dir.display()),
            });
        }

        let push_source = format!("{}/v3/index.json", config.registry_url.trim_end_matches('/'));
        let mut pushed = Vec::with_capacity(packages.len());
        for package in &packages {
            let output = self
                .run_step(
                    PublishStep::Push,
                    "dotnet",
                    vec![
                        "nuget".to_string(),
                        "push".to_string(),
                        file_arg(package),
                        "-s".to_string(),
                        push_source.clone(),
                        "-k".to_string(),
                        api_key.expose_secret().to_string(),
                        "--skip-duplicate".to_string(),
                    ],
                )
                .await?;
            tracing::info!("{}", self.masker.mask(&output.combined()));
            self.reject_reported_error(PublishStep::Push, &output)?;
            pushed.push(file_arg(package));
        }

        let tag = match validated.tag_template() {
            Some(template) => {
                let tag = template.render(version);
                self.tag_commit(&tag).await?;
                Some(tag)
            }
            None => None,
        };

        Ok(PublishSummary {
            outcome: PublishOutcome::Published {
                packages: pushed,
                tag,
            },
            steps: self.steps,
        })
    }

    /// Remove package files left over from earlier runs
    fn clean(&mut self, working_dir: &Path) -> Result<(), PublishError> {
        let start = Instant::now();
        let mut stale = find_packages(working_dir, NUPKG_EXTENSION)?;
        stale.extend(find_packages(working_dir, SNUPKG_EXTENSION)?);

        for path in &stale {
            std::fs::remove_file(path).map_err(|e| PublishError::Io {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            tracing::debug!(file = %path.display(), "Removed stale package");
        }

        self.steps.push(StepRecord {
            step: PublishStep::Clean,
            detail: format!("removed {} stale package file(s)", stale.len()),
            duration_ms: start.elapsed().as_millis() as u64,
        });
        Ok(())
    }

    async fn tag_commit(&mut self, tag: &str) -> Result<(), PublishError> {
        tracing::info!(tag = %tag, "Creating new tag");
        self.run_step(PublishStep::TagCreate, "git", args(&["tag", tag]))
            .await?;

        // The local tag stays behind if the push fails
        self.run_step(PublishStep::TagPush, "git", args(&["push", "origin", tag]))
            .await
            .map_err(|e| PublishError::TagPushFailed {
                tag: tag.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    /// Run one command and require exit status zero
    async fn run_step(
        &mut self,
        step: PublishStep,
        program: &str,
        args: Vec<String>,
    ) -> Result<CommandOutput, PublishError> {
        let detail = self.masker.mask_command(program, &args);
        tracing::info!(step = %step, command = %detail, "Running command");

        let output = self.runner.run(program, &args).await.map_err(|e| match e {
            CommandError::Timeout(timeout) => PublishError::CommandTimeout { step, timeout },
            other => PublishError::CommandError {
                step,
                message: self.masker.mask(&other.to_string()),
            },
        })?;

        self.steps.push(StepRecord {
            step,
            detail,
            duration_ms: output.duration_ms,
        });

        if !output.success() {
            tracing::error!(step = %step, exit_code = ?output.exit_code, "Command failed");
            return Err(PublishError::CommandFailed {
                step,
                exit_code: output.exit_code,
                output: self.masker.mask(&output.combined()),
            });
        }
        Ok(output)
    }

    fn reject_reported_error(
        &self,
        step: PublishStep,
        output: &CommandOutput,
    ) -> Result<(), PublishError> {
        if output.reports_error() {
            return Err(PublishError::ErrorReported {
                step,
                output: self.masker.mask(&output.combined()),
            });
        }
        Ok(())
    }
}

fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// File name relative to the working directory, where commands run
fn file_arg(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Files directly in `dir` with the given extension, sorted by name
fn find_packages(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, PublishError> {
    let mut found = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| PublishError::Io {
            path: dir.display().to_string(),
            message: e.to_string(),
        })?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == extension) {
            found.push(path.to_path_buf());
        }
    }
    found.sort();
    Ok(found)
}
