//! Error handling for package publishing
//!
//! This module provides the error type shared by every pipeline stage,
//! with stable error codes and recovery guidance, using the thiserror
//! crate for ergonomic error handling.

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// External step of the publish sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PublishStep {
    Clean,
    Build,
    Pack,
    Sign,
    Push,
    TagCreate,
    TagPush,
}

impl PublishStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Build => "build",
            Self::Pack => "pack",
            Self::Sign => "sign",
            Self::Push => "push",
            Self::TagCreate => "tag-create",
            Self::TagPush => "tag-push",
        }
    }
}

impl fmt::Display for PublishStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "<signal>".to_string(),
    }
}

/// Main error type for package publishing operations
#[derive(Error, Debug)]
pub enum PublishError {
    // Validation errors
    #[error("[{field}] {message}")]
    Validation { field: String, message: String },

    #[error("unable to extract version info from {file} using pattern `{pattern}`")]
    VersionNotFound { file: String, pattern: String },

    #[error("invalid version pattern `{pattern}`: {message}")]
    InvalidPattern { pattern: String, message: String },

    // Configuration loading
    #[error("configuration error: {message}")]
    Config { message: String },

    // Network errors
    #[error("registry request to {url} failed: {message}")]
    NetworkError { url: String, message: String },

    // External command errors
    #[error("[{step}] command exited with status {}: {output}", describe_exit(.exit_code))]
    CommandFailed {
        step: PublishStep,
        exit_code: Option<i32>,
        output: String,
    },

    #[error("[{step}] command reported an error: {output}")]
    ErrorReported { step: PublishStep, output: String },

    #[error("[{step}] command could not be run: {message}")]
    CommandError { step: PublishStep, message: String },

    #[error("[{step}] command timed out after {timeout:?}")]
    CommandTimeout { step: PublishStep, timeout: Duration },

    // Local artifact errors
    #[error("package artifact error: {message}")]
    Artifact { message: String },

    #[error("failed to access {path}: {message}")]
    Io { path: String, message: String },

    // Partial failure: the local tag exists but is not on the remote
    #[error("tag {tag} was created locally but could not be pushed: {message}")]
    TagPushFailed { tag: String, message: String },
}

impl PublishError {
    pub(crate) fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Get the publish step associated with this error, if any
    pub fn step(&self) -> Option<PublishStep> {
        match self {
            Self::CommandFailed { step, .. }
            | Self::ErrorReported { step, .. }
            | Self::CommandError { step, .. }
            | Self::CommandTimeout { step, .. } => Some(*step),
            Self::TagPushFailed { .. } => Some(PublishStep::TagPush),
            _ => None,
        }
    }

    /// Whether the failure happened before anything was changed locally or remotely
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::VersionNotFound { .. }
                | Self::InvalidPattern { .. }
                | Self::Config { .. }
        )
    }

    /// Whether the working directory or the repository may be left half-done
    pub fn leaves_partial_state(&self) -> bool {
        match self {
            Self::TagPushFailed { .. } | Self::Io { .. } | Self::Artifact { .. } => true,
            _ => self.step().is_some(),
        }
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::Validation { .. } => vec![
                "Check the configured inputs",
                "Run `nuget-publisher check` to validate without publishing",
            ],
            Self::VersionNotFound { .. } => vec![
                "Check that the version file contains the version element",
                "Set VERSION_STATIC to skip extraction",
            ],
            Self::InvalidPattern { .. } => {
                vec!["The version pattern must be a valid regex with one capture group"]
            }
            Self::Config { .. } => vec!["Check environment variables and the config file"],
            Self::NetworkError { .. } => vec![
                "Check the NuGet source URL",
                "Check network connectivity and retry the workflow",
            ],
            Self::CommandFailed { .. } | Self::ErrorReported { .. } => vec![
                "Check the command output above",
                "Make sure the .NET SDK is installed on the runner",
            ],
            Self::CommandError { .. } => vec!["Make sure dotnet and git are on PATH"],
            Self::CommandTimeout { .. } => vec!["Increase --command-timeout"],
            Self::Artifact { .. } => vec![
                "Check the pack output",
                "Remove unrelated .nupkg files from the working directory",
            ],
            Self::Io { .. } => vec!["Check file permissions in the working directory"],
            Self::TagPushFailed { .. } => vec![
                "The tag exists locally only; push it manually or delete it with `git tag -d`",
                "Check that the workflow token may push tags",
            ],
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_FAILED",
            Self::VersionNotFound { .. } => "VERSION_NOT_FOUND",
            Self::InvalidPattern { .. } => "INVALID_PATTERN",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::NetworkError { .. } => "NETWORK_ERROR",
            Self::CommandFailed { .. } => "COMMAND_FAILED",
            Self::ErrorReported { .. } => "COMMAND_REPORTED_ERROR",
            Self::CommandError { .. } => "COMMAND_ERROR",
            Self::CommandTimeout { .. } => "COMMAND_TIMEOUT",
            Self::Artifact { .. } => "ARTIFACT_ERROR",
            Self::Io { .. } => "IO_ERROR",
            Self::TagPushFailed { .. } => "TAG_PUSH_FAILED",
        }
    }
}
