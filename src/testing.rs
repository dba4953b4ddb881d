//! Test doubles for the command runner and the registry

use crate::core::error::PublishError;
use crate::registry::{RegistryLookup, RegistryQuery};
use crate::security::command_executor::{CommandError, CommandOutput, CommandRunner};
use crate::validation::version_resolver::ResolvedVersion;
use async_trait::async_trait;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

enum Scripted {
    Output(CommandOutput),
    Timeout(Duration),
    NotAllowed,
}

/// Records every command and fakes `dotnet pack` by writing package files
pub struct FakeRunner {
    dir: PathBuf,
    package: String,
    version: String,
    scripts: Vec<(String, Scripted)>,
    calls: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn new(dir: impl Into<PathBuf>, package: &str, version: &str) -> Self {
        Self {
            dir: dir.into(),
            package: package.to_string(),
            version: version.to_string(),
            scripts: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer commands whose rendered line starts with `prefix`
    pub fn respond(mut self, prefix: &str, exit_code: i32, stdout: &str, stderr: &str) -> Self {
        self.scripts.push((
            prefix.to_string(),
            Scripted::Output(CommandOutput {
                exit_code: Some(exit_code),
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
                duration_ms: 0,
            }),
        ));
        self
    }

    pub fn time_out(mut self, prefix: &str) -> Self {
        self.scripts
            .push((prefix.to_string(), Scripted::Timeout(Duration::from_secs(1))));
        self
    }

    pub fn reject(mut self, prefix: &str) -> Self {
        self.scripts.push((prefix.to_string(), Scripted::NotAllowed));
        self
    }

    /// Rendered command lines, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("lock").clone()
    }

    fn fake_pack(&self, args: &[String]) {
        let stem = format!("{}.{}", self.package, self.version);
        fs::write(self.dir.join(format!("{}.nupkg", stem)), b"nupkg").expect("write nupkg");
        if args.iter().any(|a| a == "--include-symbols") {
            fs::write(self.dir.join(format!("{}.snupkg", stem)), b"snupkg").expect("write snupkg");
        }
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, CommandError> {
        let line = format!("{} {}", program, args.join(" "));
        self.calls.lock().expect("lock").push(line.clone());

        if let Some((_, scripted)) = self.scripts.iter().find(|(p, _)| line.starts_with(p)) {
            return match scripted {
                Scripted::Output(output) => Ok(output.clone()),
                Scripted::Timeout(timeout) => Err(CommandError::Timeout(*timeout)),
                Scripted::NotAllowed => Err(CommandError::CommandNotAllowed(program.to_string())),
            };
        }

        if program == "dotnet" && args.first().map(String::as_str) == Some("pack") {
            self.fake_pack(args);
        }

        Ok(CommandOutput {
            exit_code: Some(0),
            stdout: format!("ok: {}", args.first().map(String::as_str).unwrap_or_default()),
            ..Default::default()
        })
    }
}

/// In-memory registry keyed by version string
#[derive(Default)]
pub struct FakeRegistry {
    versions: Mutex<Vec<String>>,
    forced: Mutex<Option<RegistryLookup>>,
    network_down: bool,
    lookups: Mutex<usize>,
}

impl FakeRegistry {
    pub fn with_versions(versions: &[&str]) -> Self {
        Self {
            versions: Mutex::new(versions.iter().map(|v| v.to_string()).collect()),
            ..Default::default()
        }
    }

    pub fn unreachable() -> Self {
        Self {
            network_down: true,
            ..Default::default()
        }
    }

    pub fn force(&self, lookup: RegistryLookup) {
        *self.forced.lock().expect("lock") = Some(lookup);
    }

    pub fn add_version(&self, version: &str) {
        self.versions.lock().expect("lock").push(version.to_string());
    }

    pub fn lookups(&self) -> usize {
        *self.lookups.lock().expect("lock")
    }
}

#[async_trait]
impl RegistryQuery for FakeRegistry {
    async fn lookup(
        &self,
        _package_id: &str,
        version: &ResolvedVersion,
    ) -> Result<RegistryLookup, PublishError> {
        *self.lookups.lock().expect("lock") += 1;

        if self.network_down {
            return Err(PublishError::NetworkError {
                url: "http://registry.invalid".to_string(),
                message: "connection refused".to_string(),
            });
        }
        if let Some(forced) = self.forced.lock().expect("lock").clone() {
            return Ok(forced);
        }

        let versions = self.versions.lock().expect("lock");
        if versions.iter().any(|v| v == version.as_str()) {
            Ok(RegistryLookup::Exists)
        } else {
            Ok(RegistryLookup::NotFound)
        }
    }
}
