//! NuGet Publisher CLI
//!
//! Publishes a NuGet package when its version is not yet on the registry

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use nuget_publisher::{
    CheckReport, ConfigLoadOptions, ConfigLoader, ConfigOverrides, FlatContainerClient,
    PublishConfig, PublishError, PublishOutcome, PublishPipeline, PublishReport, RegistryLookup,
    SafeCommandExecutor,
};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Publish a NuGet package when its version is new
#[derive(Parser)]
#[command(name = "nuget-publisher")]
#[command(version)]
#[command(about = "Publish a NuGet package when its version is new", long_about = None)]
struct Cli {
    /// Log level; RUST_LOG is used when not given
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the version, query the registry and publish if needed
    Publish {
        #[command(flatten)]
        config: ConfigArgs,

        /// Print the final report as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Validate and query the registry without running any command
    Check {
        #[command(flatten)]
        config: ConfigArgs,

        /// Print the check result as JSON on stdout
        #[arg(long)]
        json: bool,
    },
}

/// Settings shared by every subcommand; secrets come from the environment only
#[derive(Args)]
struct ConfigArgs {
    /// YAML config file (defaults to .nuget-publish.yaml in the working directory)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory packages are produced in
    #[arg(long, value_name = "DIR")]
    working_dir: Option<PathBuf>,

    /// Project file to build and pack
    #[arg(long, value_name = "FILE")]
    project: Option<PathBuf>,

    /// Package id on the registry
    #[arg(long)]
    package_name: Option<String>,

    /// File the version is extracted from (defaults to the project file)
    #[arg(long, value_name = "FILE")]
    version_file: Option<PathBuf>,

    /// Use this version instead of extracting it
    #[arg(long = "version-static", value_name = "VERSION")]
    version_static: Option<String>,

    /// Extraction pattern; the first capture group is the version
    #[arg(long, value_name = "REGEX")]
    version_regex: Option<String>,

    /// NuGet source base URL
    #[arg(long, value_name = "URL")]
    source: Option<String>,

    /// Also produce a .snupkg symbol package
    #[arg(long)]
    include_symbols: bool,

    /// Skip `dotnet build`
    #[arg(long)]
    no_build: bool,

    /// Create and push a git tag after publishing
    #[arg(long)]
    tag_commit: bool,

    /// Tag name template; `*` is replaced by the version
    #[arg(long, value_name = "TEMPLATE")]
    tag_format: Option<String>,

    /// Certificate used to sign the package
    #[arg(long, value_name = "FILE")]
    certificate_path: Option<PathBuf>,

    /// Registry request timeout in seconds
    #[arg(long, value_name = "SECS")]
    http_timeout: Option<u64>,

    /// Per-command timeout in seconds
    #[arg(long, value_name = "SECS")]
    command_timeout: Option<u64>,
}

impl ConfigArgs {
    /// Flags only override lower layers when given
    fn into_load_options(self) -> Result<ConfigLoadOptions> {
        let working_dir = match self.working_dir.clone() {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };

        let cli = ConfigOverrides {
            project_file: self.project,
            package_id: self.package_name,
            version_file: self.version_file,
            version: self.version_static,
            version_pattern: self.version_regex,
            registry_url: self.source,
            include_symbols: self.include_symbols.then_some(true),
            no_build: self.no_build.then_some(true),
            tag_commit: self.tag_commit.then_some(true),
            tag_template: self.tag_format,
            certificate_path: self.certificate_path,
            working_dir: self.working_dir,
            http_timeout: self.http_timeout.map(Duration::from_secs),
            command_timeout: self.command_timeout.map(Duration::from_secs),
            ..Default::default()
        };

        Ok(ConfigLoadOptions {
            working_dir,
            config_file: self.config,
            env: std::env::vars().collect(),
            cli,
        })
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Logs go to stderr; with `--json` stdout carries only the report
fn initialize_tracing(log_level: Option<LogLevel>) {
    let filter = match log_level {
        Some(level) => EnvFilter::new(level.to_filter_directive()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    initialize_tracing(cli.log_level);

    match run(cli.command).await {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("\n❌ Error");
            match e.downcast_ref::<PublishError>() {
                Some(publish_error) => print_publish_error(publish_error),
                None => eprintln!("{}", e),
            }
            process::exit(1);
        }
    }
}

async fn run(command: Commands) -> Result<i32> {
    match command {
        Commands::Publish { config, json } => {
            let config = ConfigLoader::load(config.into_load_options()?).await?;
            publish_command(config, json).await
        }
        Commands::Check { config, json } => {
            let config = ConfigLoader::load(config.into_load_options()?).await?;
            check_command(config, json).await
        }
    }
}

fn print_publish_error(error: &PublishError) {
    eprintln!("[{}] {}", error.code(), error);
    if error.leaves_partial_state() {
        eprintln!("⚠️  The working directory or repository may be partially updated");
    }
    eprintln!("\n💡 Suggested actions:");
    for action in error.suggested_actions() {
        eprintln!("  - {}", action);
    }
}

async fn publish_command(config: PublishConfig, json: bool) -> Result<i32> {
    if !json {
        println!("\n📦 nuget-publisher\n");
    }

    let registry = FlatContainerClient::new(&config.registry_url, config.http_timeout)?;
    let mut executor = SafeCommandExecutor::new(&config.working_dir)?;
    executor.set_timeout(config.command_timeout);

    let report = PublishPipeline::new(&registry, &executor).run(config).await?;

    print!("{}", render_publish_report(&report, json)?);
    Ok(0)
}

fn render_publish_report(report: &PublishReport, json: bool) -> Result<String> {
    if json {
        return Ok(format!("{}\n", serde_json::to_string_pretty(report)?));
    }

    let mut out = String::new();
    writeln!(out, "📋 {} {}", report.package_id, report.version)?;
    if let RegistryLookup::Ambiguous { ref reason } = report.lookup {
        writeln!(out, "  ⚠️  Registry answer was ambiguous ({}), published anyway", reason)?;
    }

    for step in &report.steps {
        writeln!(out, "  ✅ {:<10} {} ({}ms)", step.step, step.detail, step.duration_ms)?;
    }

    match report.outcome {
        PublishOutcome::Published {
            ref packages,
            ref tag,
        } => {
            writeln!(out, "\n✅ Published {} to {}", packages.join(", "), report.registry_url)?;
            if let Some(tag) = tag {
                writeln!(out, "🏷️  Tagged {}", tag)?;
            }
        }
        PublishOutcome::AlreadyPublished => {
            writeln!(out, "\n✅ Version {} is already published, nothing to do", report.version)?;
        }
        PublishOutcome::SkippedNoApiKey => {
            writeln!(out, "\n⚠️  NUGET_KEY not given, nothing was published")?;
        }
    }
    writeln!(out, "    Duration: {}ms", report.duration_ms)?;
    Ok(out)
}

async fn check_command(config: PublishConfig, json: bool) -> Result<i32> {
    if !json {
        println!("\n🔍 Package Check\n");
    }

    let registry = FlatContainerClient::new(&config.registry_url, config.http_timeout)?;
    let report = PublishPipeline::check(&registry, config).await?;

    print!("{}", render_check_report(&report, json)?);
    Ok(0)
}

fn render_check_report(report: &CheckReport, json: bool) -> Result<String> {
    if json {
        return Ok(format!("{}\n", serde_json::to_string_pretty(report)?));
    }

    let mut out = String::new();
    writeln!(out, "  ✅ Configuration valid")?;
    writeln!(out, "  ✅ Version: {}", report.version)?;

    match report.lookup {
        RegistryLookup::Exists => writeln!(
            out,
            "  ✅ {} {} is already on {}",
            report.package_id, report.version, report.registry_url
        )?,
        RegistryLookup::NotFound => writeln!(
            out,
            "  📤 {} {} would be published",
            report.package_id, report.version
        )?,
        RegistryLookup::Ambiguous { ref reason } => writeln!(
            out,
            "  ⚠️  Registry answer was ambiguous ({}); {} {} would be published",
            reason, report.package_id, report.version
        )?,
    }

    if report.would_publish && !report.can_push {
        writeln!(out, "  ⚠️  NUGET_KEY not given, publish would be skipped")?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use nuget_publisher::PublishStep;
    use nuget_publisher::orchestration::StepRecord;

    fn check_report() -> CheckReport {
        CheckReport {
            package_id: "Foo.Bar".to_string(),
            version: "1.0.2".to_string(),
            registry_url: "https://api.nuget.org".to_string(),
            lookup: RegistryLookup::NotFound,
            would_publish: true,
            can_push: false,
        }
    }

    fn publish_report() -> PublishReport {
        PublishReport {
            package_id: "Foo.Bar".to_string(),
            version: "1.0.2".to_string(),
            registry_url: "https://api.nuget.org".to_string(),
            lookup: RegistryLookup::Ambiguous {
                reason: "status 503".to_string(),
            },
            outcome: PublishOutcome::Published {
                packages: vec!["Foo.Bar.1.0.2.nupkg".to_string()],
                tag: Some("v1.0.2".to_string()),
            },
            steps: vec![StepRecord {
                step: PublishStep::Push,
                detail: "dotnet nuget push Foo.Bar.1.0.2.nupkg".to_string(),
                duration_ms: 12,
            }],
            duration_ms: 40,
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_check_json_is_only_the_report() {
        let out = render_check_report(&check_report(), true).unwrap();
        assert!(out.starts_with('{'));
        assert!(!out.contains("Package Check"));

        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["package_id"], "Foo.Bar");
        assert_eq!(value["lookup"]["status"], "not_found");
        assert_eq!(value["would_publish"], true);
    }

    #[test]
    fn test_publish_json_is_only_the_report() {
        let out = render_publish_report(&publish_report(), true).unwrap();
        assert!(out.starts_with('{'));
        assert!(!out.contains("nuget-publisher\n"));

        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["version"], "1.0.2");
        assert_eq!(value["steps"][0]["step"], "push");
    }

    #[test]
    fn test_text_reports() {
        let out = render_check_report(&check_report(), false).unwrap();
        assert!(out.contains("Foo.Bar 1.0.2 would be published"));
        assert!(out.contains("NUGET_KEY not given"));

        let out = render_publish_report(&publish_report(), false).unwrap();
        assert!(out.contains("ambiguous (status 503)"));
        assert!(out.contains("Tagged v1.0.2"));
    }
}
