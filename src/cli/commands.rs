//! CLI command definitions for image-matrix.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser};
use serde::Serialize;
use tracing::info;

use crate::execution::DockerCli;
use crate::matrix::{ImageDescriptor, MatrixFilters, MatrixProvider, DEFAULT_REPO_OWNER};
use crate::update::{run_update, GitHubPullRequestSubmitter, UpdateOptions};
use crate::verification::{
    build_image_defaults, runtime_image_defaults, CaseStatus, ContainerPlatform,
    EnvironmentVariable, Flow, VerificationEngine, VerificationReport, VerificationSettings,
};

/// Default location of the app build contexts.
const DEFAULT_PROJECTS_DIR: &str = "projects";

/// Default versions manifest updated by `update-dependencies`.
const DEFAULT_MANIFEST: &str = "manifest.versions.json";

/// Verification and maintenance tooling for .NET Framework container images.
#[derive(Parser)]
#[command(name = "image-matrix")]
#[command(about = "Verify .NET Framework container images and maintain their date stamps")]
#[command(version)]
#[command(
    long_about = "image-matrix builds and runs test apps on every selected image variant, checks \
environment variables and NGEN queues, and updates image date stamps.\n\nExample usage:\n  \
IMAGE_OS_FILTER='*1709*' image-matrix verify --jobs 2\n  \
image-matrix update-dependencies --datestamp-all 20240312"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Print the selected image matrix with its base image tags.
    #[command(alias = "ls")]
    List(ListArgs),

    /// Build, run and inspect images for every selected matrix entry.
    ///
    /// Each entry runs the app, web-app, environment and NGEN flows. A failing
    /// flow is reported and the remaining flows and entries still run.
    Verify(VerifyArgs),

    /// Update image date stamps and optionally open a pull request.
    #[command(name = "update-dependencies", alias = "update")]
    UpdateDependencies(UpdateDependenciesArgs),
}

/// Matrix selection shared by `list` and `verify`.
#[derive(clap::Args, Debug)]
pub struct MatrixArgs {
    /// Glob over OS variants (e.g. "*1709*"). Falls back to IMAGE_OS_FILTER.
    #[arg(long)]
    pub os_filter: Option<String>,

    /// Glob over runtime versions (e.g. "4.7*"). Falls back to IMAGE_VERSION_FILTER.
    #[arg(long)]
    pub version_filter: Option<String>,

    /// Namespace prefix of the base image tags.
    #[arg(long, env = "REPO_OWNER", default_value = DEFAULT_REPO_OWNER)]
    pub repo_owner: String,

    /// YAML or JSON file listing the matrix (default: built-in matrix).
    #[arg(long)]
    pub matrix: Option<PathBuf>,
}

impl MatrixArgs {
    /// Compiles the filters; a flag takes precedence over its environment variable.
    fn filters(&self) -> anyhow::Result<MatrixFilters> {
        Ok(MatrixFilters::from_env()?
            .with_overrides(self.os_filter.as_deref(), self.version_filter.as_deref())?)
    }

    fn provider(&self) -> anyhow::Result<MatrixProvider> {
        match &self.matrix {
            Some(path) => MatrixProvider::from_file(path)
                .with_context(|| format!("Failed to load matrix from {}", path.display())),
            None => Ok(MatrixProvider::builtin()),
        }
    }

    fn select(&self) -> anyhow::Result<Vec<ImageDescriptor>> {
        Ok(self.provider()?.select(&self.filters()?))
    }
}

/// Arguments for `image-matrix list`.
#[derive(Parser, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub matrix: MatrixArgs,

    /// Output JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `image-matrix verify`.
#[derive(Parser, Debug)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub matrix: MatrixArgs,

    /// Directory containing `dotnetapp-{version}` and `webapp-{version}` build contexts.
    #[arg(long, default_value = DEFAULT_PROJECTS_DIR)]
    pub projects_dir: PathBuf,

    /// Containers use Linux shell syntax instead of the Windows command interpreter.
    #[arg(
        long,
        env = "LINUX_CONTAINERS_ENABLED",
        action = ArgAction::SetTrue,
        value_parser = FalseyValueParser::new()
    )]
    pub linux_containers: bool,

    /// Flows to run (comma-separated). Defaults to all flows.
    #[arg(long, value_enum, value_delimiter = ',')]
    pub flow: Vec<Flow>,

    /// Extra runtime image variable: NAME=VALUE for an exact value, NAME for any value.
    #[arg(
        long = "expect-runtime-env",
        value_name = "NAME[=VALUE]",
        value_parser = EnvironmentVariable::parse
    )]
    pub expect_runtime_env: Vec<EnvironmentVariable>,

    /// Extra build image variable: NAME=VALUE for an exact value, NAME for any value.
    #[arg(
        long = "expect-build-env",
        value_name = "NAME[=VALUE]",
        value_parser = EnvironmentVariable::parse
    )]
    pub expect_build_env: Vec<EnvironmentVariable>,

    /// Drop the built-in environment expectations.
    #[arg(long)]
    pub no_default_env: bool,

    /// Matrix entries verified concurrently.
    #[arg(long, default_value = "1")]
    pub jobs: usize,

    /// Timeout in seconds for each container engine call.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Container engine CLI binary.
    #[arg(long, default_value = "docker")]
    pub docker_binary: String,

    /// Output JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

impl VerifyArgs {
    fn settings(&self) -> VerificationSettings {
        let (mut runtime_env, mut build_env) = if self.no_default_env {
            (Vec::new(), Vec::new())
        } else {
            (runtime_image_defaults(), build_image_defaults())
        };
        runtime_env.extend(self.expect_runtime_env.iter().cloned());
        build_env.extend(self.expect_build_env.iter().cloned());

        VerificationSettings {
            repo_owner: self.matrix.repo_owner.clone(),
            projects_dir: self.projects_dir.clone(),
            platform: ContainerPlatform::from_linux_enabled(self.linux_containers),
            flows: if self.flow.is_empty() {
                Flow::ALL.to_vec()
            } else {
                self.flow.clone()
            },
            runtime_env,
            build_env,
        }
    }

    fn docker(&self) -> DockerCli {
        let docker = DockerCli::new().with_binary(&self.docker_binary);
        match self.timeout_secs {
            Some(secs) => docker.with_timeout(Duration::from_secs(secs)),
            None => docker,
        }
    }
}

/// Arguments for `image-matrix update-dependencies`.
#[derive(Parser, Debug)]
pub struct UpdateDependenciesArgs {
    /// Tag date stamp to assign to all image types.
    #[arg(long)]
    pub datestamp_all: Option<String>,

    /// Tag date stamp to assign to runtime image types (overrides datestamp-all).
    #[arg(long)]
    pub datestamp_runtime: Option<String>,

    /// Tag date stamp to assign to SDK image types (overrides datestamp-all).
    #[arg(long)]
    pub datestamp_sdk: Option<String>,

    /// Tag date stamp to assign to ASP.NET image types (overrides datestamp-all).
    #[arg(long)]
    pub datestamp_aspnet: Option<String>,

    /// Tag date stamp to assign to WCF image types (overrides datestamp-all).
    #[arg(long)]
    pub datestamp_wcf: Option<String>,

    /// GitHub email used to make PR (if not specified, a PR will not be created).
    #[arg(long)]
    pub email: Option<String>,

    /// GitHub password used to make PR (if not specified, a PR will not be created).
    #[arg(long, env = "GITHUB_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// GitHub user used to make PR (if not specified, a PR will not be created).
    #[arg(long)]
    pub user: Option<String>,

    /// Versions manifest to update.
    #[arg(long, default_value = DEFAULT_MANIFEST)]
    pub manifest: PathBuf,

    /// Output JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

impl From<&UpdateDependenciesArgs> for UpdateOptions {
    fn from(args: &UpdateDependenciesArgs) -> Self {
        Self {
            datestamp_all: args.datestamp_all.clone(),
            datestamp_runtime: args.datestamp_runtime.clone(),
            datestamp_sdk: args.datestamp_sdk.clone(),
            datestamp_aspnet: args.datestamp_aspnet.clone(),
            datestamp_wcf: args.datestamp_wcf.clone(),
            email: args.email.clone(),
            password: args.password.clone(),
            user: args.user.clone(),
        }
    }
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::List(args) => run_list_command(args),
        Commands::Verify(args) => run_verify_command(args).await,
        Commands::UpdateDependencies(args) => run_update_command(args).await,
    }
}

// ============================================================================
// List
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListEntry {
    #[serde(flatten)]
    descriptor: ImageDescriptor,
    base_build_image: String,
    base_runtime_image: String,
}

fn list_entries(descriptors: &[ImageDescriptor], repo_owner: &str) -> Vec<ListEntry> {
    descriptors
        .iter()
        .map(|d| ListEntry {
            descriptor: d.clone(),
            base_build_image: d.base_build_image(repo_owner),
            base_runtime_image: d.base_runtime_image(repo_owner),
        })
        .collect()
}

fn run_list_command(args: ListArgs) -> anyhow::Result<()> {
    let selected = args.matrix.select()?;
    let entries = list_entries(&selected, &args.matrix.repo_owner);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No matrix entries match the active filters.");
        return Ok(());
    }
    for entry in &entries {
        println!("{}", entry.descriptor);
        println!("    build:   {}", entry.base_build_image);
        println!("    runtime: {}", entry.base_runtime_image);
    }
    Ok(())
}

// ============================================================================
// Verify
// ============================================================================

async fn run_verify_command(args: VerifyArgs) -> anyhow::Result<()> {
    let selected = args.matrix.select()?;
    if selected.is_empty() {
        info!("No matrix entries match the active filters; nothing to verify");
    }

    let engine = VerificationEngine::new(args.docker(), args.settings());
    let report = engine.verify_matrix(&selected, args.jobs).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if !report.success() {
        anyhow::bail!("{} verification case(s) failed", report.failed);
    }
    Ok(())
}

fn print_report(report: &VerificationReport) {
    for case in &report.cases {
        let marker = match case.status {
            CaseStatus::Passed => "✅",
            CaseStatus::Failed => "❌",
            CaseStatus::Skipped => "⏭️",
        };
        println!(
            "{marker} {:<12} {} ({} ms)",
            case.flow.to_string(),
            case.descriptor,
            case.duration_ms
        );
        if let Some(failure) = &case.failure {
            println!("      {failure}");
        }
        if let Some(warning) = &case.cleanup_warning {
            println!("      cleanup: {warning}");
        }
    }
    println!(
        "\n{} entries: {} passed, {} failed, {} skipped",
        report.descriptors, report.passed, report.failed, report.skipped
    );
}

// ============================================================================
// Update dependencies
// ============================================================================

async fn run_update_command(args: UpdateDependenciesArgs) -> anyhow::Result<()> {
    let options = UpdateOptions::from(&args);
    let submitter = options.credentials().map(GitHubPullRequestSubmitter::new);
    if submitter.is_none() {
        info!("GitHub credentials incomplete; updating files only");
    }

    let outcome = run_update(
        &args.manifest,
        &options,
        submitter
            .as_ref()
            .map(|s| s as &dyn crate::update::PullRequestSubmitter),
    )
    .await
    .with_context(|| format!("Failed to update {}", args.manifest.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    if outcome.changes.is_empty() {
        println!("Date stamps already up to date.");
    }
    for change in &outcome.changes {
        println!(
            "{}: {} -> {}",
            change.variable,
            change.previous.as_deref().unwrap_or("(unset)"),
            change.updated
        );
    }
    if let Some(url) = &outcome.pull_request {
        println!("\n📁 Pull request: {url}");
    }
    Ok(())
}
