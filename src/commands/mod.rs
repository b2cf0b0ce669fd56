//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `helm-repo-updater` command-line tool. Each subcommand is defined in its
//! own file.
//!
//! ## Structure
//!
//! Each command module contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and performs the
//!   command's logic by calling into the `helm_repo_updater` library.
//!
//! Arguments shared by `run` and `batch` (credentials, patch backend, output
//! format) are defined here and flattened into both.

pub mod batch;
pub mod completions;
pub mod run;
pub mod validate;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use helm_repo_updater::cancel::CancellationToken;
use helm_repo_updater::config::{PatchBackend, PipelineConfig};
use helm_repo_updater::credentials::CredentialBundle;
use helm_repo_updater::git::CommandGitClientFactory;
use helm_repo_updater::output::{self, OutputConfig};
use helm_repo_updater::patch::{BuiltinPatch, PatchEngine, PatchMechanism, YqPatch};
use helm_repo_updater::pipeline::Pipeline;
use helm_repo_updater::runner::{self, RunSummary};

/// Git credentials, read from flags or the environment
#[derive(Args, Debug, Clone)]
pub struct CredentialArgs {
    /// Username for HTTPS repositories (also the committer name)
    #[arg(long, value_name = "NAME", env = "GIT_USERNAME")]
    pub git_username: Option<String>,

    /// Password or token for HTTPS repositories
    #[arg(long, value_name = "TOKEN", env = "GIT_PASSWORD", hide_env_values = true)]
    pub git_password: Option<String>,

    /// Committer e-mail address
    #[arg(long, value_name = "EMAIL", env = "GIT_EMAIL")]
    pub git_email: Option<String>,

    /// Private key file for SSH repositories
    #[arg(long, value_name = "FILE", env = "GIT_SSH_KEY_FILE")]
    pub ssh_key_file: Option<PathBuf>,
}

impl CredentialArgs {
    /// Build the credential bundle, reading the SSH key file if one is given
    pub fn bundle(&self) -> Result<CredentialBundle> {
        let ssh_private_key = match &self.ssh_key_file {
            Some(path) => fs::read_to_string(path)
                .with_context(|| format!("could not read SSH key file {}", path.display()))?,
            None => String::new(),
        };
        Ok(CredentialBundle {
            username: self.git_username.clone().unwrap_or_default(),
            password: self.git_password.clone().unwrap_or_default(),
            email: self.git_email.clone().unwrap_or_default(),
            ssh_private_key,
        })
    }
}

/// Patch backend choices on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliPatchBackend {
    /// Run the external `yq` binary (keeps comments)
    Yq,
    /// Edit YAML in-process (drops comments)
    Builtin,
}

impl From<CliPatchBackend> for PatchBackend {
    fn from(backend: CliPatchBackend) -> Self {
        match backend {
            CliPatchBackend::Yq => PatchBackend::Yq,
            CliPatchBackend::Builtin => PatchBackend::Builtin,
        }
    }
}

/// Report format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Options controlling how pipelines run and report
#[derive(Args, Debug, Clone)]
pub struct ExecutionArgs {
    /// Apply changes and render the commit message, but do not commit or push
    #[arg(long)]
    pub dry_run: bool,

    /// How target files are edited
    #[arg(long, value_enum, default_value = "yq")]
    pub patch_backend: CliPatchBackend,

    /// Path to the yq binary
    #[arg(long, value_name = "PATH", default_value = "yq", env = "YQ_BINARY")]
    pub yq_binary: PathBuf,

    /// Report format
    #[arg(long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

impl ExecutionArgs {
    /// A pipeline using the system git and the selected patch backend
    pub fn pipeline(&self) -> Pipeline {
        let mechanism: Arc<dyn PatchMechanism> = match PatchBackend::from(self.patch_backend) {
            PatchBackend::Yq => Arc::new(YqPatch::with_binary(self.yq_binary.clone())),
            PatchBackend::Builtin => Arc::new(BuiltinPatch),
        };
        Pipeline::new(Arc::new(CommandGitClientFactory), PatchEngine::new(mechanism))
    }
}

/// Run `configs`, print the report and fail if any application failed
pub fn run_and_report(
    configs: &[PipelineConfig],
    execution: &ExecutionArgs,
    jobs: usize,
    color_flag: &str,
) -> Result<()> {
    let pipeline = execution.pipeline();
    // Never cancelled here; interrupts end the process
    let summary = runner::update_applications(configs, &pipeline, jobs, &CancellationToken::new());
    print_summary(&summary, execution.output, color_flag)?;

    if !summary.is_success() {
        anyhow::bail!(
            "{} of {} application(s) failed",
            summary.failures.len(),
            configs.len()
        );
    }
    Ok(())
}

fn print_summary(summary: &RunSummary, format: OutputFormat, color_flag: &str) -> Result<()> {
    match format {
        OutputFormat::Text => {
            let out = OutputConfig::from_env_and_flag(color_flag);
            print!("{}", output::render_text(summary, &out));
        }
        OutputFormat::Json => println!("{}", output::render_json(summary)?),
    }
    Ok(())
}
