//! # Run Command Implementation
//!
//! This module implements the `run` subcommand, which updates a single
//! application. Everything the pipeline needs is given on the command line:
//!
//! ```bash
//! helm-repo-updater run \
//!     --app-name api \
//!     --file api/values.yaml \
//!     --change .image.tag=v1.2.3 \
//!     --repo-url https://github.com/org/deploy.git \
//!     --branch main
//! ```

use anyhow::{Context, Result};
use clap::Args;
use std::fs;
use std::path::PathBuf;

use helm_repo_updater::change::Change;
use helm_repo_updater::config::{PipelineConfig, RepoConf};
use helm_repo_updater::message::CommitTemplate;

use super::{CredentialArgs, ExecutionArgs};

/// Update one application and push the result
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Name of the application, used in logs and the commit message
    #[arg(long, value_name = "NAME")]
    pub app_name: String,

    /// Target file, relative to --repo-path
    #[arg(long, value_name = "FILE")]
    pub file: String,

    /// A change to apply, as KEY=VALUE (repeatable)
    #[arg(
        long = "change",
        value_name = "KEY=VALUE",
        required = true,
        value_parser = Change::parse_assignment
    )]
    pub changes: Vec<Change>,

    /// Repository URL (SSH or HTTPS)
    #[arg(long, value_name = "URL", env = "GIT_REPO_URL")]
    pub repo_url: String,

    /// Branch to update; empty or HEAD uses the remote default branch
    #[arg(long, value_name = "BRANCH", default_value = "")]
    pub branch: String,

    /// Base directory inside the repository
    #[arg(long, value_name = "DIR", default_value = "")]
    pub repo_path: String,

    /// File holding a commit message template
    #[arg(long, value_name = "FILE")]
    pub commit_message_file: Option<PathBuf>,

    #[command(flatten)]
    pub credentials: CredentialArgs,

    #[command(flatten)]
    pub execution: ExecutionArgs,
}

impl RunArgs {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let commit_template = match &self.commit_message_file {
            Some(path) => {
                let source = fs::read_to_string(path).with_context(|| {
                    format!("could not read commit message template {}", path.display())
                })?;
                CommitTemplate::parse(&source)?
            }
            None => CommitTemplate::default(),
        };

        Ok(PipelineConfig {
            application_name: self.app_name.clone(),
            target_file: self.file.clone(),
            changes: self.changes.clone(),
            credentials: self.credentials.bundle()?,
            repo: RepoConf {
                repo_url: self.repo_url.trim().to_string(),
                branch: self.branch.trim().to_string(),
                path: self.repo_path.trim().to_string(),
                commit_template,
            },
            dry_run: self.execution.dry_run,
        })
    }
}

/// Execute the `run` command.
pub fn execute(args: RunArgs, color_flag: &str) -> Result<()> {
    let config = args.pipeline_config()?;
    super::run_and_report(&[config], &args.execution, 1, color_flag)
}
