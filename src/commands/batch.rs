//! # Batch Command Implementation
//!
//! This module implements the `batch` subcommand, which updates every
//! application listed in a batch file. Applications are processed by a pool
//! of `--jobs` workers; applications in the same repository are still
//! committed one at a time.

use anyhow::{Context, Result};
use clap::Args;
use log::info;
use std::path::PathBuf;

use helm_repo_updater::config;

use super::{CredentialArgs, ExecutionArgs};

/// Update every application listed in a batch file
#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Path to the batch file
    #[arg(short, long, value_name = "FILE")]
    pub config: PathBuf,

    /// Number of applications processed in parallel
    #[arg(short, long, value_name = "N", default_value_t = 4)]
    pub jobs: usize,

    #[command(flatten)]
    pub credentials: CredentialArgs,

    #[command(flatten)]
    pub execution: ExecutionArgs,
}

/// Execute the `batch` command.
pub fn execute(args: BatchArgs, color_flag: &str) -> Result<()> {
    let batch = config::from_file(&args.config)
        .with_context(|| format!("could not load batch file {}", args.config.display()))?;
    let credentials = args.credentials.bundle()?;
    let configs = batch.pipeline_configs(&credentials, args.execution.dry_run)?;

    info!(
        "updating {} application(s) in {} with {} worker(s)",
        configs.len(),
        batch.repo.url,
        args.jobs
    );
    super::run_and_report(&configs, &args.execution, args.jobs, color_flag)
}
