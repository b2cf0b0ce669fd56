//! # Helm Repository Updater CLI
//!
//! This is the binary entry point for the `helm-repo-updater` command-line tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Executing the appropriate command based on the parsed arguments.
//! - Turning failed applications into a non-zero exit status.
//!
//! The pipeline itself lives in the `helm_repo_updater` library; the binary
//! only wires flags, environment variables and output around it.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
