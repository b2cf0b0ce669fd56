//! # Validate Command Implementation
//!
//! This module implements the `validate` subcommand, which checks a batch file
//! without touching any repository.
//!
//! ## Functionality
//!
//! - **File Validation**: Parses the batch file and checks its structure.
//! - **Key Validation**: Checks that every change key addresses a field.
//! - **Template Validation**: Parses the commit message template, if any.
//! - **Repository Validation**: Checks that the repository URL is SSH- or
//!   HTTPS-shaped.
//!
//! This command is a safe, read-only operation.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use helm_repo_updater::config;
use helm_repo_updater::credentials::{is_https_url, is_ssh_url};
use helm_repo_updater::output::{emoji, OutputConfig};
use helm_repo_updater::yaml_path;

/// Check a batch file without touching any repository
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the batch file to validate
    #[arg(short, long, value_name = "FILE")]
    pub config: PathBuf,
}

/// Execute the `validate` command.
pub fn execute(args: ValidateArgs, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    println!(
        "{} Validating batch file: {}",
        emoji(&out, "🔍", "[SCAN]"),
        args.config.display()
    );

    let batch = match config::from_file(&args.config) {
        Ok(batch) => {
            println!("{} Batch file parsed successfully", emoji(&out, "✅", "[OK]"));
            batch
        }
        Err(e) => {
            println!("{} Batch file parsing failed: {}", emoji(&out, "❌", "[ERR]"), e);
            return Err(anyhow::anyhow!("Batch file parsing failed: {}", e));
        }
    };

    let mut has_errors = false;

    let url = batch.repo.url.trim();
    if is_ssh_url(url) {
        println!("{} Repository {} (ssh)", emoji(&out, "✅", "[OK]"), url);
    } else if is_https_url(url) {
        println!("{} Repository {} (https)", emoji(&out, "✅", "[OK]"), url);
    } else {
        println!(
            "{} Repository {} is neither an SSH nor an HTTPS URL",
            emoji(&out, "❌", "[ERR]"),
            url
        );
        has_errors = true;
    }

    let mut total_changes = 0;
    for app in &batch.applications {
        total_changes += app.changes.len();
        if app.changes.is_empty() {
            println!(
                "{} {}: no changes listed",
                emoji(&out, "⚠️", "[WARN]"),
                app.name
            );
        }
        for change in &app.changes {
            if let Err(e) = yaml_path::parse_key(&change.key) {
                println!("{} {}: {}", emoji(&out, "❌", "[ERR]"), app.name, e);
                has_errors = true;
            }
        }
    }

    println!("\n{} Batch Summary:", emoji(&out, "📊", "[INFO]"));
    println!("   Applications: {}", batch.applications.len());
    println!("   Changes: {}", total_changes);
    println!(
        "   Commit message: {}",
        if batch.repo.commit_message.is_some() {
            "custom template"
        } else {
            "default template"
        }
    );

    if has_errors {
        return Err(anyhow::anyhow!("Batch file validation failed"));
    }

    println!("\n{} Batch file is valid", emoji(&out, "✅", "[OK]"));
    Ok(())
}
