//! # Run Output
//!
//! Rendering of [`RunSummary`] values for the terminal, either as
//! human-readable text or as JSON for scripts.
//!
//! Text output uses emoji markers when the terminal supports color. The
//! decision follows the `--color` flag first, then the usual environment
//! conventions: `NO_COLOR`, `CLICOLOR=0`, `CLICOLOR_FORCE=1` and `TERM=dumb`.

use std::env;
use std::fmt::Write;

use crate::change::ChangeStatus;
use crate::runner::RunSummary;

/// Whether text output may use color and emoji
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub use_color: bool,
}

impl OutputConfig {
    /// Build from the `--color` flag (`always`, `never` or `auto`)
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::terminal_supports_color(),
        };
        Self { use_color }
    }

    fn terminal_supports_color() -> bool {
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }
        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }
        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }
        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }
        console::Term::stdout().features().colors_supported()
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Pick `emoji_str` when color is enabled, `plain` otherwise
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

/// Human-readable report of a run
pub fn render_text(summary: &RunSummary, config: &OutputConfig) -> String {
    let mut out = String::new();

    for report in &summary.reports {
        let _ = writeln!(
            out,
            "{} {} ({} on {}): {}",
            emoji(config, "✅", "[OK]"),
            report.application,
            report.repository,
            report.branch,
            report.status
        );
        for change in &report.changes {
            let line = match &change.status {
                ChangeStatus::Applied { old_value } => {
                    format!("updated {} '{}' -> '{}'", change.key, old_value, change.new_value)
                }
                ChangeStatus::NoOp => format!("unchanged {} = '{}'", change.key, change.new_value),
                ChangeStatus::Failed { error } => format!("failed {}: {}", change.key, error),
            };
            let _ = writeln!(out, "   {}", line);
        }
    }

    for failure in &summary.failures {
        let _ = writeln!(
            out,
            "{} {}: {}",
            emoji(config, "❌", "[ERR]"),
            failure.application,
            failure.error
        );
    }

    let totals = &summary.totals;
    let _ = writeln!(
        out,
        "\n{} {} application(s) processed, {} of {} change(s) applied, {} skipped, {} error(s)",
        emoji(config, "📊", "[INFO]"),
        totals.applications_processed,
        totals.images_updated,
        totals.images_considered,
        totals.skipped,
        totals.errors
    );
    out
}

/// Pretty-printed JSON report of a run
pub fn render_json(summary: &RunSummary) -> serde_json::Result<String> {
    serde_json::to_string_pretty(summary)
}
