//! # Error Handling
//!
//! This module defines the centralized error type for `helm-repo-updater`.
//! It uses the `thiserror` library to build an `Error` enum covering every
//! failure the update-commit-push pipeline can surface.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum. Variants fall into three groups:
//!   - pipeline-fatal errors (`UnsupportedRepository`, `TargetFileMissing`,
//!     `AllChangesFailed`, `GitCommand`, `Cancelled`), which abort the
//!     application being processed;
//!   - per-change errors (`InvalidChangeKey`, `PatchExecutionFailed`), which
//!     are recorded against a single change and absorbed by the aggregator;
//!   - configuration errors (`ConfigParse`, `Template`) raised before any
//!     repository is touched.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! A run where every change was a no-op is not an error; it is reported as a
//! skipped pipeline. Failing to remove a temporary directory is not an error
//! either; it is logged and ignored.

use thiserror::Error;

/// Main error type for helm-repo-updater operations
#[derive(Error, Debug)]
pub enum Error {
    /// The repository URL shape and the available credentials do not match.
    ///
    /// SSH-shaped URLs need a private key, HTTPS URLs need a username and a
    /// password. There is no fallback between the two modes.
    #[error("Unsupported repository {url}: {message}")]
    UnsupportedRepository { url: String, message: String },

    /// The application's target file does not exist in the working copy.
    #[error("Target file missing: {path}")]
    TargetFileMissing { path: String },

    /// A requested change key does not address a field.
    #[error("Invalid change key '{key}': {reason}")]
    InvalidChangeKey { key: String, reason: String },

    /// The external patch mechanism reported a failure for one change.
    #[error("Patch failed for key '{key}': {message}")]
    PatchExecutionFailed { key: String, message: String },

    /// Every change requested for an application failed.
    #[error("All {failed} change(s) failed for application {application}")]
    AllChangesFailed { application: String, failed: usize },

    /// A git command failed (init, fetch, checkout, commit, push, ...).
    #[error("Git command failed for {url}: {command} - {stderr}")]
    GitCommand {
        command: String,
        url: String,
        stderr: String,
    },

    /// An error occurred while parsing configuration.
    ///
    /// This error includes the specific parsing issue and optionally a hint
    /// about how to fix it.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// An error occurred during commit message template processing.
    ///
    /// May include the name of the problematic variable when applicable.
    #[error("Template processing error: {message}{}", variable.as_ref().map(|v| format!(" (variable: {})", v)).unwrap_or_default())]
    Template {
        message: String,
        /// The template variable that caused the error, if applicable
        variable: Option<String>,
    },

    /// An error occurred with a path-related operation.
    #[error("Path operation error: {message}")]
    Path { message: String },

    /// The caller cancelled the pipeline before the named step.
    #[error("Pipeline cancelled before {step}")]
    Cancelled { step: String },

    /// An error indicating that a mutex or other lock has been poisoned.
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// Whether this error is scoped to a single change rather than the
    /// whole pipeline.
    pub fn is_per_change(&self) -> bool {
        matches!(
            self,
            Error::InvalidChangeKey { .. } | Error::PatchExecutionFailed { .. }
        )
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
