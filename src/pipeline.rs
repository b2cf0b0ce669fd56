//! # Update-commit-push pipeline
//!
//! [`Pipeline::run`] takes one application from configuration to a pushed
//! commit. It walks these states, logging each transition:
//!
//! ```text
//! Idle -> Locked -> Initialized -> Fetched -> CheckedOut -> Patched -> Committed -> Pushed -> Done
//!                                                              |
//!                                                              +-> Skipped (nothing changed)
//! ```
//!
//! Any unrecoverable failure ends in `Aborted`. The repository lock, the
//! working copy and the commit message file are scoped values, so they are
//! released on every exit path, in reverse order of acquisition: the working
//! copy is gone before the next pipeline for the same repository may start.

use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info, trace, warn};
use serde::Serialize;

use crate::aggregate::{ChangeAggregator, Decision};
use crate::cancel::CancellationToken;
use crate::change::ChangeOutcome;
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::git::{self, CommitOptions, GitClientFactory, ORIGIN};
use crate::lock::RepositoryLockRegistry;
use crate::message;
use crate::patch::PatchEngine;
use crate::path;
use crate::workdir::WorkingCopy;

/// Pipeline states, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Locked,
    Initialized,
    Fetched,
    CheckedOut,
    Patched,
    Committed,
    Pushed,
    Done,
    Skipped,
    Aborted,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Locked => "locked",
            PipelineState::Initialized => "initialized",
            PipelineState::Fetched => "fetched",
            PipelineState::CheckedOut => "checked-out",
            PipelineState::Patched => "patched",
            PipelineState::Committed => "committed",
            PipelineState::Pushed => "pushed",
            PipelineState::Done => "done",
            PipelineState::Skipped => "skipped",
            PipelineState::Aborted => "aborted",
        };
        write!(f, "{}", name)
    }
}

/// How a successful pipeline ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    /// A commit was pushed to origin
    Pushed,
    /// Every change was a no-op; nothing was committed
    Skipped,
    /// Changes were applied and the message rendered, but nothing was committed
    DryRun,
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStatus::Pushed => write!(f, "pushed"),
            PipelineStatus::Skipped => write!(f, "skipped"),
            PipelineStatus::DryRun => write!(f, "dry-run"),
        }
    }
}

/// Aggregate counters for one or more pipeline runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineResult {
    pub applications_processed: usize,
    /// Changes requested
    pub images_found: usize,
    /// Changes that altered a file
    pub images_updated: usize,
    /// Changes that were tried, whatever their outcome
    pub images_considered: usize,
    /// Applications that needed no commit
    pub skipped: usize,
    /// Changes or applications that failed
    pub errors: usize,
}

impl std::ops::AddAssign for PipelineResult {
    fn add_assign(&mut self, other: Self) {
        self.applications_processed += other.applications_processed;
        self.images_found += other.images_found;
        self.images_updated += other.images_updated;
        self.images_considered += other.images_considered;
        self.skipped += other.skipped;
        self.errors += other.errors;
    }
}

/// Outcome of one successful pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub application: String,
    pub repository: String,
    /// The concrete branch that was checked out
    pub branch: String,
    pub status: PipelineStatus,
    pub changes: Vec<ChangeOutcome>,
    /// The rendered message; absent when the run was skipped
    pub commit_message: Option<String>,
}

impl PipelineReport {
    pub fn summary(&self) -> PipelineResult {
        PipelineResult {
            applications_processed: 1,
            images_found: self.changes.len(),
            images_updated: self.changes.iter().filter(|c| c.is_applied()).count(),
            images_considered: self.changes.len(),
            skipped: usize::from(self.status == PipelineStatus::Skipped),
            errors: self.changes.iter().filter(|c| c.is_failed()).count(),
        }
    }
}

/// Runs update-commit-push pipelines
#[derive(Clone)]
pub struct Pipeline {
    git: Arc<dyn GitClientFactory>,
    engine: PatchEngine,
    locks: Arc<RepositoryLockRegistry>,
    workdir_parent: Option<PathBuf>,
}

impl Pipeline {
    /// A pipeline using the process-wide lock registry
    pub fn new(git: Arc<dyn GitClientFactory>, engine: PatchEngine) -> Self {
        Self {
            git,
            engine,
            locks: RepositoryLockRegistry::global(),
            workdir_parent: None,
        }
    }

    /// Use a specific lock registry instead of the process-wide one
    pub fn with_locks(mut self, locks: Arc<RepositoryLockRegistry>) -> Self {
        self.locks = locks;
        self
    }

    /// Create working copies under `parent` instead of the system temp dir
    pub fn with_workdir_parent(mut self, parent: impl Into<PathBuf>) -> Self {
        self.workdir_parent = Some(parent.into());
        self
    }

    /// Run the pipeline for one application.
    ///
    /// Returns a report for pushed, skipped and dry runs, or the error of the
    /// step that failed. The repository lock and working copy are released
    /// before this returns, whatever the outcome.
    pub fn run(&self, config: &PipelineConfig, cancel: &CancellationToken) -> Result<PipelineReport> {
        let mut state = PipelineState::Idle;
        let result = self.execute(config, cancel, &mut state);
        match &result {
            Ok(report) => info!(
                "{}: finished with status {} on branch {}",
                config.application_name, report.status, report.branch
            ),
            Err(e) => warn!(
                "{}: {} after {}: {}",
                config.application_name,
                PipelineState::Aborted,
                state,
                e
            ),
        }
        result
    }

    fn execute(
        &self,
        config: &PipelineConfig,
        cancel: &CancellationToken,
        state: &mut PipelineState,
    ) -> Result<PipelineReport> {
        let app = config.application_name.as_str();
        let repo = &config.repo;

        cancel.check("lock")?;
        let _lock = self.locks.acquire(&repo.repo_url, cancel)?;
        transition(app, state, PipelineState::Locked);

        cancel.check("init")?;
        let credentials = config.credentials.resolve(&repo.repo_url)?;
        debug!("{}: using {} credentials", app, credentials.kind());
        let workdir = match &self.workdir_parent {
            Some(parent) => WorkingCopy::provision_in(parent, app)?,
            None => WorkingCopy::provision(app)?,
        };
        let mut git = self.git.create(&repo.repo_url, workdir.root(), &credentials)?;
        git.init()?;
        if config.credentials.has_identity() {
            git.config(&config.credentials.username, &config.credentials.email)?;
        }
        transition(app, state, PipelineState::Initialized);

        cancel.check("fetch")?;
        git.fetch("")?;
        transition(app, state, PipelineState::Fetched);

        cancel.check("checkout")?;
        let branch = if git::is_symbolic_branch(&repo.branch) {
            let resolved = git.symbolic_ref_to_branch(repo.branch.trim())?;
            info!("{}: resolved branch '{}' to '{}'", app, repo.branch.trim(), resolved);
            resolved
        } else {
            repo.branch.trim().to_string()
        };
        trace!("{}: checking out {} of {}", app, branch, repo.repo_url);
        git.checkout(&branch)?;
        transition(app, state, PipelineState::CheckedOut);

        let target = path::target_path(workdir.root(), &repo.path, &config.target_file)?;
        if !target.is_file() {
            return Err(Error::TargetFileMissing {
                path: path::display_relative(workdir.root(), &target),
            });
        }

        let aggregation = ChangeAggregator::new(&self.engine).apply_all(
            git.as_mut(),
            &target,
            &config.changes,
            cancel,
        )?;
        transition(app, state, PipelineState::Patched);

        let report = |status: PipelineStatus, commit_message: Option<String>| PipelineReport {
            application: app.to_string(),
            repository: repo.repo_url.clone(),
            branch: branch.clone(),
            status,
            changes: aggregation.outcomes.clone(),
            commit_message,
        };

        match aggregation.decision {
            Decision::AbortAllFailed => {
                return Err(Error::AllChangesFailed {
                    application: app.to_string(),
                    failed: aggregation.failed(),
                });
            }
            Decision::SkipNoChange => {
                info!("{}: no changes to commit", app);
                transition(app, state, PipelineState::Skipped);
                return Ok(report(PipelineStatus::Skipped, None));
            }
            Decision::Proceed => {}
        }

        let commit_message =
            message::render(&repo.commit_template, app, &aggregation.entries);
        if config.dry_run {
            info!("{}: dry run, not committing {} change(s)", app, aggregation.applied());
            return Ok(report(PipelineStatus::DryRun, Some(commit_message)));
        }

        cancel.check("commit")?;
        let mut message_file = tempfile::Builder::new()
            .prefix("commit-message-")
            .tempfile()?;
        message_file.write_all(commit_message.as_bytes())?;
        message_file.flush()?;
        git.commit(
            &commit_message,
            &CommitOptions {
                message_path: Some(message_file.path().to_path_buf()),
                all: false,
            },
        )?;
        transition(app, state, PipelineState::Committed);

        cancel.check("push")?;
        git.push(ORIGIN, &branch, false)?;
        transition(app, state, PipelineState::Pushed);

        transition(app, state, PipelineState::Done);
        Ok(report(PipelineStatus::Pushed, Some(commit_message)))
    }
}

fn transition(app: &str, state: &mut PipelineState, next: PipelineState) {
    debug!("{}: {} -> {}", app, state, next);
    *state = next;
}
