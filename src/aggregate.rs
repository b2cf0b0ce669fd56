//! Applying all of an application's changes and deciding what to do next
//!
//! Changes are applied in request order through the [`PatchEngine`]. Each one
//! ends up `Applied`, `NoOp` or `Failed`; failures of a single change
//! (malformed key, patch mechanism error) are recorded and the batch goes on.
//! Anything else, such as a missing target file, aborts the whole batch.
//!
//! Once every change has been tried the batch gets a [`Decision`]:
//!
//! | Outcomes                          | Decision          |
//! |-----------------------------------|-------------------|
//! | every change failed               | `AbortAllFailed`  |
//! | nothing applied (no-ops, maybe some failures, or no changes) | `SkipNoChange` |
//! | at least one change applied       | `Proceed`         |
//!
//! The target file is staged only on `Proceed`.

use std::path::Path;

use log::{debug, info, warn};
use serde::Serialize;

use crate::cancel::CancellationToken;
use crate::change::{Change, ChangeEntry, ChangeOutcome, ChangeStatus};
use crate::error::Result;
use crate::git::GitClient;
use crate::patch::PatchEngine;
use crate::path;

/// What the pipeline should do after patching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Proceed,
    SkipNoChange,
    AbortAllFailed,
}

/// Per-change outcomes plus the batch decision
#[derive(Debug, Clone)]
pub struct Aggregation {
    /// One outcome per requested change, in request order
    pub outcomes: Vec<ChangeOutcome>,
    /// Changes that altered the file, for the commit message
    pub entries: Vec<ChangeEntry>,
    pub decision: Decision,
}

impl Aggregation {
    pub fn applied(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_applied()).count()
    }

    pub fn noop(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_noop()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }
}

/// Applies a batch of changes to one target file
pub struct ChangeAggregator<'a> {
    engine: &'a PatchEngine,
}

impl<'a> ChangeAggregator<'a> {
    pub fn new(engine: &'a PatchEngine) -> Self {
        Self { engine }
    }

    /// Apply `changes` to `target` inside the working copy of `git`.
    ///
    /// Each change sees the file as left by the previous one. Returns an error
    /// only for failures that are not scoped to a single change.
    pub fn apply_all(
        &self,
        git: &mut dyn GitClient,
        target: &Path,
        changes: &[Change],
        cancel: &CancellationToken,
    ) -> Result<Aggregation> {
        let file = path::display_relative(git.root(), target);
        let mut outcomes = Vec::with_capacity(changes.len());
        let mut entries = Vec::new();
        debug!(
            "applying {} change(s) to {} with the {} backend",
            changes.len(),
            file,
            self.engine.mechanism_name()
        );

        for change in changes {
            cancel.check("patching")?;

            let status = match self.engine.apply(target, change) {
                Ok(outcome) if outcome.changed => {
                    info!(
                        "updated key {} in {} from '{}' to '{}'",
                        change.key, file, outcome.old_value, change.new_value
                    );
                    entries.push(ChangeEntry {
                        key: change.key.clone(),
                        old_value: outcome.old_value.clone(),
                        new_value: change.new_value.clone(),
                        file: file.clone(),
                    });
                    ChangeStatus::Applied {
                        old_value: outcome.old_value,
                    }
                }
                Ok(_) => {
                    info!("key {} in {} already set to '{}'", change.key, file, change.new_value);
                    ChangeStatus::NoOp
                }
                Err(e) if e.is_per_change() => {
                    warn!("could not apply change to key {} in {}: {}", change.key, file, e);
                    ChangeStatus::Failed {
                        error: e.to_string(),
                    }
                }
                Err(e) => return Err(e),
            };

            outcomes.push(ChangeOutcome {
                key: change.key.clone(),
                new_value: change.new_value.clone(),
                status,
            });
        }

        let mut aggregation = Aggregation {
            outcomes,
            entries,
            decision: Decision::SkipNoChange,
        };

        aggregation.decision = if !changes.is_empty() && aggregation.failed() == changes.len() {
            Decision::AbortAllFailed
        } else if aggregation.applied() == 0 {
            Decision::SkipNoChange
        } else {
            Decision::Proceed
        };

        if aggregation.decision == Decision::Proceed {
            git.add(Path::new(&file))?;
        }

        Ok(aggregation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::git::fake::FakeGitFactory;
    use crate::patch::tests::FakePatch;
    use crate::patch::BuiltinPatch;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::TempDir;

    const VALUES: &str = "image:\n  repository: nginx\n  tag: v1\nsidecar:\n  tag: \"2.0\"\n";

    fn setup() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("values.yaml");
        fs::write(&target, VALUES).unwrap();
        (dir, target)
    }

    #[test]
    fn test_logs_patch_backend() {
        testing_logger::setup();
        let (dir, target) = setup();
        let factory = FakeGitFactory::default();
        let mut git = factory.client(dir.path());
        let engine = PatchEngine::new(Arc::new(FakePatch::default()));

        ChangeAggregator::new(&engine)
            .apply_all(
                &mut git,
                &target,
                &[Change::new(".image.tag", "v2")],
                &CancellationToken::new(),
            )
            .unwrap();

        testing_logger::validate(|captured| {
            assert!(captured.iter().any(|log| log.level == log::Level::Debug
                && log.body == "applying 1 change(s) to values.yaml with the fake backend"));
        });
    }

    #[test]
    fn test_all_applied_proceeds_and_stages() {
        let (dir, target) = setup();
        let factory = FakeGitFactory::default();
        let mut git = factory.client(dir.path());
        let engine = PatchEngine::new(Arc::new(BuiltinPatch));

        let result = ChangeAggregator::new(&engine)
            .apply_all(
                &mut git,
                &target,
                &[
                    Change::new(".image.tag", "v2"),
                    Change::new(".sidecar.tag", "2.1"),
                ],
                &CancellationToken::new(),
            )
            .unwrap();

        assert_eq!(result.decision, Decision::Proceed);
        assert_eq!(result.applied(), 2);
        assert_eq!(result.entries[0].old_value, "v1");
        assert_eq!(result.entries[1].old_value, "2.0");
        assert_eq!(result.entries[1].file, "values.yaml");
        assert_eq!(factory.calls(), vec!["add values.yaml"]);
    }

    #[test]
    fn test_all_noop_skips_without_staging() {
        let (dir, target) = setup();
        let factory = FakeGitFactory::default();
        let mut git = factory.client(dir.path());
        let engine = PatchEngine::new(Arc::new(BuiltinPatch));

        let result = ChangeAggregator::new(&engine)
            .apply_all(
                &mut git,
                &target,
                &[Change::new(".image.tag", "v1"), Change::new(".sidecar.tag", "2.0")],
                &CancellationToken::new(),
            )
            .unwrap();

        assert_eq!(result.decision, Decision::SkipNoChange);
        assert_eq!(result.noop(), 2);
        assert!(result.entries.is_empty());
        assert!(factory.calls().is_empty());
        assert_eq!(fs::read_to_string(&target).unwrap(), VALUES);
    }

    #[test]
    fn test_partial_failure_keeps_going() {
        let (dir, target) = setup();
        let factory = FakeGitFactory::default();
        let mut git = factory.client(dir.path());
        let engine = PatchEngine::new(Arc::new(BuiltinPatch));

        let result = ChangeAggregator::new(&engine)
            .apply_all(
                &mut git,
                &target,
                &[
                    Change::new(".image.tag", "v2"),
                    Change::new("image.repository", "httpd"),
                    Change::new(".sidecar.tag", "2.1"),
                ],
                &CancellationToken::new(),
            )
            .unwrap();

        assert_eq!(result.decision, Decision::Proceed);
        assert_eq!(result.applied(), 2);
        assert_eq!(result.failed(), 1);
        assert!(result.outcomes[1].is_failed());
        assert_eq!(
            result.entries.iter().map(|e| e.key.as_str()).collect::<Vec<_>>(),
            vec![".image.tag", ".sidecar.tag"]
        );
    }

    #[test]
    fn test_all_failed_aborts_without_staging() {
        let (dir, target) = setup();
        let factory = FakeGitFactory::default();
        let mut git = factory.client(dir.path());
        let fake = Arc::new(FakePatch::failing(&[".image.tag", ".sidecar.tag"]));
        let engine = PatchEngine::new(fake.clone());

        let result = ChangeAggregator::new(&engine)
            .apply_all(
                &mut git,
                &target,
                &[Change::new(".image.tag", "v2"), Change::new(".sidecar.tag", "2.1")],
                &CancellationToken::new(),
            )
            .unwrap();

        assert_eq!(result.decision, Decision::AbortAllFailed);
        assert_eq!(fake.calls.lock().unwrap().len(), 2);
        assert!(factory.calls().is_empty());
    }

    #[test]
    fn test_noop_and_failure_mix_skips() {
        let (dir, target) = setup();
        let factory = FakeGitFactory::default();
        let mut git = factory.client(dir.path());
        let engine = PatchEngine::new(Arc::new(FakePatch::failing(&[".sidecar.tag"])));

        let result = ChangeAggregator::new(&engine)
            .apply_all(
                &mut git,
                &target,
                &[Change::new(".image.tag", "v1"), Change::new(".sidecar.tag", "2.1")],
                &CancellationToken::new(),
            )
            .unwrap();

        assert_eq!(result.decision, Decision::SkipNoChange);
        assert!(factory.calls().is_empty());
    }

    #[test]
    fn test_noop_is_cumulative() {
        let (dir, target) = setup();
        let factory = FakeGitFactory::default();
        let mut git = factory.client(dir.path());
        let engine = PatchEngine::new(Arc::new(BuiltinPatch));

        let result = ChangeAggregator::new(&engine)
            .apply_all(
                &mut git,
                &target,
                &[Change::new(".image.tag", "v2"), Change::new(".image.tag", "v2")],
                &CancellationToken::new(),
            )
            .unwrap();

        assert!(result.outcomes[0].is_applied());
        assert!(result.outcomes[1].is_noop());
        assert_eq!(result.decision, Decision::Proceed);
    }

    #[test]
    fn test_empty_change_list_skips() {
        let (dir, target) = setup();
        let factory = FakeGitFactory::default();
        let mut git = factory.client(dir.path());
        let engine = PatchEngine::new(Arc::new(BuiltinPatch));

        let result = ChangeAggregator::new(&engine)
            .apply_all(&mut git, &target, &[], &CancellationToken::new())
            .unwrap();
        assert_eq!(result.decision, Decision::SkipNoChange);
    }

    #[test]
    fn test_missing_target_is_fatal() {
        let dir = TempDir::new().unwrap();
        let factory = FakeGitFactory::default();
        let mut git = factory.client(dir.path());
        let engine = PatchEngine::new(Arc::new(BuiltinPatch));

        let result = ChangeAggregator::new(&engine).apply_all(
            &mut git,
            &dir.path().join("missing.yaml"),
            &[Change::new(".image.tag", "v2")],
            &CancellationToken::new(),
        );
        assert!(matches!(result, Err(Error::TargetFileMissing { .. })));
    }

    #[test]
    fn test_cancelled_before_patching() {
        let (dir, target) = setup();
        let factory = FakeGitFactory::default();
        let mut git = factory.client(dir.path());
        let engine = PatchEngine::new(Arc::new(BuiltinPatch));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = ChangeAggregator::new(&engine).apply_all(
            &mut git,
            &target,
            &[Change::new(".image.tag", "v2")],
            &cancel,
        );
        assert!(matches!(result, Err(Error::Cancelled { .. })));
        assert_eq!(fs::read_to_string(&target).unwrap(), VALUES);
    }
}
