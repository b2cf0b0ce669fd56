//! # Configuration
//!
//! This module defines the runtime configuration of one pipeline run
//! ([`PipelineConfig`]) and the YAML batch file that describes many
//! applications living in the same repository ([`BatchFile`]).
//!
//! ## Batch File Format
//!
//! ```yaml
//! repo:
//!   url: https://github.com/org/deploy.git
//!   branch: main            # optional, empty or HEAD uses the remote default
//!   path: environments/prod # optional base directory inside the repository
//!   commit_message: |       # optional commit message template
//!     chore({{ .AppName }}): bump images
//! applications:
//!   - name: api
//!     file: api/values.yaml
//!     changes:
//!       - key: .image.tag
//!         value: v1.2.3
//! ```
//!
//! Credentials are deliberately absent from the file. They are supplied on
//! the command line or through the environment and merged in by
//! [`BatchFile::pipeline_configs`].

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::change::Change;
use crate::credentials::CredentialBundle;
use crate::error::{Error, Result};
use crate::message::CommitTemplate;

/// Where and how to commit
#[derive(Debug, Clone)]
pub struct RepoConf {
    /// Remote URL (SSH or HTTPS)
    pub repo_url: String,
    /// Branch to update; empty or `HEAD` resolves to the remote default
    pub branch: String,
    /// Base directory inside the repository that target files are relative to
    pub path: String,
    /// Commit message template
    pub commit_template: CommitTemplate,
}

impl RepoConf {
    pub fn new(repo_url: impl Into<String>) -> Self {
        Self {
            repo_url: repo_url.into(),
            branch: String::new(),
            path: String::new(),
            commit_template: CommitTemplate::default(),
        }
    }
}

/// Everything one pipeline run needs; immutable for the run's duration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub application_name: String,
    /// Target file, relative to `repo.path`
    pub target_file: String,
    /// Requested changes, applied in order
    pub changes: Vec<Change>,
    pub credentials: CredentialBundle,
    pub repo: RepoConf,
    /// Stop before commit and push
    pub dry_run: bool,
}

/// Which mechanism edits target files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PatchBackend {
    /// The external `yq` binary, preserving comments and layout
    #[default]
    Yq,
    /// In-process `serde_yaml` editing
    Builtin,
}

/// The `repo` block of a batch file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepoSection {
    pub url: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub commit_message: Option<String>,
}

/// One entry of the `applications` list
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplicationSection {
    pub name: String,
    pub file: String,
    #[serde(default)]
    pub changes: Vec<Change>,
}

/// A parsed batch file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchFile {
    pub repo: RepoSection,
    #[serde(default)]
    pub applications: Vec<ApplicationSection>,
}

impl BatchFile {
    /// Build the repository configuration, parsing the commit template
    pub fn repo_conf(&self) -> Result<RepoConf> {
        let commit_template = match &self.repo.commit_message {
            Some(source) => CommitTemplate::parse(source)?,
            None => CommitTemplate::default(),
        };
        Ok(RepoConf {
            repo_url: self.repo.url.trim().to_string(),
            branch: self.repo.branch.trim().to_string(),
            path: self.repo.path.trim().to_string(),
            commit_template,
        })
    }

    /// One pipeline configuration per application, sharing `credentials`
    pub fn pipeline_configs(
        &self,
        credentials: &CredentialBundle,
        dry_run: bool,
    ) -> Result<Vec<PipelineConfig>> {
        let repo = self.repo_conf()?;
        Ok(self
            .applications
            .iter()
            .map(|app| PipelineConfig {
                application_name: app.name.clone(),
                target_file: app.file.clone(),
                changes: app.changes.clone(),
                credentials: credentials.clone(),
                repo: repo.clone(),
                dry_run,
            })
            .collect())
    }
}

/// Parse a batch file from a YAML string
pub fn parse(yaml_content: &str) -> Result<BatchFile> {
    let batch: BatchFile = serde_yaml::from_str(yaml_content).map_err(|e| Error::ConfigParse {
        message: e.to_string(),
        hint: Some(
            "A batch file needs a 'repo' block with 'url' and an 'applications' list".to_string(),
        ),
    })?;
    validate(&batch)?;
    Ok(batch)
}

/// Parse a batch file from a YAML file path
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<BatchFile> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    parse(&content)
}

fn validate(batch: &BatchFile) -> Result<()> {
    if batch.repo.url.trim().is_empty() {
        return Err(Error::ConfigParse {
            message: "repo.url must not be empty".to_string(),
            hint: Some("Add 'url:' to the repo block".to_string()),
        });
    }

    let mut seen = HashSet::new();
    for app in &batch.applications {
        if app.name.trim().is_empty() {
            return Err(Error::ConfigParse {
                message: "application name must not be empty".to_string(),
                hint: None,
            });
        }
        if !seen.insert(app.name.as_str()) {
            return Err(Error::ConfigParse {
                message: format!("duplicate application name: {}", app.name),
                hint: Some("Merge the changes into a single application entry".to_string()),
            });
        }
        if app.file.trim().is_empty() {
            return Err(Error::ConfigParse {
                message: format!("application {} has no file", app.name),
                hint: Some("Add 'file:' with the path of the values file".to_string()),
            });
        }
    }

    if let Some(source) = &batch.repo.commit_message {
        CommitTemplate::parse(source)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BATCH: &str = r#"
repo:
  url: https://github.com/org/deploy.git
  branch: main
  path: environments/prod
applications:
  - name: api
    file: api/values.yaml
    changes:
      - key: .image.tag
        value: v1.2.3
      - key: .sidecar.image.tag
        value: "2.4"
  - name: worker
    file: worker/values.yaml
    changes:
      - key: .image.tag
        value: v7
"#;

    #[test]
    fn test_parse_batch_file() {
        let batch = parse(BATCH).unwrap();
        assert_eq!(batch.repo.url, "https://github.com/org/deploy.git");
        assert_eq!(batch.repo.branch, "main");
        assert_eq!(batch.applications.len(), 2);
        assert_eq!(
            batch.applications[0].changes[1],
            Change::new(".sidecar.image.tag", "2.4")
        );
    }

    #[test]
    fn test_pipeline_configs_share_repo_and_credentials() {
        let batch = parse(BATCH).unwrap();
        let creds = CredentialBundle {
            username: "bot".to_string(),
            password: "token".to_string(),
            ..Default::default()
        };
        let configs = batch.pipeline_configs(&creds, true).unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[1].application_name, "worker");
        assert_eq!(configs[1].target_file, "worker/values.yaml");
        assert_eq!(configs[1].repo.path, "environments/prod");
        assert_eq!(configs[1].credentials.username, "bot");
        assert!(configs.iter().all(|c| c.dry_run));
    }

    #[test]
    fn test_default_commit_template_when_absent() {
        let batch = parse(BATCH).unwrap();
        let repo = batch.repo_conf().unwrap();
        assert_eq!(repo.commit_template, CommitTemplate::default());
    }

    #[test]
    fn test_custom_commit_template() {
        let yaml = r#"
repo:
  url: git@github.com:org/deploy.git
  commit_message: "chore({{ .AppName }}): bump"
applications: []
"#;
        let repo = parse(yaml).unwrap().repo_conf().unwrap();
        assert_eq!(repo.commit_template.source(), "chore({{ .AppName }}): bump");
        assert_eq!(repo.branch, "");
    }

    #[test]
    fn test_broken_commit_template_is_rejected() {
        let yaml = r#"
repo:
  url: git@github.com:org/deploy.git
  commit_message: "{{ range .AppChanges }}"
"#;
        assert!(matches!(parse(yaml), Err(Error::Template { .. })));
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let yaml = r#"
repo:
  url: https://github.com/org/deploy.git
  password: hunter2
"#;
        assert!(matches!(parse(yaml), Err(Error::ConfigParse { .. })));
    }

    #[test]
    fn test_missing_url_is_rejected() {
        assert!(matches!(
            parse("repo:\n  url: \"\"\n"),
            Err(Error::ConfigParse { .. })
        ));
        assert!(matches!(parse("applications: []\n"), Err(Error::ConfigParse { .. })));
    }

    #[test]
    fn test_duplicate_and_incomplete_applications_are_rejected() {
        let duplicate = r#"
repo:
  url: https://github.com/org/deploy.git
applications:
  - name: api
    file: a.yaml
  - name: api
    file: b.yaml
"#;
        assert!(matches!(parse(duplicate), Err(Error::ConfigParse { .. })));

        let no_file = r#"
repo:
  url: https://github.com/org/deploy.git
applications:
  - name: api
    file: ""
"#;
        assert!(matches!(parse(no_file), Err(Error::ConfigParse { .. })));
    }

    #[test]
    fn test_from_file_nonexistent() {
        assert!(matches!(
            from_file("/nonexistent/batch.yaml"),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_patch_backend_defaults_to_yq() {
        assert_eq!(PatchBackend::default(), PatchBackend::Yq);
    }
}
