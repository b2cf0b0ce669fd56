//! Shared test utilities for E2E tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_batch(batches::MINIMAL);
//!     fixture.command().arg("validate").arg("--config").arg(fixture.batch_path());
//! }
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::batches;
    #[allow(unused_imports)]
    pub use super::git_available;
    pub use super::TestFixture;
}

/// Batch file snippets for testing.
#[allow(dead_code)]
pub mod batches {
    /// One application with one change.
    pub const MINIMAL: &str = r#"
repo:
  url: https://github.com/org/deploy.git
applications:
  - name: api
    file: api/values.yaml
    changes:
      - key: .image.tag
        value: v1.2.3
"#;

    /// Two applications, a base path and a custom commit message.
    pub const FULL: &str = r#"
repo:
  url: git@github.com:org/deploy.git
  branch: main
  path: environments/prod
  commit_message: |
    chore({{ .AppName }}): bump images
    {{ range .AppChanges }}
    - {{ .Image }}: {{ .OldTag }} -> {{ .NewTag }}
    {{- end }}
applications:
  - name: api
    file: api/values.yaml
    changes:
      - key: .image.tag
        value: v1.2.3
      - key: .sidecars[0].image.tag
        value: "2.4"
  - name: worker
    file: worker/values.yaml
    changes:
      - key: .image.tag
        value: v7
"#;

    /// A change key without the root marker.
    pub const BAD_KEY: &str = r#"
repo:
  url: https://github.com/org/deploy.git
applications:
  - name: api
    file: api/values.yaml
    changes:
      - key: image.tag
        value: v1.2.3
"#;

    /// A repository URL that is neither SSH nor HTTPS.
    pub const LOCAL_REPO: &str = r#"
repo:
  url: /srv/git/deploy.git
applications:
  - name: api
    file: api/values.yaml
    changes:
      - key: .image.tag
        value: v1.2.3
"#;

    /// Invalid YAML for error testing.
    pub const INVALID_YAML: &str = "repo: [unclosed";
}

/// Whether the `git` binary can be run.
#[allow(dead_code)]
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// A temporary directory holding a batch file and other inputs.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Write `batch.yaml` with the given content.
    pub fn with_batch(self, content: &str) -> Self {
        self.with_file("batch.yaml", content)
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Get the path to the batch file.
    pub fn batch_path(&self) -> PathBuf {
        self.temp_dir.path().join("batch.yaml")
    }

    /// A command for the binary, isolated from the caller's git credentials.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("helm-repo-updater");
        cmd.current_dir(self.path());
        for var in [
            "GIT_USERNAME",
            "GIT_PASSWORD",
            "GIT_EMAIL",
            "GIT_SSH_KEY_FILE",
            "GIT_REPO_URL",
            "RUST_LOG",
        ] {
            cmd.env_remove(var);
        }
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_with_batch() {
        let fixture = TestFixture::new().with_batch(batches::MINIMAL);
        assert!(fixture.batch_path().exists());
    }

    #[test]
    fn test_batches_are_valid_yaml() {
        for batch in [
            batches::MINIMAL,
            batches::FULL,
            batches::BAD_KEY,
            batches::LOCAL_REPO,
        ] {
            serde_yaml::from_str::<serde_yaml::Value>(batch).expect("Batch should be valid YAML");
        }
    }

    #[test]
    fn test_invalid_yaml_is_actually_invalid() {
        assert!(serde_yaml::from_str::<serde_yaml::Value>(batches::INVALID_YAML).is_err());
    }
}
