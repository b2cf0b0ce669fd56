//! End-to-end tests for the `validate` command.
//!
//! These tests invoke the actual CLI binary and check the behavior of the
//! `validate` subcommand from a user's perspective.

#[allow(dead_code)]
mod common;
use common::prelude::*;

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_validate_minimal_batch() {
    let fixture = TestFixture::new().with_batch(batches::MINIMAL);

    fixture
        .command()
        .arg("--color")
        .arg("never")
        .arg("validate")
        .arg("--config")
        .arg(fixture.batch_path())
        .assert()
        .success()
        .stdout(predicate::str::contains("[OK] Batch file parsed successfully"))
        .stdout(predicate::str::contains("(https)"))
        .stdout(predicate::str::contains("Applications: 1"))
        .stdout(predicate::str::contains("default template"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_validate_full_batch() {
    let fixture = TestFixture::new().with_batch(batches::FULL);

    fixture
        .command()
        .arg("--color")
        .arg("never")
        .arg("validate")
        .arg("--config")
        .arg(fixture.batch_path())
        .assert()
        .success()
        .stdout(predicate::str::contains("(ssh)"))
        .stdout(predicate::str::contains("Applications: 2"))
        .stdout(predicate::str::contains("Changes: 3"))
        .stdout(predicate::str::contains("custom template"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_validate_rejects_key_without_root_marker() {
    let fixture = TestFixture::new().with_batch(batches::BAD_KEY);

    fixture
        .command()
        .arg("--color")
        .arg("never")
        .arg("validate")
        .arg("--config")
        .arg(fixture.batch_path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("[ERR] api"))
        .stdout(predicate::str::contains("image.tag"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_validate_rejects_unsupported_repository() {
    let fixture = TestFixture::new().with_batch(batches::LOCAL_REPO);

    fixture
        .command()
        .arg("--color")
        .arg("never")
        .arg("validate")
        .arg("--config")
        .arg(fixture.batch_path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("neither an SSH nor an HTTPS URL"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_validate_invalid_yaml() {
    let fixture = TestFixture::new().with_batch(batches::INVALID_YAML);

    fixture
        .command()
        .arg("validate")
        .arg("--config")
        .arg(fixture.batch_path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Batch file parsing failed"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_validate_missing_file() {
    let fixture = TestFixture::new();

    fixture
        .command()
        .arg("validate")
        .arg("--config")
        .arg(fixture.path().join("missing.yaml"))
        .assert()
        .failure();
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_validate_broken_commit_template() {
    let fixture = TestFixture::new().with_batch(
        r#"
repo:
  url: https://github.com/org/deploy.git
  commit_message: "{{ range .AppChanges }}unterminated"
applications: []
"#,
    );

    fixture
        .command()
        .arg("validate")
        .arg("--config")
        .arg(fixture.batch_path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("Template processing error"));
}
