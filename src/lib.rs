//! # Helm Repository Updater Library
//!
//! This library updates image references in a version-controlled
//! configuration repository (typically Helm value files) and publishes the
//! result as a git commit. It backs the `helm-repo-updater` command-line tool
//! but can be driven directly by a scheduler that already knows which
//! applications need which new values.
//!
//! ## Quick Example
//!
//! ```
//! use helm_repo_updater::config;
//! use helm_repo_updater::credentials::CredentialBundle;
//!
//! let batch = config::parse(r#"
//! repo:
//!   url: https://github.com/org/deploy.git
//!   branch: main
//! applications:
//!   - name: api
//!     file: api/values.yaml
//!     changes:
//!       - key: .image.tag
//!         value: v1.2.3
//! "#).unwrap();
//!
//! let creds = CredentialBundle {
//!     username: "bot".to_string(),
//!     password: "token".to_string(),
//!     ..Default::default()
//! };
//! let configs = batch.pipeline_configs(&creds, true).unwrap();
//! assert_eq!(configs[0].application_name, "api");
//! assert_eq!(configs[0].changes[0].new_value, "v1.2.3");
//! ```
//!
//! ## Core Concepts
//!
//! - **Locking (`lock`)**: A process-wide registry that lets at most one
//!   pipeline work on a given repository at a time.
//! - **Credentials (`credentials`)**: Chooses SSH-key or username/password
//!   authentication from the shape of the repository URL.
//! - **Working copies (`workdir`)**: Temporary directories that are removed
//!   whichever way a pipeline ends.
//! - **Patching (`patch`, `yaml_path`)**: Sets one value in a YAML file,
//!   through `yq` or in-process, and reports whether the file changed.
//! - **Aggregation (`aggregate`)**: Applies all changes of an application and
//!   decides whether to commit, skip or abort.
//! - **Commit messages (`message`)**: Renders a Go-template style message,
//!   falling back to a fixed one on failure.
//! - **Pipeline (`pipeline`, `runner`)**: Sequences the steps above for one
//!   application, or for many in parallel.
//!
//! ## Execution Flow
//!
//! For each application [`pipeline::Pipeline::run`]:
//!
//! 1.  **Lock**: Waits for exclusive access to the repository.
//! 2.  **Initialize**: Resolves credentials and provisions a working copy.
//! 3.  **Fetch**: Fetches remote refs from `origin`.
//! 4.  **Checkout**: Resolves an empty or `HEAD` branch to the remote default
//!     and checks it out.
//! 5.  **Patch**: Applies every change and decides what to do next.
//! 6.  **Commit**: Renders the message and commits the target file.
//! 7.  **Push**: Pushes the branch to `origin`, never forcing.

pub mod aggregate;
pub mod cancel;
pub mod change;
pub mod config;
pub mod credentials;
pub mod error;
pub mod git;
pub mod lock;
pub mod message;
pub mod output;
pub mod patch;
pub mod path;
pub mod pipeline;
pub mod runner;
pub mod workdir;
pub mod yaml_path;

#[cfg(test)]
mod path_proptest;
