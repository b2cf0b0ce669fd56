//! Repository client
//!
//! The pipeline talks to git through the [`GitClient`] trait so the
//! orchestration logic can be exercised with an in-memory fake. The
//! production implementation, [`CommandGitClient`], shells out to the system
//! `git` binary inside the working copy.
//!
//! Authentication is wired through the child environment only:
//!
//! - SSH keys are written to a `0600` file in a private temp directory and
//!   passed with `GIT_SSH_COMMAND`.
//! - HTTPS credentials are answered by a `GIT_ASKPASS` helper script that
//!   echoes `GIT_USERNAME` / `GIT_PASSWORD` from its environment.
//!
//! Secrets therefore never show up in argv, in `.git/config`, or in the
//! remote URL.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::debug;
use tempfile::TempDir;

use crate::credentials::Credentials;
use crate::error::{Error, Result};

/// Name of the remote the pipeline fetches from and pushes to
pub const ORIGIN: &str = "origin";

/// Options for [`GitClient::commit`]
#[derive(Debug, Clone, Default)]
pub struct CommitOptions {
    /// Read the commit message from this file
    pub message_path: Option<PathBuf>,
    /// Commit all tracked modifications, not just the staged ones
    pub all: bool,
}

/// The git capabilities the pipeline consumes
pub trait GitClient: Send {
    /// Root directory of the working copy
    fn root(&self) -> &Path;

    /// Initialize the repository and register `origin`
    fn init(&mut self) -> Result<()>;

    /// Fetch `reference` from origin, or all branches if empty
    fn fetch(&mut self, reference: &str) -> Result<()>;

    /// Resolve a symbolic reference (empty or `HEAD`) to the concrete
    /// branch name it points to on the remote
    fn symbolic_ref_to_branch(&mut self, reference: &str) -> Result<String>;

    /// Check out `branch` at the fetched remote state
    fn checkout(&mut self, branch: &str) -> Result<()>;

    /// Set the committer identity
    fn config(&mut self, username: &str, email: &str) -> Result<()>;

    /// Stage `path` for commit
    fn add(&mut self, path: &Path) -> Result<()>;

    /// Record a commit
    fn commit(&mut self, message: &str, options: &CommitOptions) -> Result<()>;

    /// Push `branch` to `remote`
    fn push(&mut self, remote: &str, branch: &str, force: bool) -> Result<()>;
}

/// Creates [`GitClient`]s bound to one repository and working copy
pub trait GitClientFactory: Send + Sync {
    fn create(
        &self,
        repo_url: &str,
        root: &Path,
        credentials: &Credentials,
    ) -> Result<Box<dyn GitClient>>;
}

/// Factory for [`CommandGitClient`]
#[derive(Debug, Clone, Default)]
pub struct CommandGitClientFactory;

impl GitClientFactory for CommandGitClientFactory {
    fn create(
        &self,
        repo_url: &str,
        root: &Path,
        credentials: &Credentials,
    ) -> Result<Box<dyn GitClient>> {
        Ok(Box::new(CommandGitClient::new(repo_url, root, credentials)?))
    }
}

/// A [`GitClient`] backed by the system `git` command
#[derive(Debug)]
pub struct CommandGitClient {
    repo_url: String,
    root: PathBuf,
    envs: Vec<(String, String)>,
    // Holds the SSH key or askpass helper; removed on drop
    _auth_dir: TempDir,
}

impl CommandGitClient {
    /// Bind a client to `repo_url`, operating in `root` with `credentials`
    pub fn new(repo_url: &str, root: &Path, credentials: &Credentials) -> Result<Self> {
        let auth_dir = tempfile::Builder::new().prefix("git-auth-").tempdir()?;
        let mut envs = vec![("GIT_TERMINAL_PROMPT".to_string(), "0".to_string())];

        match credentials {
            Credentials::Ssh { private_key } => {
                let key_path = auth_dir.path().join("id_key");
                let mut key = private_key.clone();
                if !key.ends_with('\n') {
                    key.push('\n');
                }
                write_private_file(&key_path, &key, 0o600)?;
                envs.push(("GIT_SSH_COMMAND".to_string(), ssh_command(&key_path)));
            }
            Credentials::Https { username, password } => {
                let askpass = auth_dir.path().join("askpass.sh");
                write_private_file(
                    &askpass,
                    "#!/bin/sh\ncase \"$1\" in\n  Username*) printf '%s\\n' \"$GIT_USERNAME\" ;;\n  *) printf '%s\\n' \"$GIT_PASSWORD\" ;;\nesac\n",
                    0o700,
                )?;
                envs.push((
                    "GIT_ASKPASS".to_string(),
                    askpass.to_string_lossy().to_string(),
                ));
                envs.push(("GIT_USERNAME".to_string(), username.clone()));
                envs.push(("GIT_PASSWORD".to_string(), password.clone()));
            }
        }

        Ok(Self {
            repo_url: repo_url.to_string(),
            root: root.to_path_buf(),
            envs,
            _auth_dir: auth_dir,
        })
    }

    /// Run `git <args>` in the working copy and return its stdout
    fn run(&self, args: &[&str]) -> Result<String> {
        let command = args.join(" ");
        debug!("git {} (in {})", command, self.root.display());

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .output()
            .map_err(|e| Error::GitCommand {
                command: command.clone(),
                url: self.repo_url.clone(),
                stderr: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::GitCommand {
                command,
                url: self.repo_url.clone(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl GitClient for CommandGitClient {
    fn root(&self) -> &Path {
        &self.root
    }

    fn init(&mut self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        self.run(&["init", "--quiet"])?;
        self.run(&["remote", "add", ORIGIN, self.repo_url.as_str()])?;
        Ok(())
    }

    fn fetch(&mut self, reference: &str) -> Result<()> {
        if reference.is_empty() {
            self.run(&["fetch", ORIGIN, "--force", "--prune"])?;
        } else {
            self.run(&["fetch", ORIGIN, "--force", reference])?;
        }
        Ok(())
    }

    fn symbolic_ref_to_branch(&mut self, reference: &str) -> Result<String> {
        let reference = if reference.is_empty() { "HEAD" } else { reference };
        let output = self.run(&["ls-remote", "--symref", ORIGIN, reference])?;
        parse_symref(&output).ok_or_else(|| Error::GitCommand {
            command: format!("ls-remote --symref {} {}", ORIGIN, reference),
            url: self.repo_url.clone(),
            stderr: format!("remote did not report a branch for '{}'", reference),
        })
    }

    fn checkout(&mut self, branch: &str) -> Result<()> {
        let remote_branch = format!("{}/{}", ORIGIN, branch);
        self.run(&["checkout", "--force", "-B", branch, remote_branch.as_str()])?;
        Ok(())
    }

    fn config(&mut self, username: &str, email: &str) -> Result<()> {
        self.run(&["config", "user.name", username])?;
        self.run(&["config", "user.email", email])?;
        Ok(())
    }

    fn add(&mut self, path: &Path) -> Result<()> {
        let path = path.to_string_lossy();
        self.run(&["add", "--", path.as_ref()])?;
        Ok(())
    }

    fn commit(&mut self, message: &str, options: &CommitOptions) -> Result<()> {
        let mut args = vec!["commit", "--quiet"];
        if options.all {
            args.push("--all");
        }
        let message_path = options
            .message_path
            .as_ref()
            .map(|path| path.to_string_lossy().to_string());
        match &message_path {
            Some(path) => args.extend(["--file", path.as_str()]),
            None => args.extend(["--message", message]),
        }
        self.run(&args)?;
        Ok(())
    }

    fn push(&mut self, remote: &str, branch: &str, force: bool) -> Result<()> {
        let mut args = vec!["push"];
        if force {
            args.push("--force");
        }
        args.extend([remote, branch]);
        self.run(&args)?;
        Ok(())
    }
}

/// Extract the branch name from `git ls-remote --symref` output
///
/// The relevant line looks like `ref: refs/heads/main\tHEAD`.
pub fn parse_symref(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let target = line.strip_prefix("ref:")?.split('\t').next()?.trim();
        let branch = target.strip_prefix("refs/heads/").unwrap_or(target);
        if branch.is_empty() {
            None
        } else {
            Some(branch.to_string())
        }
    })
}

/// Whether a configured branch must be resolved against the remote
pub fn is_symbolic_branch(branch: &str) -> bool {
    let branch = branch.trim();
    branch.is_empty() || branch == "HEAD"
}

fn write_private_file(path: &Path, content: &str, mode: u32) -> Result<()> {
    fs::write(path, content)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = mode;
    Ok(())
}

fn ssh_command(key_path: &Path) -> String {
    format!(
        "ssh -i {} -o IdentitiesOnly=yes -o StrictHostKeyChecking=no -o UserKnownHostsFile=/dev/null",
        shell_escape::escape(key_path.to_string_lossy())
    )
}
