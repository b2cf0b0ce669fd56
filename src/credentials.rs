//! Credential selection for repository access
//!
//! A [`CredentialBundle`] carries whatever secrets the operator supplied.
//! [`CredentialBundle::resolve`] picks exactly one authentication mode based
//! on the shape of the repository URL:
//!
//! | URL shape    | Required fields              | Result                  |
//! |--------------|------------------------------|-------------------------|
//! | SSH-shaped   | private key                  | [`Credentials::Ssh`]    |
//! | HTTPS-shaped | username and password        | [`Credentials::Https`]  |
//! | otherwise    |                              | `UnsupportedRepository` |
//!
//! An SSH URL without a key is rejected even if a username and password are
//! present, and vice versa.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::error::{Error, Result};

/// Secrets and identity supplied by the operator
#[derive(Clone, Default)]
pub struct CredentialBundle {
    pub username: String,
    pub password: String,
    pub email: String,
    pub ssh_private_key: String,
}

impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("username", &self.username)
            .field("password", &redacted(&self.password))
            .field("email", &self.email)
            .field("ssh_private_key", &redacted(&self.ssh_private_key))
            .finish()
    }
}

/// The authentication mode selected for one repository
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Authenticate with an SSH private key (PEM/OpenSSH text)
    Ssh { private_key: String },
    /// Authenticate over HTTPS with a username and password or token
    Https { username: String, password: String },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Ssh { .. } => f.debug_struct("Ssh").field("private_key", &"***").finish(),
            Credentials::Https { username, .. } => f
                .debug_struct("Https")
                .field("username", username)
                .field("password", &"***")
                .finish(),
        }
    }
}

impl Credentials {
    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Credentials::Ssh { .. } => "ssh",
            Credentials::Https { .. } => "https",
        }
    }
}

impl CredentialBundle {
    /// Select the credentials to use for `repo_url`.
    pub fn resolve(&self, repo_url: &str) -> Result<Credentials> {
        if is_ssh_url(repo_url) {
            if self.ssh_private_key.is_empty() {
                return Err(Error::UnsupportedRepository {
                    url: repo_url.to_string(),
                    message: "SSH repository URL requires an SSH private key".to_string(),
                });
            }
            return Ok(Credentials::Ssh {
                private_key: self.ssh_private_key.clone(),
            });
        }

        if is_https_url(repo_url) {
            if self.username.is_empty() || self.password.is_empty() {
                return Err(Error::UnsupportedRepository {
                    url: repo_url.to_string(),
                    message: "HTTPS repository URL requires a username and a password".to_string(),
                });
            }
            return Ok(Credentials::Https {
                username: self.username.clone(),
                password: self.password.clone(),
            });
        }

        Err(Error::UnsupportedRepository {
            url: repo_url.to_string(),
            message: "unknown repository type, expected an SSH or HTTPS URL".to_string(),
        })
    }

    /// Whether a committer identity (name and e-mail) is configured
    pub fn has_identity(&self) -> bool {
        !self.username.is_empty() && !self.email.is_empty()
    }
}

/// Whether `url` is an SSH remote (`ssh://...`, `git@host:...` or any
/// scp-like `user@host:path`)
pub fn is_ssh_url(url: &str) -> bool {
    static SCP_LIKE: OnceLock<Regex> = OnceLock::new();
    let url = url.trim().to_ascii_lowercase();
    if url.starts_with("ssh://") || url.starts_with("git@") {
        return true;
    }
    if url.contains("://") {
        return false;
    }
    SCP_LIKE
        .get_or_init(|| Regex::new(r"^[^:/@\s]+@[^:/\s]+:.+$").expect("static regex is valid"))
        .is_match(&url)
}

/// Whether `url` is an `https://` remote with a host
pub fn is_https_url(url: &str) -> bool {
    match Url::parse(url.trim()) {
        Ok(parsed) => parsed.scheme() == "https" && parsed.host_str().is_some(),
        Err(_) => false,
    }
}

fn redacted(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "***"
    }
}
