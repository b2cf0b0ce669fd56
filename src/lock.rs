//! Process-wide serialization of pipelines per repository
//!
//! Every pipeline that writes to a repository first acquires that
//! repository's lock from a [`RepositoryLockRegistry`]. Entries are created
//! lazily on first reference and kept for the lifetime of the registry; the
//! number of distinct repositories a process touches is small.
//!
//! Locks are only handed out as [`RepositoryLock`] guards. Dropping the guard
//! releases the lock, so release happens on success, on error and during
//! unwinding alike.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, OnceLock};
use std::time::Duration;

use log::debug;
use url::Url;

use crate::cancel::CancellationToken;
use crate::error::{Error, Result};

/// How often a waiting acquirer re-checks its cancellation token
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct RepoLock {
    held: Mutex<bool>,
    released: Condvar,
}

/// Maps normalized repository identities to mutual-exclusion locks
#[derive(Debug, Default)]
pub struct RepositoryLockRegistry {
    locks: Mutex<HashMap<String, Arc<RepoLock>>>,
}

/// Exclusive hold on one repository; released on drop
#[derive(Debug)]
pub struct RepositoryLock {
    identity: String,
    lock: Arc<RepoLock>,
}

impl RepositoryLock {
    /// The normalized identity this guard holds
    pub fn identity(&self) -> &str {
        &self.identity
    }
}

impl Drop for RepositoryLock {
    fn drop(&mut self) {
        // The inner mutex only guards a bool, a poisoned value is still valid.
        let mut held = self
            .lock
            .held
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *held = false;
        drop(held);
        self.lock.released.notify_one();
        debug!("released repository lock for {}", self.identity);
    }
}

impl RepositoryLockRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by every pipeline in this process
    pub fn global() -> Arc<RepositoryLockRegistry> {
        static GLOBAL: OnceLock<Arc<RepositoryLockRegistry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(RepositoryLockRegistry::new())))
    }

    /// Block until the lock for `repo_url` is available and take it.
    ///
    /// Waiting stops early with `Error::Cancelled` if `cancel` fires.
    pub fn acquire(&self, repo_url: &str, cancel: &CancellationToken) -> Result<RepositoryLock> {
        let identity = normalize_identity(repo_url);
        let lock = self.entry(&identity)?;

        let mut held = lock.held.lock().map_err(|_| Error::LockPoisoned {
            context: format!("repository lock for {}", identity),
        })?;
        while *held {
            cancel.check("repository lock acquisition")?;
            let (guard, _timeout) = lock
                .released
                .wait_timeout(held, CANCEL_POLL_INTERVAL)
                .map_err(|_| Error::LockPoisoned {
                    context: format!("repository lock for {}", identity),
                })?;
            held = guard;
        }
        *held = true;
        drop(held);

        debug!("acquired repository lock for {}", identity);
        Ok(RepositoryLock { identity, lock })
    }

    /// Number of repositories that have been locked at least once
    pub fn len(&self) -> Result<usize> {
        Ok(self.table()?.len())
    }

    /// Whether no repository has been locked yet
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.table()?.is_empty())
    }

    fn entry(&self, identity: &str) -> Result<Arc<RepoLock>> {
        let mut table = self.table()?;
        Ok(Arc::clone(table.entry(identity.to_string()).or_default()))
    }

    fn table(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Arc<RepoLock>>>> {
        self.locks.lock().map_err(|_| Error::LockPoisoned {
            context: "repository lock table".to_string(),
        })
    }
}

/// Normalize a repository URL into the identity used as a lock key.
///
/// Surrounding whitespace, trailing slashes and a trailing `.git` are
/// dropped. For URL-shaped inputs the scheme and host are lowercased and any
/// password is removed; for scp-like `user@host:path` inputs the host is
/// lowercased.
pub fn normalize_identity(repo_url: &str) -> String {
    let mut trimmed = repo_url.trim().trim_end_matches('/');
    if let Some(stripped) = trimmed.strip_suffix(".git") {
        trimmed = stripped.trim_end_matches('/');
    }

    if trimmed.contains("://") {
        if let Ok(url) = Url::parse(trimmed) {
            if let Some(host) = url.host_str() {
                let user = if url.username().is_empty() {
                    String::new()
                } else {
                    format!("{}@", url.username())
                };
                let port = url.port().map(|p| format!(":{}", p)).unwrap_or_default();
                let path = url.path().trim_end_matches('/');
                return format!(
                    "{}://{}{}{}{}",
                    url.scheme().to_ascii_lowercase(),
                    user,
                    host.to_ascii_lowercase(),
                    port,
                    path
                );
            }
        }
        return trimmed.to_string();
    }

    if let Some((user_host, path)) = trimmed.split_once(':') {
        if let Some((user, host)) = user_host.split_once('@') {
            return format!("{}@{}:{}", user, host.to_ascii_lowercase(), path);
        }
    }

    trimmed.to_string()
}
