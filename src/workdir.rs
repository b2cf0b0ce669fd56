//! Ephemeral working copies
//!
//! Each pipeline run gets its own uniquely-named temporary directory. The
//! directory and everything in it are removed when the [`WorkingCopy`] is
//! dropped, whichever way the pipeline exits. A failed removal is logged and
//! otherwise ignored.

use std::path::{Path, PathBuf};

use log::{debug, error};
use tempfile::TempDir;

use crate::error::Result;
use crate::path::encode_path_component;

/// Handle to a provisioned working directory
#[derive(Debug)]
pub struct WorkingCopy {
    dir: Option<TempDir>,
    root: PathBuf,
}

impl WorkingCopy {
    /// Create a new working directory for `application` under the system
    /// temp directory.
    pub fn provision(application: &str) -> Result<Self> {
        Self::provision_in(&std::env::temp_dir(), application)
    }

    /// Create a new working directory for `application` under `parent`.
    pub fn provision_in(parent: &Path, application: &str) -> Result<Self> {
        let prefix = format!("git-{}-", encode_path_component(application));
        let dir = tempfile::Builder::new().prefix(&prefix).tempdir_in(parent)?;
        let root = dir.path().to_path_buf();
        debug!("provisioned working copy {}", root.display());
        Ok(Self {
            dir: Some(dir),
            root,
        })
    }

    /// Root path of the working copy
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Drop for WorkingCopy {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            match dir.close() {
                Ok(()) => debug!("removed working copy {}", self.root.display()),
                Err(e) => error!("could not remove temp dir {}: {}", self.root.display(), e),
            }
        }
    }
}
