//! Applying a single change to a target file
//!
//! The [`PatchEngine`] wraps a [`PatchMechanism`] (the thing that actually
//! edits the file) and adds the bookkeeping the aggregator needs: target
//! existence, key validation, capture of the previous value, and a
//! byte-for-byte before/after comparison to tell a real edit from a no-op.
//!
//! Two mechanisms ship with the crate:
//!
//! - [`YqPatch`] runs `yq eval -i '<path> = "<value>"' <file>`, which keeps
//!   comments and formatting of the edited file intact.
//! - [`BuiltinPatch`] edits the document in-process with `serde_yaml`. It
//!   needs no external binary but re-serializes the whole document, dropping
//!   comments.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use log::{debug, info, warn};
use serde_yaml::Value as YamlValue;

use crate::change::Change;
use crate::error::{Error, Result};
use crate::yaml_path::{self, PathSegment};

/// Something that can set a value at a YAML path inside a file
pub trait PatchMechanism: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Set the scalar at `path` to the string `value` in `file`, in place.
    ///
    /// `key` is the change key as requested, for error messages.
    fn apply(&self, key: &str, path: &[PathSegment], value: &str, file: &Path) -> Result<()>;
}

/// Edits files with the external `yq` binary
#[derive(Debug, Clone)]
pub struct YqPatch {
    binary: PathBuf,
}

impl YqPatch {
    /// Use `yq` from `PATH`
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("yq"),
        }
    }

    /// Use a specific `yq` binary
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// The `yq` program text for one assignment
    pub fn expression(path: &[PathSegment], value: &str) -> String {
        format!(
            "{} = \"{}\"",
            yaml_path::to_expression(path),
            yaml_path::escape_double_quoted(value)
        )
    }
}

impl Default for YqPatch {
    fn default() -> Self {
        Self::new()
    }
}

impl PatchMechanism for YqPatch {
    fn name(&self) -> &'static str {
        "yq"
    }

    fn apply(&self, key: &str, path: &[PathSegment], value: &str, file: &Path) -> Result<()> {
        let expression = Self::expression(path, value);
        debug!(
            "running {} eval -i '{}' {}",
            self.binary.display(),
            expression,
            file.display()
        );

        let output = Command::new(&self.binary)
            .args(["eval", "-i", &expression])
            .arg(file)
            .output()
            .map_err(|e| Error::PatchExecutionFailed {
                key: key.to_string(),
                message: format!("failed to run {}: {}", self.binary.display(), e),
            })?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            info!("yq: {}", line);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines() {
            warn!("yq: {}", line);
        }

        if !output.status.success() {
            return Err(Error::PatchExecutionFailed {
                key: key.to_string(),
                message: format!("yq exited with {}: {}", output.status, stderr.trim()),
            });
        }

        Ok(())
    }
}

/// Edits files in-process with `serde_yaml`
#[derive(Debug, Clone, Default)]
pub struct BuiltinPatch;

impl PatchMechanism for BuiltinPatch {
    fn name(&self) -> &'static str {
        "builtin"
    }

    fn apply(&self, key: &str, path: &[PathSegment], value: &str, file: &Path) -> Result<()> {
        let failed = |message: String| Error::PatchExecutionFailed {
            key: key.to_string(),
            message,
        };

        let content = fs::read_to_string(file)?;
        let mut document: YamlValue = if content.trim().is_empty() {
            YamlValue::Null
        } else {
            serde_yaml::from_str(&content)
                .map_err(|e| failed(format!("failed to parse {}: {}", file.display(), e)))?
        };

        let target = yaml_path::navigate_mut(&mut document, path).map_err(failed)?;
        let new_value = YamlValue::String(value.to_string());
        if *target == new_value {
            // Leave the bytes alone so an unchanged value is detected as a no-op
            return Ok(());
        }
        *target = new_value;

        let mut serialized = serde_yaml::to_string(&document)
            .map_err(|e| failed(format!("failed to serialize YAML: {}", e)))?;
        if !serialized.ends_with('\n') {
            serialized.push('\n');
        }
        fs::write(file, serialized)?;
        Ok(())
    }
}

/// Result of applying one change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    /// Whether the file bytes differ after the change
    pub changed: bool,
    /// The scalar at the key before the change, or empty if unreadable
    pub old_value: String,
}

/// Applies changes to files through a [`PatchMechanism`]
#[derive(Clone)]
pub struct PatchEngine {
    mechanism: Arc<dyn PatchMechanism>,
}

impl PatchEngine {
    pub fn new(mechanism: Arc<dyn PatchMechanism>) -> Self {
        Self { mechanism }
    }

    /// Name of the underlying mechanism
    pub fn mechanism_name(&self) -> &'static str {
        self.mechanism.name()
    }

    /// Apply `change` to `target`.
    ///
    /// Fails with `TargetFileMissing` if `target` does not exist, with
    /// `InvalidChangeKey` if the key does not address a field, and with
    /// `PatchExecutionFailed` if the mechanism fails. The file is compared
    /// against its state immediately before this change, so earlier changes
    /// in the same batch are part of the baseline.
    pub fn apply(&self, target: &Path, change: &Change) -> Result<PatchOutcome> {
        if !target.is_file() {
            return Err(Error::TargetFileMissing {
                path: target.display().to_string(),
            });
        }

        let path = yaml_path::parse_key(&change.key)?;

        let before = fs::read(target)?;
        let old_value = current_value(&before, &path).unwrap_or_default();

        self.mechanism
            .apply(&change.key, &path, &change.new_value, target)?;

        let after = fs::read(target)?;
        Ok(PatchOutcome {
            changed: before != after,
            old_value,
        })
    }
}

fn current_value(content: &[u8], path: &[PathSegment]) -> Option<String> {
    let document: YamlValue = serde_yaml::from_slice(content).ok()?;
    yaml_path::get_scalar(&document, path)
}
