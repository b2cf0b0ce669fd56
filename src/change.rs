//! Requested changes and their per-change outcomes

use serde::{Deserialize, Serialize};

/// One requested edit: set `key` to `new_value` in an application's file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Change {
    /// Path into the target file, starting with the root marker `.`
    pub key: String,
    /// The value to write
    #[serde(rename = "value")]
    pub new_value: String,
}

impl Change {
    pub fn new(key: impl Into<String>, new_value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            new_value: new_value.into(),
        }
    }

    /// Parse a `KEY=VALUE` argument as given on the command line.
    ///
    /// Only the first `=` separates key from value, so values may contain `=`.
    pub fn parse_assignment(arg: &str) -> std::result::Result<Self, String> {
        match arg.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok(Change::new(key.trim(), value.trim()))
            }
            _ => Err(format!("expected KEY=VALUE, got '{}'", arg)),
        }
    }
}

/// A change that was applied and altered the file content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEntry {
    pub key: String,
    pub old_value: String,
    pub new_value: String,
    /// Target file, relative to the repository root
    pub file: String,
}

/// What happened to one requested change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChangeStatus {
    /// The file content changed
    Applied { old_value: String },
    /// The file already held the requested value
    NoOp,
    /// The change could not be applied; the rest of the batch continued
    Failed { error: String },
}

/// Per-change record kept in pipeline reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeOutcome {
    pub key: String,
    pub new_value: String,
    #[serde(flatten)]
    pub status: ChangeStatus,
}

impl ChangeOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self.status, ChangeStatus::Applied { .. })
    }

    pub fn is_noop(&self) -> bool {
        matches!(self.status, ChangeStatus::NoOp)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, ChangeStatus::Failed { .. })
    }
}
