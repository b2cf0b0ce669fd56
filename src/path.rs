//! Path manipulation utilities for helm-repo-updater

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Encode an arbitrary name so it is safe to use as a single path component
///
/// Characters that are problematic for filesystems are replaced with safe
/// alternatives; the character count is preserved.
pub fn encode_path_component(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' => '-',
            '\\' => '-',
            ':' => '_',
            '*' => '_',
            '?' => '_',
            '"' => '_',
            '<' => '_',
            '>' => '_',
            '|' => '_',
            // Keep alphanumeric, dots, dashes, underscores as-is
            c if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' => c,
            // Replace other characters with underscores
            _ => '_',
        })
        .collect()
}

/// Resolve an application's target file inside a working copy.
///
/// The result is `root/base/file`. Both `base` and `file` are relative to the
/// repository; absolute paths and `..` components are rejected so a target
/// can never point outside the working copy.
pub fn target_path(root: &Path, base: &str, file: &str) -> Result<PathBuf> {
    if file.trim().is_empty() {
        return Err(Error::Path {
            message: "target file must not be empty".to_string(),
        });
    }

    let mut resolved = root.to_path_buf();
    for part in [base, file] {
        for component in Path::new(part).components() {
            match component {
                Component::Normal(segment) => resolved.push(segment),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(Error::Path {
                        message: format!("'{}' must be a relative path inside the repository", part),
                    });
                }
            }
        }
    }
    Ok(resolved)
}

/// Render `path` relative to `root` for logs and commit metadata
pub fn display_relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
