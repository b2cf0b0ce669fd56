//! YAML path addressing for change keys
//!
//! Change keys use the same path syntax as `yq`: they start at the document
//! root marker `.` and descend through mapping keys and sequence indices.
//!
//! - Dot notation: `.image.tag`
//! - Array indices: `.containers[0].image`
//! - Quoted bracket keys: `.annotations["app.kubernetes.io/version"]`
//! - Escaped dots: `.labels.team\.name`
//!
//! Keys are parsed strictly: a key that does not start with `.`, that only
//! names the root, or that contains an empty or unterminated segment is an
//! [`Error::InvalidChangeKey`]. Parsed keys are re-rendered into a canonical
//! expression before being handed to an external tool, so a key can never
//! smuggle extra program text into that tool.

use serde_yaml::Value as YamlValue;

use crate::error::{Error, Result};

/// The path-root marker every change key starts with
pub const ROOT_MARKER: char = '.';

/// Represents a segment in a path expression for navigating nested structures
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathSegment {
    /// A named key for accessing mapping members
    Key(String),
    /// A numeric index for accessing sequence elements
    Index(usize),
}

/// Parse a change key into path segments.
///
/// # Examples
///
/// ```
/// use helm_repo_updater::yaml_path::{parse_key, PathSegment};
///
/// let segments = parse_key(".containers[0].image").unwrap();
/// assert_eq!(
///     segments,
///     vec![
///         PathSegment::Key("containers".to_string()),
///         PathSegment::Index(0),
///         PathSegment::Key("image".to_string()),
///     ]
/// );
/// ```
pub fn parse_key(key: &str) -> Result<Vec<PathSegment>> {
    let invalid = |reason: &str| Error::InvalidChangeKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    let rest = key
        .strip_prefix(ROOT_MARKER)
        .ok_or_else(|| invalid("key must start with '.'"))?;

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = rest.chars().peekable();
    // The root marker acts as a separator for the first segment
    let mut after_separator = true;

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                let escaped = chars
                    .next()
                    .ok_or_else(|| invalid("dangling escape at end of key"))?;
                current.push(escaped);
                after_separator = false;
            }
            '.' => {
                if current.is_empty() {
                    return Err(invalid("empty path segment"));
                }
                segments.push(PathSegment::Key(std::mem::take(&mut current)));
                after_separator = true;
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut current)));
                }
                segments.push(parse_bracket(&mut chars).map_err(|reason| invalid(&reason))?);
                after_separator = false;
                // A bracket may be followed by '.', another '[' or the end
                match chars.peek() {
                    None | Some('[') => {}
                    Some('.') => {
                        chars.next();
                        after_separator = true;
                        if chars.peek().is_none() {
                            return Err(invalid("key must not end with '.'"));
                        }
                    }
                    Some(other) => {
                        return Err(invalid(&format!("unexpected '{}' after ']'", other)));
                    }
                }
            }
            ']' | '"' | '\'' => {
                return Err(invalid(&format!("unexpected '{}'", ch)));
            }
            c if c.is_whitespace() || matches!(c, '|' | '=' | '(' | ')' | ';') => {
                return Err(invalid(&format!("unexpected '{}'", c)));
            }
            _ => {
                current.push(ch);
                after_separator = false;
            }
        }
    }

    if !current.is_empty() {
        segments.push(PathSegment::Key(current));
    } else if after_separator && !segments.is_empty() {
        return Err(invalid("key must not end with '.'"));
    }

    if segments.is_empty() {
        return Err(invalid("key must reference a field, not the document root"));
    }

    Ok(segments)
}

fn parse_bracket(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
) -> std::result::Result<PathSegment, String> {
    match chars.peek().copied() {
        Some(quote) if quote == '"' || quote == '\'' => {
            chars.next();
            let mut key = String::new();
            loop {
                match chars.next() {
                    Some('\\') => match chars.next() {
                        Some(escaped) => key.push(escaped),
                        None => return Err("dangling escape in quoted key".to_string()),
                    },
                    Some(c) if c == quote => break,
                    Some(c) => key.push(c),
                    None => return Err("unterminated quoted key".to_string()),
                }
            }
            if chars.next() != Some(']') {
                return Err("expected ']' after quoted key".to_string());
            }
            if key.is_empty() {
                return Err("empty quoted key".to_string());
            }
            Ok(PathSegment::Key(key))
        }
        _ => {
            let mut content = String::new();
            loop {
                match chars.next() {
                    Some(']') => break,
                    Some(c) => content.push(c),
                    None => return Err("unterminated '['".to_string()),
                }
            }
            content
                .trim()
                .parse::<usize>()
                .map(PathSegment::Index)
                .map_err(|_| format!("'[{}]' is not a sequence index", content))
        }
    }
}

/// Render parsed segments back into a canonical `yq` path expression
pub fn to_expression(segments: &[PathSegment]) -> String {
    let mut expr = String::new();
    for segment in segments {
        match segment {
            PathSegment::Key(key) if is_plain_identifier(key) => {
                expr.push('.');
                expr.push_str(key);
            }
            PathSegment::Key(key) => {
                if expr.is_empty() {
                    expr.push('.');
                }
                expr.push_str("[\"");
                expr.push_str(&escape_double_quoted(key));
                expr.push_str("\"]");
            }
            PathSegment::Index(idx) => {
                if expr.is_empty() {
                    expr.push('.');
                }
                expr.push_str(&format!("[{}]", idx));
            }
        }
    }
    expr
}

/// Escape a string for use inside a double-quoted `yq` string literal
pub fn escape_double_quoted(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn is_plain_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Read the scalar at `path`, rendered as a string.
///
/// Returns `None` if the path does not exist or points at a mapping or a
/// sequence. A YAML `null` reads as an empty string.
pub fn get_scalar(value: &YamlValue, path: &[PathSegment]) -> Option<String> {
    let mut current = value;
    for segment in path {
        current = match segment {
            PathSegment::Key(key) => current.as_mapping()?.get(YamlValue::String(key.clone()))?,
            PathSegment::Index(idx) => current.as_sequence()?.get(*idx)?,
        };
    }

    match current {
        YamlValue::String(s) => Some(s.clone()),
        YamlValue::Number(n) => Some(n.to_string()),
        YamlValue::Bool(b) => Some(b.to_string()),
        YamlValue::Null => Some(String::new()),
        YamlValue::Tagged(tagged) => get_scalar(&tagged.value, &[]),
        YamlValue::Mapping(_) | YamlValue::Sequence(_) => None,
    }
}

/// Navigate to a specific path within a YAML value, creating intermediate
/// mappings and sequences as needed.
///
/// Returns an error message if the path runs through a scalar.
pub fn navigate_mut<'a>(
    value: &'a mut YamlValue,
    path: &[PathSegment],
) -> std::result::Result<&'a mut YamlValue, String> {
    let mut current = value;
    for segment in path {
        match segment {
            PathSegment::Key(key) => {
                if current.is_null() {
                    *current = YamlValue::Mapping(Default::default());
                }
                let map = match current.as_mapping_mut() {
                    Some(map) => map,
                    None => return Err(format!("expected mapping while navigating to '{}'", key)),
                };
                current = map
                    .entry(YamlValue::String(key.clone()))
                    .or_insert(YamlValue::Null);
            }
            PathSegment::Index(idx) => {
                if current.is_null() {
                    *current = YamlValue::Sequence(Vec::new());
                }
                let seq = match current.as_sequence_mut() {
                    Some(seq) => seq,
                    None => {
                        return Err(format!(
                            "expected sequence while navigating to index {}",
                            idx
                        ))
                    }
                };
                // Only the next free slot may be created
                if *idx == seq.len() {
                    seq.push(YamlValue::Null);
                }
                let len = seq.len();
                current = match seq.get_mut(*idx) {
                    Some(item) => item,
                    None => {
                        return Err(format!(
                            "index {} is out of range for a sequence of length {}",
                            idx, len
                        ))
                    }
                };
            }
        }
    }
    Ok(current)
}
