//! Commit message rendering
//!
//! Commit messages are produced from a small template language compatible
//! with the subset of Go `text/template` that commit message templates use:
//!
//! - `{{ .AppName }}` prints the application name
//! - `{{ range .AppChanges }} ... {{ end }}` repeats its body per change,
//!   with `{{ .Image }}`, `{{ .OldTag }}` and `{{ .NewTag }}` available inside
//! - `{{ $.AppName }}` reaches the top-level fields from inside a range
//! - `{{-` and `-}}` trim whitespace before and after an action
//! - `{{/* comment */}}` is ignored
//!
//! Templates are parsed up front with [`CommitTemplate::parse`], so syntax
//! errors surface as configuration errors. Execution errors, such as a
//! reference to an unknown field, never fail the pipeline: [`render`] logs
//! them and returns the fixed fallback message instead.

use std::sync::OnceLock;

use log::error;
use regex::Regex;

use crate::change::ChangeEntry;
use crate::error::{Error, Result};

/// The default commit message template
pub const DEFAULT_COMMIT_TEMPLATE: &str = "🚀 automatic update of {{ .AppName }}

{{ range .AppChanges -}}
updates key {{ .Image }} tag '{{ .OldTag }}' to '{{ .NewTag }}'
{{ end -}}
";

/// The message used when a template cannot be executed
pub fn fallback_message(app_name: &str) -> String {
    format!("build: update of application {}", app_name)
}

/// One change as seen by a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageChange {
    pub image: String,
    pub old_tag: String,
    pub new_tag: String,
}

/// Data a commit message template is executed against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageContext {
    pub app_name: String,
    pub app_changes: Vec<MessageChange>,
}

impl MessageContext {
    /// Build the template view of an application's applied changes
    pub fn new(app_name: &str, entries: &[ChangeEntry]) -> Self {
        Self {
            app_name: app_name.to_string(),
            app_changes: entries
                .iter()
                .map(|entry| MessageChange {
                    image: entry.key.clone(),
                    old_tag: entry.old_value.clone(),
                    new_tag: entry.new_value.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FieldRef {
    /// `.Name`, resolved against the current scope
    Dot(String),
    /// `$.Name`, resolved against the top-level context
    Root(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Text(String),
    Field(FieldRef),
    Range { field: FieldRef, body: Vec<Node> },
}

/// A parsed commit message template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitTemplate {
    source: String,
    nodes: Vec<Node>,
}

impl Default for CommitTemplate {
    fn default() -> Self {
        Self::parse(DEFAULT_COMMIT_TEMPLATE).expect("default commit template parses")
    }
}

enum Scope<'a> {
    Root(&'a MessageContext),
    Change(&'a MessageContext, &'a MessageChange),
}

enum Resolved<'a> {
    Text(&'a str),
    Changes(&'a [MessageChange]),
}

impl CommitTemplate {
    /// Parse template source text
    pub fn parse(source: &str) -> Result<Self> {
        static ACTION: OnceLock<Regex> = OnceLock::new();
        let action = ACTION.get_or_init(|| {
            Regex::new(r"(?s)\{\{(-\s+|\s*)(.*?)(\s+-|\s*)\}\}").expect("static regex is valid")
        });

        // Stack of open bodies; the bottom entry is the template itself
        let mut stack: Vec<(Option<FieldRef>, Vec<Node>)> = vec![(None, Vec::new())];
        let mut last_end = 0;
        let mut trim_next = false;

        for caps in action.captures_iter(source) {
            let (Some(whole), Some(body)) = (caps.get(0), caps.get(2)) else {
                continue;
            };
            let trim_before = caps.get(1).is_some_and(|m| m.as_str().starts_with('-'));
            let trim_after = caps.get(3).is_some_and(|m| m.as_str().ends_with('-'));

            let mut text = &source[last_end..whole.start()];
            if trim_next {
                text = text.trim_start();
            }
            if trim_before {
                text = text.trim_end();
            }
            push_text(&mut stack, text);
            last_end = whole.end();
            trim_next = trim_after;

            let body = body.as_str().trim();
            if body.starts_with("/*") && body.ends_with("*/") {
                continue;
            }
            if body == "end" {
                if stack.len() < 2 {
                    return Err(template_error("unexpected {{ end }}", None));
                }
                if let Some((Some(field), nodes)) = stack.pop() {
                    current_nodes(&mut stack).push(Node::Range { field, body: nodes });
                }
            } else if let Some(target) = body.strip_prefix("range ") {
                let field = parse_field(target.trim())?;
                stack.push((Some(field), Vec::new()));
            } else {
                let field = parse_field(body)?;
                current_nodes(&mut stack).push(Node::Field(field));
            }
        }

        let mut tail = &source[last_end..];
        if trim_next {
            tail = tail.trim_start();
        }
        push_text(&mut stack, tail);

        if stack.len() != 1 {
            return Err(template_error("unclosed {{ range }}, missing {{ end }}", None));
        }
        let nodes = stack.pop().map(|(_, nodes)| nodes).unwrap_or_default();

        Ok(Self {
            source: source.to_string(),
            nodes,
        })
    }

    /// The template source text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Execute the template against `context`
    pub fn execute(&self, context: &MessageContext) -> Result<String> {
        let mut out = String::new();
        execute_nodes(&self.nodes, &Scope::Root(context), &mut out)?;
        Ok(out)
    }
}

/// Render the commit message for `app_name` and its applied `entries`.
///
/// Falls back to `build: update of application <name>` if the template
/// cannot be executed.
pub fn render(template: &CommitTemplate, app_name: &str, entries: &[ChangeEntry]) -> String {
    let context = MessageContext::new(app_name, entries);
    match template.execute(&context) {
        Ok(message) => message,
        Err(e) => {
            error!("could not execute template for Git commit message: {}", e);
            fallback_message(app_name)
        }
    }
}

fn template_error(message: &str, variable: Option<&str>) -> Error {
    Error::Template {
        message: message.to_string(),
        variable: variable.map(str::to_string),
    }
}

fn current_nodes(stack: &mut [(Option<FieldRef>, Vec<Node>)]) -> &mut Vec<Node> {
    // The stack always holds the top-level body
    &mut stack[stack.len() - 1].1
}

fn push_text(stack: &mut [(Option<FieldRef>, Vec<Node>)], text: &str) {
    if !text.is_empty() {
        current_nodes(stack).push(Node::Text(text.to_string()));
    }
}

fn parse_field(expr: &str) -> Result<FieldRef> {
    let (root, name) = if let Some(name) = expr.strip_prefix("$.") {
        (true, name)
    } else if let Some(name) = expr.strip_prefix('.') {
        (false, name)
    } else {
        return Err(template_error(
            &format!("unsupported action '{}'", expr),
            None,
        ));
    };

    let valid = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(template_error(
            &format!("invalid field reference '{}'", expr),
            None,
        ));
    }

    Ok(if root {
        FieldRef::Root(name.to_string())
    } else {
        FieldRef::Dot(name.to_string())
    })
}

fn resolve<'a>(field: &FieldRef, scope: &Scope<'a>) -> Result<Resolved<'a>> {
    let (context, change, name) = match (field, scope) {
        (FieldRef::Root(name), Scope::Root(ctx) | Scope::Change(ctx, _)) => (*ctx, None, name),
        (FieldRef::Dot(name), Scope::Root(ctx)) => (*ctx, None, name),
        (FieldRef::Dot(name), Scope::Change(ctx, change)) => (*ctx, Some(*change), name),
    };

    let resolved = match (change, name.as_str()) {
        (None, "AppName") => Some(Resolved::Text(context.app_name.as_str())),
        (None, "AppChanges") => Some(Resolved::Changes(context.app_changes.as_slice())),
        (Some(change), "Image") => Some(Resolved::Text(change.image.as_str())),
        (Some(change), "OldTag") => Some(Resolved::Text(change.old_tag.as_str())),
        (Some(change), "NewTag") => Some(Resolved::Text(change.new_tag.as_str())),
        _ => None,
    };

    resolved.ok_or_else(|| template_error("can't evaluate field", Some(name)))
}

fn execute_nodes(nodes: &[Node], scope: &Scope<'_>, out: &mut String) -> Result<()> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Field(field) => match resolve(field, scope)? {
                Resolved::Text(value) => out.push_str(value),
                Resolved::Changes(_) => {
                    return Err(template_error(
                        "a list can only be used with range",
                        Some(field_name(field)),
                    ))
                }
            },
            Node::Range { field, body } => match resolve(field, scope)? {
                Resolved::Changes(changes) => {
                    let context = match scope {
                        Scope::Root(ctx) | Scope::Change(ctx, _) => *ctx,
                    };
                    for change in changes {
                        execute_nodes(body, &Scope::Change(context, change), out)?;
                    }
                }
                Resolved::Text(_) => {
                    return Err(template_error(
                        "range can't iterate over a string",
                        Some(field_name(field)),
                    ))
                }
            },
        }
    }
    Ok(())
}

fn field_name(field: &FieldRef) -> &str {
    match field {
        FieldRef::Dot(name) | FieldRef::Root(name) => name,
    }
}
