//! Parser for textual accessibility snapshots.
//!
//! Accepts the indented list format produced by accessibility-tree dumps:
//!
//! ```text
//! - banner:
//!   - heading "Welcome" [level=1] [ref=e2]
//!   - link "Home" [ref=e3]:
//!     - /url: /home
//!   - button "Submit" [disabled]
//!   - text: Signed in as Alice
//! ```
//!
//! Property lines (`- /url: ...`) and lines that are not list items are skipped.

use serde::{Deserialize, Serialize};

/// One element line of a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotNode {
    /// ARIA role (or `text` for bare text runs)
    pub role: String,
    /// Accessible name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Inline text or value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Structural reference assigned by the snapshotter
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// False when marked `[disabled]`
    pub enabled: bool,
    /// False when marked `[hidden]`
    pub visible: bool,
    /// `[expanded]` state when reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded: Option<bool>,
    /// Nesting depth
    pub depth: usize,
}

impl SnapshotNode {
    /// Create an enabled, visible node
    #[must_use]
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            name: None,
            text: None,
            reference: None,
            enabled: true,
            visible: true,
            expanded: None,
            depth: 0,
        }
    }

    /// Set the accessible name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the inline text
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Set the structural reference
    #[must_use]
    pub fn with_ref(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Diff identity: role, normalized name, normalized text
    #[must_use]
    pub fn signature(&self) -> (String, String, String) {
        (
            self.role.clone(),
            self.name.as_deref().map(normalize).unwrap_or_default(),
            self.text.as_deref().map(normalize).unwrap_or_default(),
        )
    }

    /// Same-element key across snapshots: role plus ref when present, else role plus name
    #[must_use]
    pub fn identity_key(&self) -> String {
        match &self.reference {
            Some(reference) => format!("{}#{}", self.role, reference),
            None => format!(
                "{}:{}",
                self.role,
                self.name.as_deref().map(normalize).unwrap_or_default()
            ),
        }
    }

    /// Inline text when present, else the accessible name
    #[must_use]
    pub fn display_text(&self) -> Option<String> {
        self.text
            .as_deref()
            .or(self.name.as_deref())
            .map(normalize)
            .filter(|t| !t.is_empty())
    }
}

/// Collapse runs of whitespace and trim
#[must_use]
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse snapshot text into nodes in document order
#[must_use]
pub fn parse_snapshot(raw: &str) -> Vec<SnapshotNode> {
    raw.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<SnapshotNode> {
    let indent = line.len() - line.trim_start().len();
    let body = line.trim_start().strip_prefix('-')?.trim_start();
    if body.is_empty() || body.starts_with('/') {
        return None;
    }

    let role_end = body
        .find(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(body.len());
    if role_end == 0 {
        return None;
    }
    let mut node = SnapshotNode::new(&body[..role_end]);
    node.depth = indent / 2;
    let mut rest = body[role_end..].trim_start();

    if let Some(after_quote) = rest.strip_prefix('"') {
        let (name, remaining) = read_quoted(after_quote);
        node.name = Some(name);
        rest = remaining.trim_start();
    }

    while let Some(after_bracket) = rest.strip_prefix('[') {
        let Some(close) = after_bracket.find(']') else {
            break;
        };
        apply_attribute(&mut node, after_bracket[..close].trim());
        rest = after_bracket[close + 1..].trim_start();
    }

    if let Some(inline) = rest.strip_prefix(':') {
        let inline = inline.trim();
        let inline = inline
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .unwrap_or(inline);
        if !inline.is_empty() {
            node.text = Some(inline.to_string());
        }
    }
    Some(node)
}

/// Read a double-quoted string body, returning it and the remainder after the closing quote
fn read_quoted(input: &str) -> (String, &str) {
    let mut out = String::new();
    let mut escaped = false;
    for (i, ch) in input.char_indices() {
        if escaped {
            out.push(ch);
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == '"' {
            return (out, &input[i + 1..]);
        } else {
            out.push(ch);
        }
    }
    (out, "")
}

fn apply_attribute(node: &mut SnapshotNode, attribute: &str) {
    let (key, value) = attribute
        .split_once('=')
        .map_or((attribute, None), |(k, v)| (k.trim(), Some(v.trim())));
    match (key, value) {
        ("ref", Some(v)) => node.reference = Some(v.to_string()),
        ("disabled", None | Some("true")) => node.enabled = false,
        ("hidden", None | Some("true")) => node.visible = false,
        ("expanded", None | Some("true")) => node.expanded = Some(true),
        ("expanded", Some("false")) => node.expanded = Some(false),
        _ => {}
    }
}
