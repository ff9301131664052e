//! Human-readable summaries of checkpoint edits.
//!
//! A checkpoint is an object carrying an `inlineDiffs` array. Each diff
//! names a file and, usually, the original line range it replaced:
//!
//! ```json
//! {
//!   "inlineDiffs": [{
//!     "uri": { "path": "/repo/src/lib.rs" },
//!     "original": { "startLineNumber": 10, "endLineNumberExclusive": 12, "content": "" },
//!     "modified": ["fn added() {}", ""]
//!   }]
//! }
//! ```
//!
//! renders as `Added lib.rs (L10-11)`.

use serde_json::Value;

use crate::utils::value_at;

/// Joins the per-file descriptions of one summary.
pub const CHANGE_SEPARATOR: &str = ", ";

const DIFF_LISTS: &[&str] = &["inlineDiffs", "diffs"];

const PATH_FIELDS: &[&[&str]] = &[
    &["uri", "path"],
    &["uri", "fsPath"],
    &["uri"],
    &["path"],
    &["filePath"],
    &["fileName"],
];

const PLACEHOLDER_FILE: &str = "file";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Added => "Added",
            Self::Removed => "Removed",
            Self::Modified => "Modified",
        })
    }
}

/// Describe every diff in the `before` and `after` checkpoints, in that
/// order. `None` when neither carries any diff.
pub fn summarize_checkpoints(before: Option<&Value>, after: Option<&Value>) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    for diff in [before, after].into_iter().flatten().flat_map(diff_list) {
        if let Some(line) = describe_diff(diff)
            && !parts.contains(&line)
        {
            parts.push(line);
        }
    }
    (!parts.is_empty()).then(|| parts.join(CHANGE_SEPARATOR))
}

fn diff_list(checkpoint: &Value) -> &[Value] {
    DIFF_LISTS
        .iter()
        .find_map(|k| checkpoint.get(*k).and_then(Value::as_array))
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// One diff's description; non-object entries are skipped.
pub fn describe_diff(diff: &Value) -> Option<String> {
    if !diff.is_object() {
        return None;
    }
    let file = file_name(diff);
    let Some(start) = value_at(diff, &["original", "startLineNumber"]).and_then(Value::as_i64)
    else {
        return Some(format!("{} {}", ChangeKind::Modified, file));
    };
    let end = value_at(diff, &["original", "endLineNumberExclusive"])
        .and_then(Value::as_i64)
        .filter(|end| *end > start)
        .unwrap_or(start + 1);

    let kind = classify(diff, start, end);
    let last = end - 1;
    let range = if last > start {
        format!("L{start}-{last}")
    } else {
        format!("L{start}")
    };
    Some(format!("{kind} {file} ({range})"))
}

fn classify(diff: &Value, start: i64, end: i64) -> ChangeKind {
    let original_lines = match value_at(diff, &["original", "content"]).and_then(Value::as_str) {
        Some(content) => line_count(content),
        None => (end - start).max(0) as usize,
    };
    let replacement_lines = ["modified", "newContent"]
        .iter()
        .find_map(|k| diff.get(*k))
        .and_then(|v| match v {
            Value::Array(lines) => Some(lines.len()),
            Value::String(s) => Some(line_count(s)),
            _ => None,
        });

    if original_lines == 0 {
        ChangeKind::Added
    } else if replacement_lines.is_some_and(|n| n == 0 || n < original_lines) {
        ChangeKind::Removed
    } else {
        ChangeKind::Modified
    }
}

fn line_count(content: &str) -> usize {
    if content.is_empty() {
        0
    } else {
        content.lines().count().max(1)
    }
}

/// Last path segment of the first path-like field, or a placeholder.
pub fn file_name(diff: &Value) -> String {
    PATH_FIELDS
        .iter()
        .find_map(|path| value_at(diff, path).and_then(Value::as_str))
        .and_then(|p| p.rsplit(['/', '\\']).find(|seg| !seg.is_empty()))
        .unwrap_or(PLACEHOLDER_FILE)
        .to_string()
}
