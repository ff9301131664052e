//! Turn one raw message entry into a canonical [`Message`].
//!
//! Entries come in many shapes. Each attribute (role, text, action, time)
//! is resolved by walking a fixed, ordered table of candidate fields and
//! stopping at the first usable one.

use serde_json::Value;

use crate::diff::summarize_checkpoints;
use crate::model::{Message, Role};
use crate::utils::{is_truthy, non_blank_str, now_millis, positive_millis, value_at};

/// Prefix some host versions put in front of synthesized action text.
pub const ACTION_PREFIX: &str = "[Action] ";

/// Fields naming the author, after the `type` field.
const ROLE_NAME_FIELDS: &[&str] = &["role", "sender", "from"];

/// Plain-text aliases, in priority order.
const TEXT_FIELDS: &[&str] = &["text", "content", "message", "rawText", "markdown", "value"];

const RICH_TEXT_FIELD: &str = "richText";

const TIMESTAMP_FIELDS: &[&[&str]] = &[
    &["timestamp"],
    &["createdAt"],
    &["created_at"],
    &["creationTime"],
    &["time"],
    &["unixMs"],
    &["timingInfo", "clientStartTime"],
    &["timingInfo", "clientEndTime"],
    &["timingInfo", "clientRpcSendTime"],
];

/// Capability names and the label shown for them.
const CAPABILITY_LABELS: &[(&str, &str)] = &[
    ("edit_file", "Modified file"),
    ("edit", "Modified file"),
    ("read_file", "Read file"),
    ("read", "Read file"),
    ("codebase_search", "Searched codebase"),
    ("search", "Searched codebase"),
    ("grep_search", "Searched files"),
    ("grep", "Searched files"),
    ("list_dir", "Listed directory"),
    ("list", "Listed directory"),
    ("run_terminal_cmd", "Ran terminal command"),
    ("terminal", "Ran terminal command"),
    ("delete_file", "Deleted file"),
    ("delete", "Deleted file"),
    ("web_search", "Searched the web"),
];

/// Fallback times for entries that carry none of their own.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyContext {
    pub conversation_updated_at: Option<i64>,
    pub companion_updated_at: Option<i64>,
    pub clock: fn() -> i64,
}

impl Default for ClassifyContext {
    fn default() -> Self {
        Self {
            conversation_updated_at: None,
            companion_updated_at: None,
            clock: now_millis,
        }
    }
}

/// Classify one entry. `None` when no text can be found or synthesized.
pub fn classify_entry(entry: &Value, ctx: &ClassifyContext) -> Option<Message> {
    let role = resolve_role(entry);
    let action = action_description(entry);

    let (mut text, mut is_action) = match (resolve_text(entry), action) {
        (Some(text), Some(action)) => (format!("{action}\n\n{text}"), false),
        (Some(text), None) => (text, false),
        (None, Some(action)) => (action, true),
        (None, None) => (stringified_text(entry)?, false),
    };
    is_action |= entry.get("isAction").is_some_and(is_truthy);

    if is_action && let Some(rest) = text.strip_prefix(ACTION_PREFIX) {
        text = rest.to_string();
    }
    if text.trim().is_empty() {
        return None;
    }

    Some(Message {
        role,
        text,
        timestamp: resolve_timestamp(entry, ctx),
        is_action,
    })
}

/// Role of an entry; see the module tables for the lookup order.
pub fn resolve_role(entry: &Value) -> Role {
    match entry.get("type") {
        Some(Value::Number(n)) => {
            return Role::from_code(n.as_i64().unwrap_or_default());
        }
        Some(Value::String(s)) => {
            if let Some(role) = Role::from_name(s) {
                return role;
            }
        }
        _ => {}
    }

    let named = ROLE_NAME_FIELDS.iter().find_map(|k| match entry.get(*k)? {
        Value::String(s) => Role::from_name(s),
        Value::Number(n) => match n.as_i64()? {
            1 => Some(Role::User),
            2 => Some(Role::Assistant),
            _ => None,
        },
        _ => None,
    });
    // Agent activity (capabilitiesRan, isThought, isAgentic) and unmarked
    // entries both land on the assistant.
    named.unwrap_or(Role::Assistant)
}

/// Short description of the tool run or file edit an entry represents.
pub fn action_description(entry: &Value) -> Option<String> {
    if let Some(summary) = entry.get("cachedConversationSummary").filter(|v| v.is_object()) {
        let before = summary.get("checkpoint").unwrap_or(summary);
        if let Some(text) = summarize_checkpoints(Some(before), summary.get("afterCheckpoint")) {
            return Some(text);
        }
    }
    if let Some(text) = entry_checkpoint_summary(entry) {
        return Some(text);
    }
    capability_label(entry).map(str::to_owned)
}

/// Summary of the entry's own before/after checkpoints.
pub fn entry_checkpoint_summary(entry: &Value) -> Option<String> {
    summarize_checkpoints(entry.get("checkpoint"), entry.get("afterCheckpoint"))
}

fn capability_label(entry: &Value) -> Option<&'static str> {
    let ran: Vec<&str> = match entry.get("capabilitiesRan")? {
        Value::Object(map) => map
            .iter()
            .filter(|(_, v)| is_truthy(v))
            .map(|(k, _)| k.as_str())
            .collect(),
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => return None,
    };
    ran.iter().find_map(|name| {
        CAPABILITY_LABELS
            .iter()
            .find(|(known, _)| known == name)
            .map(|(_, label)| *label)
    })
}

/// Authored text: rich-text document first, then the plain aliases.
pub fn resolve_text(entry: &Value) -> Option<String> {
    if let Some(text) = entry.get(RICH_TEXT_FIELD).and_then(rich_text_to_plain) {
        return Some(text);
    }
    TEXT_FIELDS
        .iter()
        .find_map(|k| entry.get(*k).and_then(non_blank_str))
        .map(str::to_owned)
}

/// Last resort: an object- or array-valued text field, serialized.
fn stringified_text(entry: &Value) -> Option<String> {
    TEXT_FIELDS
        .iter()
        .filter_map(|k| entry.get(*k))
        .find(|v| (v.is_object() || v.is_array()) && is_truthy(v))
        .and_then(|v| serde_json::to_string(v).ok())
}

/// Flatten a rich-text document (`{"root": {"children": [block, …]}}`) to
/// plain text: each block's leaf text concatenated, blocks joined by
/// newlines. Accepts the document itself or a string containing it.
pub fn rich_text_to_plain(value: &Value) -> Option<String> {
    let parsed;
    let doc = match value {
        Value::String(s) => {
            parsed = serde_json::from_str::<Value>(s).ok()?;
            &parsed
        }
        Value::Object(_) => value,
        _ => return None,
    };
    let blocks = value_at(doc, &["root", "children"])?.as_array()?;
    let text = blocks
        .iter()
        .map(|block| {
            let mut out = String::new();
            collect_leaf_text(block, &mut out);
            out
        })
        .collect::<Vec<_>>()
        .join("\n");
    (!text.trim().is_empty()).then_some(text)
}

fn collect_leaf_text(node: &Value, out: &mut String) {
    if let Some(text) = node.get("text").and_then(Value::as_str) {
        out.push_str(text);
    }
    if let Some(children) = node.get("children").and_then(Value::as_array) {
        for child in children {
            collect_leaf_text(child, out);
        }
    }
}

/// First positive timestamp field, else the context fallbacks, else now.
pub fn resolve_timestamp(entry: &Value, ctx: &ClassifyContext) -> i64 {
    TIMESTAMP_FIELDS
        .iter()
        .find_map(|path| value_at(entry, path).and_then(positive_millis))
        .or(ctx.conversation_updated_at)
        .or(ctx.companion_updated_at)
        .unwrap_or_else(ctx.clock)
}
