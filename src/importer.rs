//! Shapes of the conversation records found in the host's stores.
//!
//! The host has changed its storage layout many times. Conversation bodies
//! may keep their messages in any of a dozen places, and index entries carry
//! fields whose types drift between versions. Everything here is decoded
//! defensively: an absent or wrong-typed field is simply "not present".
//!
//! Index record (`ItemTable`, one of [`COMPOSER_INDEX_KEYS`]):
//! ```json
//! {
//!   "allComposers": [
//!     { "composerId": "…", "name": "Fix parser", "createdAt": 1719000000000,
//!       "lastUpdatedAt": 1719000500000 }
//!   ],
//!   "selectedComposerIds": ["…"]
//! }
//! ```
//!
//! Body record (`cursorDiskKV` or `ItemTable`, key `composerData:<id>`):
//! ```json
//! { "composerId": "…", "conversation": [ { "type": 1, "text": "…" }, … ],
//!   "lastUpdatedAt": 1719000500000 }
//! ```
//! or, on newer versions, `fullConversationHeadersOnly` listing bubble ids
//! whose bodies are stored as separate `bubbleId:` rows.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::model::ConversationHead;
use crate::utils::positive_millis;

/// Keys the composer index has been stored under, newest first.
pub const COMPOSER_INDEX_KEYS: &[&str] = &[
    "composer.composerData",
    "composerData",
    "workbench.panel.composer.composerData",
    "aiService.composerData",
];

/// Where a message array may live inside a record.
#[derive(Debug, Clone, Copy)]
enum Location {
    /// A path of object keys from the record root.
    Field(&'static [&'static str]),
    /// The record is itself the array.
    Root,
}

/// Candidate message locations, highest priority first. The companion
/// record's `conversation` is consulted after all of these.
const MESSAGE_LOCATIONS: &[Location] = &[
    Location::Field(&["conversation"]),
    Location::Field(&["messages"]),
    Location::Field(&["history"]),
    Location::Field(&["richText", "conversation"]),
    Location::Field(&["richText", "messages"]),
    Location::Field(&["status", "conversation"]),
    Location::Field(&["context", "conversation"]),
    Location::Field(&["bubbles"]),
    Location::Field(&["chat", "messages"]),
    Location::Field(&["data", "messages"]),
    Location::Root,
];

const COMPANION_LOCATION: Location = Location::Field(&["conversation"]);

impl Location {
    fn resolve<'a>(&self, record: &'a Value) -> Option<&'a [Value]> {
        let target = match self {
            Self::Field(path) => crate::utils::value_at(record, path)?,
            Self::Root => record,
        };
        target
            .as_array()
            .filter(|a| !a.is_empty())
            .map(Vec::as_slice)
    }
}

/// Find the raw message entries of a conversation record.
///
/// The first location holding a non-empty array wins; later ones are never
/// consulted. No match is an empty slice, not an error.
pub fn locate_messages<'a>(record: Option<&'a Value>, companion: Option<&'a Value>) -> &'a [Value] {
    record
        .and_then(|r| MESSAGE_LOCATIONS.iter().find_map(|loc| loc.resolve(r)))
        .or_else(|| companion.and_then(|c| COMPANION_LOCATION.resolve(c)))
        .unwrap_or(&[])
}

/// Bubble ids listed by a headers-only body record, in conversation order.
pub fn header_bubble_ids(record: &Value) -> Vec<&str> {
    record
        .get("fullConversationHeadersOnly")
        .and_then(Value::as_array)
        .map(|headers| {
            headers
                .iter()
                .filter_map(|h| h.get("bubbleId").and_then(Value::as_str))
                .filter(|id| !id.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Deserialize `T`, turning a wrong-typed value into `None` instead of an
/// error.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Millisecond timestamps arrive as integers, floats, or garbage.
fn lenient_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(positive_millis(&value))
}

/// One entry of `allComposers`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawHead {
    #[serde(deserialize_with = "lenient")]
    composer_id: Option<String>,
    #[serde(deserialize_with = "lenient")]
    name: Option<String>,
    #[serde(deserialize_with = "lenient_millis")]
    created_at: Option<i64>,
    #[serde(deserialize_with = "lenient_millis")]
    last_updated_at: Option<i64>,
}

/// The decoded composer index of one workspace.
#[derive(Debug, Clone, Default)]
pub struct ComposerIndex {
    pub heads: Vec<ConversationHead>,
}

impl ComposerIndex {
    pub fn from_value(value: &Value) -> Self {
        let mut selected: Vec<&str> = value
            .get("selectedComposerIds")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        if let Some(id) = value.get("selectedComposerId").and_then(Value::as_str) {
            selected.push(id);
        }

        let heads = value
            .get("allComposers")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| decode_head(entry, &selected))
                    .collect()
            })
            .unwrap_or_default();

        Self { heads }
    }

    pub fn find(&self, conversation_id: &str) -> Option<&ConversationHead> {
        self.heads.iter().find(|h| h.id == conversation_id)
    }
}

fn decode_head(entry: &Value, selected: &[&str]) -> Option<ConversationHead> {
    let raw: RawHead = serde_json::from_value(entry.clone()).ok()?;
    let id = raw.composer_id.filter(|id| !id.is_empty())?;
    Some(ConversationHead {
        selected: selected.contains(&id.as_str()),
        id,
        name: raw.name,
        created_at: raw.created_at,
        last_updated_at: raw.last_updated_at,
        record: entry.clone(),
    })
}
