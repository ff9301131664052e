use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Author of a normalized message.
///
/// Anything the source data does not clearly mark as the user is treated as
/// the assistant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Map a numeric role code as the host writes it (`1` is the user).
    pub fn from_code(code: i64) -> Self {
        if code == 1 { Self::User } else { Self::Assistant }
    }

    /// Map a role name; `None` for anything other than `user`/`assistant`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One canonical chat message. `text` is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
    /// Milliseconds since the Unix epoch. Not guaranteed to be ordered.
    pub timestamp: i64,
    /// `true` when the message describes a tool run or file edit rather
    /// than authored prose.
    pub is_action: bool,
}

/// A conversation together with its normalized messages, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub name: Option<String>,
    pub created_at: i64,
    pub last_updated_at: i64,
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Display name, falling back to the identifier.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().filter(|n| !n.is_empty()).unwrap_or(&self.id)
    }
}

/// A conversation's entry in a workspace's composer index.
///
/// `record` is the raw index entry; the assembler hands it to the schema
/// normalizer and classifier as the companion record.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationHead {
    pub id: String,
    pub name: Option<String>,
    pub created_at: Option<i64>,
    pub last_updated_at: Option<i64>,
    /// Selected in the host's own UI state.
    pub selected: bool,
    pub record: Value,
}

/// Names the host gives to conversations the user never renamed.
const DEFAULT_NAMES: &[&str] = &["", "New Chat", "New Composer", "Untitled"];

impl ConversationHead {
    pub fn has_custom_name(&self) -> bool {
        self.name
            .as_deref()
            .is_some_and(|n| !DEFAULT_NAMES.contains(&n.trim()))
    }

    /// Only selected or renamed conversations are watched; untouched
    /// scratch chats are ignored.
    pub fn is_tracked(&self) -> bool {
        self.selected || self.has_custom_name()
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().filter(|n| !n.is_empty()).unwrap_or(&self.id)
    }
}

/// A raw key/value pair read from a store, value already parsed as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreRecord {
    pub key: String,
    pub value: Value,
}
