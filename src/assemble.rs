//! Conversation assembly: store lookup → message location → classification
//! → checkpoint enrichment.

use serde_json::Value;
use std::path::PathBuf;

use crate::classify::{ClassifyContext, classify_entry, entry_checkpoint_summary};
use crate::importer::{COMPOSER_INDEX_KEYS, ComposerIndex, header_bubble_ids, locate_messages};
use crate::model::{Conversation, ConversationHead, Message};
use crate::store::{ITEM_TABLE, Store};
use crate::utils::{extract_last_updated, now_millis, positive_millis, value_at};
use crate::workspace::Workspace;

/// Where one workspace's conversations are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLocation {
    pub workspace_id: String,
    /// Holds the workspace's composer index, and older conversation bodies.
    pub workspace_db: PathBuf,
    /// Shared store holding conversation bodies on newer host versions.
    /// Consulted before the workspace store.
    pub global_db: Option<PathBuf>,
}

impl StoreLocation {
    pub fn for_workspace(workspace: &Workspace, global_db: Option<PathBuf>) -> Self {
        Self {
            workspace_id: workspace.id.clone(),
            workspace_db: workspace.db_path.clone(),
            global_db,
        }
    }
}

/// Open stores for one workspace. Dropping the assembler closes them.
///
/// Stores that cannot be opened are treated as empty.
pub struct Assembler {
    workspace_id: String,
    workspace: Option<Store>,
    global: Option<Store>,
    clock: fn() -> i64,
}

fn open_or_log(path: &std::path::Path) -> Option<Store> {
    match Store::open(path) {
        Ok(store) => Some(store),
        Err(e) => {
            tracing::debug!("{:#}", e);
            None
        }
    }
}

impl Assembler {
    pub fn open(location: &StoreLocation) -> Self {
        Self {
            workspace_id: location.workspace_id.clone(),
            workspace: open_or_log(&location.workspace_db),
            global: location.global_db.as_deref().and_then(open_or_log),
            clock: now_millis,
        }
    }

    /// Replace the wall clock used for entries that carry no time at all.
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    /// Stores in lookup order: global first, workspace second.
    fn stores(&self) -> impl Iterator<Item = &Store> {
        self.global.iter().chain(self.workspace.iter())
    }

    /// The workspace's composer index; empty when the store or the record
    /// is missing.
    pub fn index(&self) -> ComposerIndex {
        let Some(store) = &self.workspace else {
            return ComposerIndex::default();
        };
        match store.first_parsed(ITEM_TABLE, COMPOSER_INDEX_KEYS) {
            Some(record) => ComposerIndex::from_value(&record.value),
            None => {
                tracing::debug!(workspace = %self.workspace_id, "No composer index");
                ComposerIndex::default()
            }
        }
    }

    /// Conversation heads from the workspace's composer index.
    pub fn heads(&self) -> Vec<ConversationHead> {
        self.index().heads
    }

    /// Normalized messages of a conversation, looking its head up in the
    /// workspace index.
    pub fn load(&self, conversation_id: &str) -> Vec<Message> {
        let index = self.index();
        self.load_with_head(conversation_id, index.find(conversation_id))
    }

    /// Normalized messages of a conversation whose index entry is already
    /// known. Never fails: anything missing yields fewer (or no) messages.
    pub fn load_with_head(
        &self,
        conversation_id: &str,
        head: Option<&ConversationHead>,
    ) -> Vec<Message> {
        let found = self
            .stores()
            .find_map(|store| Some((store.conversation_record(conversation_id)?, store)));
        let record = found.as_ref().map(|(r, _)| &r.value);
        let companion = head.map(|h| &h.record);

        let fetched: Vec<Value>;
        let mut entries = locate_messages(record, companion);
        if entries.is_empty()
            && let Some((record, store)) = &found
        {
            fetched = bubbles_from_headers(store, conversation_id, &record.value);
            entries = &fetched;
        }

        if entries.is_empty() {
            tracing::debug!(
                workspace = %self.workspace_id,
                conversation = conversation_id,
                found = found.is_some(),
                "No messages located"
            );
            return Vec::new();
        }

        let ctx = ClassifyContext {
            conversation_updated_at: record.and_then(extract_last_updated),
            companion_updated_at: head
                .and_then(|h| h.last_updated_at)
                .or_else(|| companion.and_then(extract_last_updated)),
            clock: self.clock,
        };
        let mut messages: Vec<Message> = entries
            .iter()
            .filter_map(|entry| classify_entry(entry, &ctx))
            .collect();
        enrich_from_checkpoints(&mut messages, entries);
        messages
    }

    /// A full conversation: head metadata plus normalized messages.
    pub fn assemble(&self, head: &ConversationHead) -> Conversation {
        let messages = self.load_with_head(&head.id, Some(head));
        let first = messages.iter().map(|m| m.timestamp).min();
        let last = messages.iter().map(|m| m.timestamp).max();
        let created_at = head.created_at.or(first).unwrap_or_default();
        Conversation {
            id: head.id.clone(),
            name: head.name.clone(),
            created_at,
            last_updated_at: head.last_updated_at.or(last).unwrap_or(created_at),
            messages,
        }
    }

    /// Every conversation in the workspace index, assembled in index order.
    pub fn conversations(&self) -> Vec<Conversation> {
        self.heads().iter().map(|h| self.assemble(h)).collect()
    }
}

/// Rebuild a headers-only conversation from its separately stored rows.
/// Rows that are missing or malformed are skipped.
fn bubbles_from_headers(store: &Store, conversation_id: &str, record: &Value) -> Vec<Value> {
    let ids = header_bubble_ids(record);
    if ids.is_empty() {
        return Vec::new();
    }
    let mut rows = store.bubbles(conversation_id);
    let bubbles: Vec<Value> = ids.iter().filter_map(|id| rows.remove(*id)).collect();
    if bubbles.len() < ids.len() {
        tracing::debug!(
            conversation = conversation_id,
            "{} of {} bubble rows missing",
            ids.len() - bubbles.len(),
            ids.len()
        );
    }
    bubbles
}

/// Attach checkpoint summaries that classification did not capture.
///
/// A message is matched to the raw entry whose end-of-turn time equals the
/// message timestamp exactly; no exact match, no change.
fn enrich_from_checkpoints(messages: &mut [Message], originals: &[Value]) {
    for message in messages.iter_mut() {
        let Some(original) = originals.iter().find(|e| {
            value_at(e, &["timingInfo", "clientEndTime"]).and_then(positive_millis)
                == Some(message.timestamp)
        }) else {
            continue;
        };
        let Some(summary) = entry_checkpoint_summary(original) else {
            continue;
        };
        if message.text.contains(&summary) {
            continue;
        }
        message.text = format!("{summary}\n\n{}", message.text);
        message.is_action = true;
    }
}
