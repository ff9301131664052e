//! Per-conversation change tracking.
//!
//! Each conversation moves from *unseen* to *tracked* on its first
//! observation, silently. Every later observation compares message count and
//! newest timestamp against the stored state, reports growth that includes
//! fresh assistant output, and then overwrites the stored state.

use std::collections::HashMap;

use crate::model::{Message, Role};

/// What was last observed about one conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeState {
    pub last_message_count: usize,
    pub last_max_timestamp: i64,
}

impl ChangeState {
    fn of(messages: &[Message]) -> Self {
        Self {
            last_message_count: messages.len(),
            last_max_timestamp: max_timestamp(messages),
        }
    }
}

fn max_timestamp(messages: &[Message]) -> i64 {
    messages.iter().map(|m| m.timestamp).max().unwrap_or(0)
}

/// Notification payload: a conversation received new assistant output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrowthEvent {
    pub conversation_id: String,
    pub conversation_name: String,
    /// Messages appended since the previous observation.
    pub new_messages: usize,
}

/// Owns the change state of every observed conversation.
///
/// Created empty, mutated only through [`ChangeTracker::observe`], emptied
/// only by [`ChangeTracker::reset`].
#[derive(Debug, Default)]
pub struct ChangeTracker {
    states: HashMap<String, ChangeState>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observation and report genuine assistant growth.
    pub fn observe(&mut self, id: &str, name: &str, messages: &[Message]) -> Option<GrowthEvent> {
        let current = ChangeState::of(messages);
        let Some(previous) = self.states.insert(id.to_string(), current) else {
            tracing::debug!(conversation = id, count = current.last_message_count, "Tracking");
            return None;
        };

        let grew = current.last_message_count > previous.last_message_count
            || current.last_max_timestamp > previous.last_max_timestamp;
        if !grew {
            return None;
        }

        let appended = messages
            .get(previous.last_message_count..)
            .unwrap_or_default();
        let fresh_reply = appended
            .iter()
            .any(|m| m.role == Role::Assistant && m.timestamp > previous.last_max_timestamp);
        tracing::debug!(
            conversation = id,
            from = previous.last_message_count,
            to = current.last_message_count,
            fresh_reply,
            "Conversation grew"
        );

        fresh_reply.then(|| GrowthEvent {
            conversation_id: id.to_string(),
            conversation_name: name.to_string(),
            new_messages: appended.len(),
        })
    }

    pub fn state(&self, id: &str) -> Option<&ChangeState> {
        self.states.get(id)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Forget everything; the next observation of each conversation is a
    /// first observation again.
    pub fn reset(&mut self) {
        self.states.clear();
    }
}
