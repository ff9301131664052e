//! # cursor-chat-watch
//!
//! Reads the AI chat history that the [Cursor](https://cursor.com) editor
//! keeps in its SQLite state stores, normalizes it into plain
//! user/assistant messages, and watches conversations for new replies.
//!
//! ## What it does
//!
//! Cursor persists conversations ("composers") as JSON values inside
//! key/value tables of `state.vscdb` files: a global store for conversation
//! bodies and one store per workspace holding the conversation index. The
//! record layout has changed across many releases, so every record is
//! decoded defensively against a fixed list of known shapes:
//!
//! - [`store`] opens stores **read-only** and fetches values by candidate
//!   key and table.
//! - [`importer`] locates the message array inside a record.
//! - [`classify`] decides each entry's role, text, time and whether it is a
//!   tool/file-edit action; [`diff`] renders checkpoint edits.
//! - [`assemble`] ties these together into a [`model::Conversation`].
//! - [`tracker`] and [`poller`] re-read tracked conversations on an interval
//!   and emit a [`tracker::GrowthEvent`] when new assistant output appears.
//!
//! ## Usage
//!
//! ```sh
//! # List conversations that are selected or renamed
//! cursor-chat-watch list
//!
//! # Print one conversation
//! cursor-chat-watch show 3f1c2a9e-... --json
//!
//! # Watch for new replies every 5 seconds
//! cursor-chat-watch watch --interval-ms 5000
//! ```
//!
//! Preferences can be persisted in `~/.config/cursor-chat-watch/config.toml`.
//!
//! ## Compatibility
//!
//! Tracks Cursor's internal (undocumented) storage layout. Record shapes
//! outside the known set yield empty conversations rather than errors.

pub mod assemble;
pub mod classify;
pub mod config;
pub mod diff;
pub mod importer;
pub mod model;
pub mod poller;
pub mod store;
pub mod tracker;
pub mod utils;
pub mod workspace;

pub use assemble::{Assembler, StoreLocation};
pub use model::{Conversation, ConversationHead, Message, Role};
pub use poller::{ConversationSource, CursorSource, PollInterval, Poller, PollerHandle};
pub use tracker::{ChangeTracker, GrowthEvent};
