//! Read-only access to the host's SQLite key/value stores.
//!
//! Every `state.vscdb` file holds one or more two-column tables
//! (`key TEXT, value TEXT|BLOB`). Which table and which key a record lives
//! under depends on the host version, so lookups take ordered candidate
//! lists and return the first value that parses as JSON. Nothing in this
//! module writes to a store.

use eyre::{Context, Result, eyre};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::model::StoreRecord;

/// Generic key/value table present in every store.
pub const ITEM_TABLE: &str = "ItemTable";

/// Tables holding per-conversation bodies, in lookup order.
pub const CONVERSATION_TABLES: &[&str] = &["cursorDiskKV", ITEM_TABLE];

/// Key prefix of a conversation body: `composerData:<conversation id>`.
pub const CONVERSATION_KEY_PREFIX: &str = "composerData";

/// Key prefix of a single message row:
/// `bubbleId:<conversation id>:<bubble id>`.
pub const BUBBLE_KEY_PREFIX: &str = "bubbleId";

pub fn conversation_key(conversation_id: &str) -> String {
    format!("{CONVERSATION_KEY_PREFIX}:{conversation_id}")
}

pub fn bubble_key(conversation_id: &str, bubble_id: &str) -> String {
    format!("{BUBBLE_KEY_PREFIX}:{conversation_id}:{bubble_id}")
}

/// An open, read-only store. The connection closes when this is dropped.
pub struct Store {
    conn: Connection,
    path: PathBuf,
}

impl Store {
    /// Open an existing store read-only.
    ///
    /// A missing file is an error here (SQLite would otherwise happily
    /// report an empty database); callers that treat an unavailable store as
    /// empty match on the result.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(eyre!("Store not found: {}", path.display()));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .wrap_err_with(|| format!("Failed to open store: {}", path.display()))?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Raw value of `key` in `table`. `Ok(None)` when the key is absent;
    /// `Err` when the table does not exist or the query fails.
    pub fn raw_value(&self, table: &str, key: &str) -> Result<Option<String>> {
        let sql = format!("SELECT value FROM [{table}] WHERE key = ?1");
        let value = self
            .conn
            .query_row(&sql, [key], |row| {
                Ok(match row.get_ref(0)? {
                    ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                        Some(String::from_utf8_lossy(bytes).into_owned())
                    }
                    _ => None,
                })
            })
            .optional()
            .wrap_err_with(|| format!("Failed to read {table}[{key}]"))?;
        Ok(value.flatten())
    }

    /// Value of `key` in `table`, parsed as JSON. Every failure mode
    /// (missing table, missing key, malformed value) is `None`.
    pub fn parsed_value(&self, table: &str, key: &str) -> Option<Value> {
        let raw = match self.raw_value(table, key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::debug!(store = %self.path.display(), "{:#}", e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(
                    store = %self.path.display(),
                    table,
                    key,
                    "Skipping malformed value: {}",
                    e
                );
                None
            }
        }
    }

    /// First candidate key in `table` whose value parses.
    pub fn first_parsed(&self, table: &str, keys: &[&str]) -> Option<StoreRecord> {
        keys.iter().find_map(|key| {
            self.parsed_value(table, key).map(|value| StoreRecord {
                key: (*key).to_string(),
                value,
            })
        })
    }

    /// Body record of a conversation, trying each candidate table in order.
    pub fn conversation_record(&self, conversation_id: &str) -> Option<StoreRecord> {
        let key = conversation_key(conversation_id);
        CONVERSATION_TABLES.iter().find_map(|table| {
            self.parsed_value(table, &key).map(|value| StoreRecord {
                key: key.clone(),
                value,
            })
        })
    }

    /// Every parseable value in `table` whose key starts with `prefix`, in
    /// key order. An unreadable table or malformed value is skipped.
    pub fn prefixed(&self, table: &str, prefix: &str) -> Vec<StoreRecord> {
        let rows = match self.scan_prefix(table, prefix) {
            Ok(rows) => rows,
            Err(e) => {
                tracing::debug!(store = %self.path.display(), "{:#}", e);
                return Vec::new();
            }
        };
        rows.into_iter()
            .filter_map(|(key, raw)| match serde_json::from_str(&raw) {
                Ok(value) => Some(StoreRecord { key, value }),
                Err(e) => {
                    tracing::debug!(
                        store = %self.path.display(),
                        table,
                        key,
                        "Skipping malformed value: {}",
                        e
                    );
                    None
                }
            })
            .collect()
    }

    fn scan_prefix(&self, table: &str, prefix: &str) -> Result<Vec<(String, String)>> {
        let sql = format!(
            "SELECT key, value FROM [{table}] WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key"
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .wrap_err_with(|| format!("Failed to scan {table}[{prefix}*]"))?;
        let rows = stmt.query_map([prefix], |row| {
            let key: String = row.get(0)?;
            let value = match row.get_ref(1)? {
                ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                    Some(String::from_utf8_lossy(bytes).into_owned())
                }
                _ => None,
            };
            Ok((key, value))
        })?;

        let mut out = Vec::new();
        for row in rows {
            if let (key, Some(value)) = row.wrap_err_with(|| format!("Failed to scan {table}"))? {
                out.push((key, value));
            }
        }
        Ok(out)
    }

    /// Message rows stored apart from a conversation body, by bubble id.
    /// When both tables hold a bubble, the first table in
    /// [`CONVERSATION_TABLES`] wins.
    pub fn bubbles(&self, conversation_id: &str) -> HashMap<String, Value> {
        let prefix = bubble_key(conversation_id, "");
        let mut found = HashMap::new();
        for table in CONVERSATION_TABLES {
            for record in self.prefixed(table, &prefix) {
                if let Some(id) = record.key.strip_prefix(prefix.as_str()) {
                    found.entry(id.to_string()).or_insert(record.value);
                }
            }
        }
        found
    }
}
