#![allow(dead_code)]

use rusqlite::{Connection, params};
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const INDEX_KEY: &str = "composer.composerData";

/// A throwaway host user directory:
/// `globalStorage/state.vscdb` plus `workspaceStorage/<id>/state.vscdb`.
pub struct UserDir {
    dir: TempDir,
}

impl UserDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn global_db(&self) -> PathBuf {
        self.path().join("globalStorage").join("state.vscdb")
    }

    pub fn workspace_db(&self, id: &str) -> PathBuf {
        self.path()
            .join("workspaceStorage")
            .join(id)
            .join("state.vscdb")
    }

    /// Upsert rows into the global store, creating it if needed.
    pub fn put_global(&self, table: &str, key: &str, value: &Value) {
        write_rows(&self.global_db(), &[(table, key, value.to_string())]);
    }

    /// Upsert rows into a workspace store, creating it if needed.
    pub fn put_workspace(&self, id: &str, table: &str, key: &str, value: &Value) {
        write_rows(&self.workspace_db(id), &[(table, key, value.to_string())]);
    }

    /// Store a composer index for a workspace.
    pub fn put_index(&self, workspace: &str, index: &Value) {
        self.put_workspace(workspace, "ItemTable", INDEX_KEY, index);
    }

    /// Store a raw (possibly non-JSON) value in a workspace store.
    pub fn put_workspace_raw(&self, id: &str, table: &str, key: &str, raw: &str) {
        write_rows(&self.workspace_db(id), &[(table, key, raw.to_string())]);
    }
}

/// Write rows into a store with the host's two key/value tables.
pub fn write_rows(path: &Path, rows: &[(&str, &str, String)]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let conn = Connection::open(path).unwrap();
    for table in ["ItemTable", "cursorDiskKV"] {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS [{table}] (key TEXT UNIQUE ON CONFLICT REPLACE, value BLOB)"
        ))
        .unwrap();
    }
    for (table, key, value) in rows {
        conn.execute(
            &format!("INSERT INTO [{table}] (key, value) VALUES (?1, ?2)"),
            params![key, value],
        )
        .unwrap();
    }
}

pub fn body_key(id: &str) -> String {
    format!("composerData:{id}")
}

/// Index entry in the `allComposers` list.
pub fn head(id: &str, name: &str, last_updated_at: i64) -> Value {
    json!({
        "composerId": id,
        "name": name,
        "createdAt": 1_000,
        "lastUpdatedAt": last_updated_at,
    })
}

pub fn user(text: &str, timestamp: i64) -> Value {
    json!({"type": 1, "text": text, "timestamp": timestamp})
}

pub fn assistant(text: &str, timestamp: i64) -> Value {
    json!({"type": 2, "text": text, "timestamp": timestamp})
}
