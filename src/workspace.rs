//! Locating the host's store files on disk.
//!
//! ```text
//! <user dir>/globalStorage/state.vscdb            conversation bodies
//! <user dir>/workspaceStorage/<id>/state.vscdb    per-workspace composer index
//! <user dir>/workspaceStorage/<id>/workspace.json { "folder": "file:///…" }
//! ```

use eyre::{Context, Result, eyre};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const STORE_FILE: &str = "state.vscdb";

/// Default per-user data directory of the host.
pub fn default_user_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("Cursor").join("User"))
}

pub fn global_store_path(user_dir: &Path) -> PathBuf {
    user_dir.join("globalStorage").join(STORE_FILE)
}

/// One workspace store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    /// Directory name under `workspaceStorage`.
    pub id: String,
    pub db_path: PathBuf,
    /// Folder or workspace file the host opened, when recorded.
    pub folder: Option<String>,
}

#[derive(Deserialize, Default)]
struct WorkspaceFile {
    folder: Option<String>,
    workspace: Option<String>,
}

/// Every workspace directory that has a store, sorted by id.
///
/// A missing `workspaceStorage` directory is an empty list; an unreadable
/// one is an error.
pub fn discover_workspaces(user_dir: &Path) -> Result<Vec<Workspace>> {
    let root = user_dir.join("workspaceStorage");
    if !root.is_dir() {
        tracing::debug!("No workspace storage at {}", root.display());
        return Ok(Vec::new());
    }

    let mut workspaces: Vec<Workspace> = fs::read_dir(&root)
        .wrap_err_with(|| format!("Failed to read {}", root.display()))?
        .flatten()
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|e| {
            let db_path = e.path().join(STORE_FILE);
            if !db_path.is_file() {
                return None;
            }
            Some(Workspace {
                id: e.file_name().to_string_lossy().into_owned(),
                folder: read_folder(&e.path()),
                db_path,
            })
        })
        .collect();
    workspaces.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(workspaces)
}

fn read_folder(dir: &Path) -> Option<String> {
    let content = fs::read_to_string(dir.join("workspace.json")).ok()?;
    let file: WorkspaceFile = serde_json::from_str(&content).ok()?;
    file.folder.or(file.workspace)
}

/// Resolve the user data directory: explicit choice, else the platform
/// default. Failing to resolve one is the only hard startup error.
pub fn resolve_user_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    let dir = explicit.or_else(default_user_dir).ok_or_else(|| {
        eyre!("Could not determine the Cursor data directory.\nUse --user-dir to specify it, or set user_dir in config.toml.")
    })?;
    if !dir.is_dir() {
        return Err(eyre!(
            "Cursor data directory not found at: {}\nUse --user-dir to specify the path manually.",
            dir.display()
        ));
    }
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn discovers_workspaces_with_stores() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("workspaceStorage");
        for id in ["bbb", "aaa", "empty"] {
            fs::create_dir_all(root.join(id)).unwrap();
        }
        fs::write(root.join("aaa").join(STORE_FILE), b"").unwrap();
        fs::write(root.join("bbb").join(STORE_FILE), b"").unwrap();
        fs::write(
            root.join("bbb").join("workspace.json"),
            r#"{"folder":"file:///home/me/project"}"#,
        )
        .unwrap();

        let found = discover_workspaces(dir.path()).unwrap();
        let ids: Vec<_> = found.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, ["aaa", "bbb"]);
        assert_eq!(found[0].folder, None);
        assert_eq!(found[1].folder.as_deref(), Some("file:///home/me/project"));
    }

    #[test]
    fn missing_workspace_storage_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(discover_workspaces(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn explicit_user_dir_must_exist() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            resolve_user_dir(Some(dir.path().to_path_buf())).unwrap(),
            dir.path()
        );
        let err = resolve_user_dir(Some(dir.path().join("nope"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
