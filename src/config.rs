use eyre::{Context, Result, eyre};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::poller::PollInterval;

/// Contents of `config.toml`. Every field is optional.
#[derive(Deserialize, Default, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub user_dir: Option<PathBuf>,
    pub poll_interval_ms: Option<u64>,
}

/// Default config location: `$CONFIG/cursor-chat-watch/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cursor-chat-watch").join("config.toml"))
}

/// Load the config file. An explicit path must exist; the default path is
/// optional.
pub fn load_file_config(explicit_path: Option<&Path>) -> Result<FileConfig> {
    let path = if let Some(p) = explicit_path {
        if !p.exists() {
            return Err(eyre!("Config file not found: {}", p.display()));
        }
        Some(p.to_path_buf())
    } else {
        default_config_path().filter(|p| p.exists())
    };

    match path {
        None => Ok(FileConfig::default()),
        Some(p) => {
            let content = fs::read_to_string(&p)
                .wrap_err_with(|| format!("Failed to read config: {}", p.display()))?;
            toml::from_str(&content)
                .wrap_err_with(|| format!("Failed to parse config: {}", p.display()))
        }
    }
}

/// Settings after merging CLI flags, the config file and defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub user_dir: Option<PathBuf>,
    pub poll_interval: PollInterval,
}

impl Settings {
    /// CLI values take precedence over the file; the interval is clamped.
    pub fn resolve(file: FileConfig, cli_user_dir: Option<PathBuf>, cli_interval_ms: Option<u64>) -> Self {
        let poll_interval = cli_interval_ms
            .or(file.poll_interval_ms)
            .map(PollInterval::from_millis)
            .unwrap_or_default();
        if let Some(ms) = cli_interval_ms.or(file.poll_interval_ms)
            && ms < PollInterval::MIN_MS
        {
            tracing::warn!(
                "Poll interval {}ms is below the minimum, using {}ms",
                ms,
                PollInterval::MIN_MS
            );
        }
        Self {
            user_dir: cli_user_dir.or(file.user_dir),
            poll_interval,
        }
    }
}
