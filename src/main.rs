use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use crossbeam_channel::unbounded;
use eyre::{Context, Result, eyre};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, prelude::*};

use cursor_chat_watch::config::{Settings, load_file_config};
use cursor_chat_watch::workspace::{
    Workspace, discover_workspaces, global_store_path, resolve_user_dir,
};
use cursor_chat_watch::{Assembler, Conversation, CursorSource, Poller, StoreLocation};

/// Read Cursor AI chat history and watch conversations for new replies.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Cursor user data directory (the one containing workspaceStorage).
    /// Auto-detected if omitted.
    #[arg(long, value_name = "PATH", global = true)]
    user_dir: Option<PathBuf>,

    /// Path to a specific configuration file.
    /// Defaults to $XDG_CONFIG_HOME/cursor-chat-watch/config.toml
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Log debug details to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List workspace stores.
    Workspaces,

    /// List conversations.
    List {
        /// Only this workspace (directory name under workspaceStorage).
        #[arg(long, value_name = "ID")]
        workspace: Option<String>,

        /// Include conversations that are neither selected nor renamed.
        #[arg(long)]
        all: bool,
    },

    /// Print the normalized messages of one conversation.
    Show {
        #[arg(value_name = "CONVERSATION_ID")]
        conversation_id: String,

        /// Only look in this workspace.
        #[arg(long, value_name = "ID")]
        workspace: Option<String>,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Poll tracked conversations and print a line for every new reply.
    Watch {
        /// Poll interval in milliseconds (minimum 1000).
        #[arg(long, value_name = "MS")]
        interval_ms: Option<u64>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "warn,cursor_chat_watch=debug"
    } else {
        "warn,cursor_chat_watch=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(filter),
        )
        .init();
}

fn format_time(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // 1. Load config file (CLI path > default path)
    let file_cfg = load_file_config(cli.config.as_deref())?;

    // 2. Merge settings (CLI > Config > Default)
    let interval_ms = match &cli.command {
        Command::Watch { interval_ms } => *interval_ms,
        _ => None,
    };
    let settings = Settings::resolve(file_cfg, cli.user_dir, interval_ms);

    // 3. Resolve the store location (hard failure if impossible)
    let user_dir = resolve_user_dir(settings.user_dir.clone())?;

    match cli.command {
        Command::Workspaces => print_workspaces(&user_dir),
        Command::List { workspace, all } => list_conversations(&user_dir, workspace.as_deref(), all),
        Command::Show {
            conversation_id,
            workspace,
            json,
        } => show_conversation(&user_dir, &conversation_id, workspace.as_deref(), json),
        Command::Watch { .. } => watch(user_dir, &settings),
    }
}

fn workspaces(user_dir: &Path, only: Option<&str>) -> Result<Vec<Workspace>> {
    let all = discover_workspaces(user_dir)?;
    match only {
        None => Ok(all),
        Some(id) => {
            let picked: Vec<_> = all.into_iter().filter(|w| w.id == id).collect();
            if picked.is_empty() {
                return Err(eyre!("Workspace not found: {}", id));
            }
            Ok(picked)
        }
    }
}

fn global_store(user_dir: &Path) -> Option<PathBuf> {
    Some(global_store_path(user_dir)).filter(|p| p.is_file())
}

fn print_workspaces(user_dir: &Path) -> Result<()> {
    for ws in workspaces(user_dir, None)? {
        println!("{}  {}", ws.id, ws.folder.as_deref().unwrap_or("-"));
    }
    Ok(())
}

fn list_conversations(user_dir: &Path, only: Option<&str>, all: bool) -> Result<()> {
    let global = global_store(user_dir);
    for ws in workspaces(user_dir, only)? {
        let assembler = Assembler::open(&StoreLocation::for_workspace(&ws, global.clone()));
        let heads: Vec<_> = assembler
            .heads()
            .into_iter()
            .filter(|h| all || h.is_tracked())
            .collect();
        if heads.is_empty() {
            continue;
        }
        println!("{}  {}", ws.id, ws.folder.as_deref().unwrap_or("-"));
        for head in &heads {
            let conversation = assembler.assemble(head);
            println!(
                "  {}  {}  {:>4} msgs  {}{}",
                conversation.id,
                format_time(conversation.last_updated_at),
                conversation.messages.len(),
                head.display_name(),
                if head.selected { "  *" } else { "" },
            );
        }
    }
    Ok(())
}

fn find_conversation(user_dir: &Path, id: &str, only: Option<&str>) -> Result<Option<Conversation>> {
    let global = global_store(user_dir);
    for ws in workspaces(user_dir, only)? {
        let assembler = Assembler::open(&StoreLocation::for_workspace(&ws, global.clone()));
        if let Some(head) = assembler.index().find(id) {
            return Ok(Some(assembler.assemble(head)));
        }
    }

    // Not indexed by any workspace; the body may still be in the global store.
    let Some(global) = global else {
        return Ok(None);
    };
    let assembler = Assembler::open(&StoreLocation {
        workspace_id: "global".to_string(),
        workspace_db: global,
        global_db: None,
    });
    let messages = assembler.load_with_head(id, None);
    if messages.is_empty() {
        return Ok(None);
    }
    let first = messages.iter().map(|m| m.timestamp).min().unwrap_or_default();
    let last = messages.iter().map(|m| m.timestamp).max().unwrap_or_default();
    Ok(Some(Conversation {
        id: id.to_string(),
        name: None,
        created_at: first,
        last_updated_at: last,
        messages,
    }))
}

fn show_conversation(user_dir: &Path, id: &str, only: Option<&str>, json: bool) -> Result<()> {
    let conversation = find_conversation(user_dir, id, only)?
        .ok_or_else(|| eyre!("Conversation not found: {}", id))?;

    if json {
        let out = serde_json::to_string_pretty(&conversation)
            .wrap_err("Failed to serialize conversation")?;
        println!("{}", out);
        return Ok(());
    }

    println!("# {}", conversation.display_name());
    println!();
    for msg in &conversation.messages {
        let kind = if msg.is_action { " (action)" } else { "" };
        println!("## {}{} · {}", msg.role, kind, format_time(msg.timestamp));
        println!();
        println!("{}", msg.text);
        println!();
    }
    Ok(())
}

fn watch(user_dir: PathBuf, settings: &Settings) -> Result<()> {
    let (tx, rx) = unbounded();
    eprintln!(
        "Watching {} every {}ms",
        user_dir.display(),
        settings.poll_interval.as_duration().as_millis()
    );
    let handle = Poller::new(CursorSource::new(user_dir), tx).spawn(settings.poll_interval)?;

    for event in rx.iter() {
        println!(
            "{}  New reply in \"{}\" ({} new message{})",
            format_time(chrono::Utc::now().timestamp_millis()),
            event.conversation_name,
            event.new_messages,
            if event.new_messages == 1 { "" } else { "s" },
        );
    }

    handle.stop();
    Ok(())
}
