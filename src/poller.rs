//! Recurring poll cycles over every tracked conversation.
//!
//! [`Poller::poll_once`] runs one cycle synchronously, which is what tests
//! drive. [`Poller::spawn`] moves the poller onto a worker thread that runs
//! one cycle per tick until stopped. The worker owns the poller (and with it
//! the change tracker), so no state is shared between threads.

use crossbeam_channel::{Receiver, Sender, select, tick, unbounded};
use eyre::{Result, eyre};
use std::path::PathBuf;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::assemble::{Assembler, StoreLocation};
use crate::model::Message;
use crate::tracker::{ChangeTracker, GrowthEvent};
use crate::workspace::{discover_workspaces, global_store_path};

/// Time between poll cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollInterval(Duration);

impl PollInterval {
    pub const DEFAULT_MS: u64 = 5000;
    pub const MIN_MS: u64 = 1000;

    /// Build from milliseconds, clamped to [`PollInterval::MIN_MS`].
    pub fn from_millis(ms: u64) -> Self {
        Self(Duration::from_millis(ms.max(Self::MIN_MS)))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl Default for PollInterval {
    fn default() -> Self {
        Self::from_millis(Self::DEFAULT_MS)
    }
}

/// A conversation as seen by one poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub id: String,
    pub name: String,
    pub messages: Vec<Message>,
}

/// Supplies the tracked conversations for a cycle.
pub trait ConversationSource {
    fn snapshot(&mut self) -> Vec<Snapshot>;
}

/// Reads every workspace store under a host user directory.
///
/// Each cycle rediscovers workspaces, so stores created while watching are
/// picked up. Store handles live only for the duration of one workspace's
/// reads.
pub struct CursorSource {
    user_dir: PathBuf,
}

impl CursorSource {
    pub fn new(user_dir: PathBuf) -> Self {
        Self { user_dir }
    }
}

impl ConversationSource for CursorSource {
    fn snapshot(&mut self) -> Vec<Snapshot> {
        let workspaces = match discover_workspaces(&self.user_dir) {
            Ok(w) => w,
            Err(e) => {
                tracing::warn!("Workspace discovery failed: {:#}", e);
                return Vec::new();
            }
        };
        let global = Some(global_store_path(&self.user_dir)).filter(|p| p.is_file());

        let mut snapshots = Vec::new();
        for workspace in &workspaces {
            let assembler = Assembler::open(&StoreLocation::for_workspace(workspace, global.clone()));
            for head in assembler.heads().iter().filter(|h| h.is_tracked()) {
                snapshots.push(Snapshot {
                    id: head.id.clone(),
                    name: head.display_name().to_string(),
                    messages: assembler.load_with_head(&head.id, Some(head)),
                });
            }
        }
        snapshots
    }
}

/// Drives the change tracker over a conversation source.
pub struct Poller<S> {
    source: S,
    tracker: ChangeTracker,
    events: Sender<GrowthEvent>,
}

impl<S: ConversationSource> Poller<S> {
    pub fn new(source: S, events: Sender<GrowthEvent>) -> Self {
        Self {
            source,
            tracker: ChangeTracker::new(),
            events,
        }
    }

    /// Run one cycle. Returns the number of growth events emitted.
    pub fn poll_once(&mut self) -> usize {
        let snapshots = self.source.snapshot();
        let mut emitted = 0;
        for snapshot in &snapshots {
            let Some(event) = self
                .tracker
                .observe(&snapshot.id, &snapshot.name, &snapshot.messages)
            else {
                continue;
            };
            tracing::info!(
                conversation = %event.conversation_id,
                "New reply in \"{}\"",
                event.conversation_name
            );
            if self.events.send(event).is_err() {
                tracing::debug!("Event receiver dropped");
            }
            emitted += 1;
        }
        tracing::debug!(conversations = snapshots.len(), emitted, "Poll cycle done");
        emitted
    }

    /// Forget all tracked state.
    pub fn reset(&mut self) {
        self.tracker.reset();
    }

    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }
}

enum Command {
    Refresh,
    Stop,
}

/// Control handle of a running poller. Dropping it stops the worker.
pub struct PollerHandle {
    commands: Sender<Command>,
    worker: Option<JoinHandle<()>>,
}

impl<S: ConversationSource + Send + 'static> Poller<S> {
    /// Start polling on a worker thread.
    ///
    /// A baseline cycle runs immediately so that existing conversations are
    /// tracked without notifications; afterwards one cycle runs per tick.
    /// The ticker buffers at most one tick, so a slow cycle delays the next
    /// one instead of overlapping it.
    pub fn spawn(mut self, interval: PollInterval) -> Result<PollerHandle> {
        let (commands, inbox) = unbounded::<Command>();
        let worker = std::thread::Builder::new()
            .name("chat-poller".into())
            .spawn(move || {
                self.poll_once();
                self.run(&inbox, interval.as_duration());
            })
            .map_err(|e| eyre!("Failed to start poller thread: {}", e))?;
        Ok(PollerHandle {
            commands,
            worker: Some(worker),
        })
    }

    fn run(&mut self, inbox: &Receiver<Command>, every: Duration) {
        let ticker = tick(every);
        loop {
            select! {
                recv(inbox) -> cmd => match cmd {
                    Ok(Command::Refresh) => {
                        self.reset();
                        self.poll_once();
                    }
                    Ok(Command::Stop) | Err(_) => break,
                },
                recv(ticker) -> _ => {
                    self.poll_once();
                }
            }
        }
        tracing::debug!("Poller stopped");
    }
}

impl PollerHandle {
    /// Clear tracked state and re-baseline on the worker.
    pub fn refresh(&self) {
        let _ = self.commands.send(Command::Refresh);
    }

    /// Stop the worker after its current cycle and wait for it.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.commands.send(Command::Stop);
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            tracing::error!("Poller thread panicked");
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
