//! Per-run logging: the static user snapshot and the append-only event log.
//!
//! Each run gets its own directory under the configured output root with
//! two flat files:
//!
//! - `users.json`: every agent's identity, behavior parameters, and
//!   assigned address, written once before the run starts;
//! - `messages.json`: one JSON array of send/receive events, appended
//!   incrementally by a dedicated writer task fed over a channel.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::Result;
use crate::network::SimUser;
use crate::protocol::{BehaviorParams, MessageEvent};

/// Capacity of the event queue between agents and the writer task.
const EVENT_QUEUE_CAPACITY: usize = 1024;

/// Static per-agent record for the users.json snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Identity and contact lists.
    pub user: SimUser,
    /// Behavior parameters the agent runs with.
    pub behavior: BehaviorParams,
    /// Human-readable behavior description.
    pub behavior_name: String,
    /// Externally assigned address, when the runtime provides one.
    pub address: Option<String>,
}

/// Owns one run's log directory.
pub struct SimLogger {
    dir: PathBuf,
    run_id: Uuid,
}

impl SimLogger {
    /// Create `<base>/<timestamp>-<run id prefix>` and a logger for it.
    pub fn create(base: &Path) -> Result<Self> {
        let run_id = Uuid::new_v4();
        let stamp = Utc::now().format("%Y%m%d%H%M%S");
        let dir = base.join(format!("{}-{}", stamp, &run_id.to_string()[..8]));
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, run_id })
    }

    /// The run's log directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The run's identifier.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Write the static users.json snapshot.
    pub fn log_users(&self, records: &[UserRecord]) -> Result<()> {
        let json = serde_json::to_string_pretty(records)?;
        std::fs::write(self.dir.join("users.json"), json)?;
        Ok(())
    }

    /// Start the messages.json writer task.
    ///
    /// Agents emit events into the returned sender. The task streams one
    /// JSON array to disk and closes it when every sender is dropped or
    /// the shutdown signal fires, whichever comes first; events still
    /// queued at shutdown are dropped.
    pub fn start_event_log(
        &self,
        mut shutdown: watch::Receiver<bool>,
    ) -> (mpsc::Sender<MessageEvent>, JoinHandle<Result<()>>) {
        let path = self.dir.join("messages.json");
        let (tx, mut rx) = mpsc::channel::<MessageEvent>(EVENT_QUEUE_CAPACITY);

        let handle = tokio::spawn(async move {
            let mut file = File::create(&path).await?;
            file.write_all(b"[").await?;
            let mut first = true;

            loop {
                tokio::select! {
                    event = rx.recv() => match event {
                        Some(event) => {
                            let json = serde_json::to_string_pretty(&event)?;
                            if first {
                                first = false;
                            } else {
                                file.write_all(b",\n").await?;
                            }
                            file.write_all(json.as_bytes()).await?;
                        }
                        None => break,
                    },
                    _ = shutdown.changed() => break,
                }
            }

            file.write_all(b"]\n").await?;
            file.flush().await?;
            Ok(())
        });

        (tx, handle)
    }
}
