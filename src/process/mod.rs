//! Serialized, throttled, reconnecting channels to live client processes.
//!
//! Every agent owns exactly one [`ProcessChannel`] wrapping one live
//! session (a bidirectional connection plus a receive buffer the runtime
//! pumps client output into). Two disciplines govern every operation:
//!
//! - a **global permit set** shared by all channels, capped at the host's
//!   available parallelism by default: each write/read ultimately rides an
//!   exec session into the client's runtime, and hundreds of concurrent
//!   sessions would overwhelm the host's process-exec subsystem;
//! - a **per-channel mutex**, so one agent has at most one in-flight
//!   write-or-read at a time.
//!
//! A failed write triggers one transparent reconnect: the dead session is
//! closed, the original [`SessionFactory`] capability is asked for a fresh
//! session running the same command, and the write is retried once. A
//! second consecutive failure is an error the owning agent treats as fatal
//! to itself.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::BytesMut;
use tokio::sync::{Mutex, Semaphore};

use crate::error::{Result, SimError};

/// Receive buffer shared between a channel and the runtime's output pump.
pub type SharedBuffer = Arc<std::sync::Mutex<BytesMut>>;

/// One live bidirectional connection to a client process.
pub trait SessionConn: Send {
    /// Write the whole payload to the connection.
    fn write_all<'a>(
        &'a mut self,
        payload: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = std::io::Result<()>> + Send + 'a>>;

    /// Release the connection. Close errors are unactionable and swallowed.
    fn close(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// A live session: connection plus the buffer its output lands in.
pub struct ProcessSession {
    /// The bidirectional connection.
    pub conn: Box<dyn SessionConn>,
    /// Buffer the runtime appends client output to.
    pub buffer: SharedBuffer,
}

impl ProcessSession {
    /// Bundle a connection with its receive buffer.
    pub fn new(conn: Box<dyn SessionConn>, buffer: SharedBuffer) -> Self {
        Self { conn, buffer }
    }
}

/// The runtime capability that spawns a live client session for a command.
///
/// Provisioning collaborators hand one of these to each agent; the channel
/// also re-invokes it to replace a session whose connection died.
pub trait SessionFactory: Send + Sync {
    /// Spawn a new session executing `command`, optionally capturing its
    /// output into the session's receive buffer.
    fn spawn<'a>(
        &'a self,
        command: &'a [String],
        capture_output: bool,
    ) -> Pin<Box<dyn Future<Output = Result<ProcessSession>> + Send + 'a>>;
}

/// Build the global channel permit set shared by every agent of a run.
///
/// A `cap` of zero selects the host's available parallelism.
pub fn channel_permits(cap: usize) -> Arc<Semaphore> {
    let cap = if cap == 0 {
        std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(4)
    } else {
        cap
    };
    Arc::new(Semaphore::new(cap))
}

/// Throttled, serialized, auto-reconnecting channel to one client process.
pub struct ProcessChannel {
    session: Mutex<ProcessSession>,
    factory: Arc<dyn SessionFactory>,
    command: Vec<String>,
    permits: Arc<Semaphore>,
    closed: AtomicBool,
}

impl ProcessChannel {
    /// Spawn the initial session and wrap it in a channel.
    pub async fn open(
        factory: Arc<dyn SessionFactory>,
        command: Vec<String>,
        permits: Arc<Semaphore>,
    ) -> Result<Self> {
        let session = factory.spawn(&command, true).await?;
        Ok(Self {
            session: Mutex::new(session),
            factory,
            command,
            permits,
            closed: AtomicBool::new(false),
        })
    }

    /// Write one payload under the permit and mutex disciplines.
    ///
    /// On a write failure the session is replaced via the factory and the
    /// write retried once; a second failure is returned as an error.
    pub async fn send(&self, payload: &[u8]) -> Result<()> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| SimError::ChannelClosed)?;
        let mut session = self.session.lock().await;
        if self.closed.load(Ordering::Acquire) {
            return Err(SimError::ChannelClosed);
        }

        match session.conn.write_all(payload).await {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::warn!("channel write failed, reconnecting: {}", err);
                self.reconnect_and_retry(&mut session, payload).await
            }
        }
    }

    /// Drain complete `delim`-terminated lines from the receive buffer.
    ///
    /// Never blocks waiting for more data: a trailing partial line stays in
    /// the buffer and an empty buffer yields an empty Vec. Lines consisting
    /// solely of the delimiter are dropped.
    pub async fn read_lines(&self, delim: u8) -> Result<Vec<String>> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| SimError::ChannelClosed)?;
        let session = self.session.lock().await;
        if self.closed.load(Ordering::Acquire) {
            return Err(SimError::ChannelClosed);
        }

        let mut buffer = session
            .buffer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let mut lines = Vec::new();
        while let Some(pos) = buffer.iter().position(|&b| b == delim) {
            let line = buffer.split_to(pos + 1);
            if line.len() > 1 {
                lines.push(String::from_utf8_lossy(&line[..line.len() - 1]).into_owned());
            }
        }
        Ok(lines)
    }

    /// Close the underlying connection. Idempotent; subsequent operations
    /// fail fast with [`SimError::ChannelClosed`].
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut session = self.session.lock().await;
        session.conn.close().await;
    }

    async fn reconnect_and_retry(
        &self,
        session: &mut ProcessSession,
        payload: &[u8],
    ) -> Result<()> {
        session.conn.close().await;

        let fresh = self
            .factory
            .spawn(&self.command, true)
            .await
            .map_err(|e| SimError::Channel(format!("reconnect failed: {e}")))?;
        *session = fresh;
        tracing::debug!("channel session replaced for {:?}", self.command);

        session
            .conn
            .write_all(payload)
            .await
            .map_err(|e| SimError::Channel(format!("write failed after reconnect: {e}")))
    }
}
