//! Local-process session factory.
//!
//! Drives client binaries as child processes of the simulator itself: the
//! child's stdin is the session connection and a pump task appends its
//! stdout to the session's receive buffer. This is the runtime the binary
//! uses; containerized runtimes live outside this crate and only need to
//! implement [`SessionFactory`].

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::error::{Result, SimError};
use crate::process::{ProcessSession, SessionConn, SessionFactory, SharedBuffer};

/// Spawns client commands as local child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalProcessFactory;

impl SessionFactory for LocalProcessFactory {
    fn spawn<'a>(
        &'a self,
        command: &'a [String],
        capture_output: bool,
    ) -> Pin<Box<dyn Future<Output = Result<ProcessSession>> + Send + 'a>> {
        Box::pin(async move {
            let (program, args) = command
                .split_first()
                .ok_or_else(|| SimError::Provision("empty client command".into()))?;

            let mut child = Command::new(program)
                .args(args)
                .stdin(Stdio::piped())
                .stdout(if capture_output {
                    Stdio::piped()
                } else {
                    Stdio::null()
                })
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| {
                    SimError::Provision(format!("failed to spawn {:?}: {}", command, e))
                })?;

            let stdin = child
                .stdin
                .take()
                .ok_or_else(|| SimError::Provision("child stdin unavailable".into()))?;

            let buffer = SharedBuffer::default();
            if capture_output {
                if let Some(stdout) = child.stdout.take() {
                    tokio::spawn(pump_output(stdout, Arc::clone(&buffer)));
                }
            }

            tracing::debug!("spawned local client process: {:?}", command);
            let conn = LocalConn { stdin, child };
            Ok(ProcessSession::new(Box::new(conn), buffer))
        })
    }
}

/// Append everything the child prints to the shared receive buffer. Ends
/// when the child closes its stdout.
async fn pump_output(mut stdout: ChildStdout, buffer: SharedBuffer) {
    let mut chunk = [0u8; 4096];
    loop {
        match stdout.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let mut buffer = buffer
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                buffer.extend_from_slice(&chunk[..n]);
            }
        }
    }
}

struct LocalConn {
    stdin: ChildStdin,
    child: Child,
}

impl SessionConn for LocalConn {
    fn write_all<'a>(
        &'a mut self,
        payload: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = std::io::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.stdin.write_all(payload).await?;
            self.stdin.flush().await
        })
    }

    fn close(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            let _ = self.stdin.shutdown().await;
            let _ = self.child.start_kill();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{channel_permits, ProcessChannel};
    use std::time::Duration;

    /// `cat` echoes stdin back on stdout, which makes it a serviceable
    /// stand-in for a client that prints every delivered message.
    #[tokio::test]
    async fn test_local_process_roundtrip_through_cat() {
        let factory = Arc::new(LocalProcessFactory);
        let channel = ProcessChannel::open(factory, vec!["cat".to_string()], channel_permits(1))
            .await
            .unwrap();

        channel.send(b"Regular alice:hi\n").await.unwrap();

        let mut lines = Vec::new();
        for _ in 0..50 {
            lines = channel.read_lines(b'\n').await.unwrap();
            if !lines.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(lines, vec!["Regular alice:hi"]);

        channel.close().await;
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_provision_error() {
        let factory = LocalProcessFactory;
        let command = vec!["./definitely-not-a-real-client".to_string()];
        let result = factory.spawn(&command, true).await;
        assert!(matches!(result, Err(SimError::Provision(_))));
    }
}
