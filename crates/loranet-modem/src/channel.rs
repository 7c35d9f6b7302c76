//! Command channel: one AT command in flight at a time
//!
//! The module's command protocol is half-duplex: responses carry no
//! correlation id, so a response can only be matched to a command if no
//! other command is outstanding. Callers take the [`Seat`] (an async mutex
//! around the writer) and keep it for the whole write/response/timeout
//! round trip. The read loop hands response bodies to the single pending
//! slot through [`CommandChannel::resolve`].

use parking_lot::Mutex;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{oneshot, MutexGuard};
use tracing::{debug, warn};

use crate::error::{ModemError, Result};
use crate::schema::{AtCommand, Reply};

/// Write half of the serial link
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// The one command awaiting its response
#[derive(Debug)]
struct PendingCommand {
    /// Wire line without terminator
    line: String,
    /// Expected response shape
    reply: Reply,
    /// Completion signal
    tx: oneshot::Sender<String>,
}

/// Serializes commands over the write half of the link
pub struct CommandChannel {
    writer: tokio::sync::Mutex<BoxedWriter>,
    pending: Mutex<Option<PendingCommand>>,
    timeout: Duration,
}

impl CommandChannel {
    /// Create a channel over a writer
    pub fn new(writer: BoxedWriter, timeout: Duration) -> Self {
        Self {
            writer: tokio::sync::Mutex::new(writer),
            pending: Mutex::new(None),
            timeout,
        }
    }

    /// Command round-trip timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Take exclusive use of the link, waiting for any command in flight
    pub async fn seat(&self) -> Seat<'_> {
        Seat {
            channel: self,
            writer: self.writer.lock().await,
        }
    }

    /// Run one command round trip
    pub async fn execute(&self, command: &AtCommand) -> Result<String> {
        self.seat().await.transact(command).await
    }

    /// Whether a command is awaiting its response
    pub fn is_pending(&self) -> bool {
        self.pending.lock().is_some()
    }

    /// Deliver a response body to the pending command
    ///
    /// Returns the body back when nothing was waiting for it.
    pub fn resolve(&self, body: String) -> Option<String> {
        let pending = self.pending.lock().take();
        match pending {
            Some(pending) => {
                debug!(command = %pending.line, reply = ?pending.reply, response = %body, "Resolved command");
                pending.tx.send(body).err()
            }
            None => Some(body),
        }
    }

    /// Fail the pending command, if any, because the link went away
    pub fn abort(&self) {
        if let Some(pending) = self.pending.lock().take() {
            warn!(command = %pending.line, "Dropping pending command");
        }
    }
}

impl std::fmt::Debug for CommandChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandChannel")
            .field("pending", &self.pending.lock().as_ref().map(|p| p.line.clone()))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Exclusive use of the command channel
pub struct Seat<'a> {
    channel: &'a CommandChannel,
    writer: MutexGuard<'a, BoxedWriter>,
}

impl Seat<'_> {
    /// Write a command and wait for its response or the timeout
    pub async fn transact(&mut self, command: &AtCommand) -> Result<String> {
        let text = command.text();
        let (tx, rx) = oneshot::channel();

        // The slot is filled before the write so a fast response cannot miss it
        *self.channel.pending.lock() = Some(PendingCommand {
            line: text.clone(),
            reply: command.reply(),
            tx,
        });

        debug!(command = %text, "Sending command");
        if let Err(e) = self.write_line(&command.line()).await {
            self.channel.pending.lock().take();
            return Err(e);
        }

        match tokio::time::timeout(self.channel.timeout, rx).await {
            Ok(Ok(body)) => command.interpret_response(body),
            Ok(Err(_)) => Err(ModemError::Disconnected),
            Err(_) => {
                self.channel.pending.lock().take();
                warn!(command = %text, "Command timed out");
                Err(ModemError::CommandTimeout {
                    command: text,
                    timeout_ms: self.channel.timeout.as_millis() as u64,
                })
            }
        }
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| ModemError::WriteError(e.to_string()))?;
        self.writer
            .flush()
            .await
            .map_err(|e| ModemError::WriteError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CommandName;
    use std::sync::Arc;
    use tokio::io::{AsyncBufReadExt, BufReader};

    fn channel(timeout_ms: u64) -> (Arc<CommandChannel>, tokio::io::DuplexStream) {
        let (near, far) = tokio::io::duplex(1024);
        (
            Arc::new(CommandChannel::new(
                Box::new(near),
                Duration::from_millis(timeout_ms),
            )),
            far,
        )
    }

    #[tokio::test]
    async fn test_query_round_trip() {
        let (channel, far) = channel(1000);
        let mut lines = BufReader::new(far).lines();

        let task = {
            let channel = channel.clone();
            tokio::spawn(async move {
                channel
                    .execute(&AtCommand::query(CommandName::Address).unwrap())
                    .await
            })
        };

        assert_eq!(lines.next_line().await.unwrap().unwrap(), "AT+ADDRESS?");
        assert!(channel.is_pending());
        assert!(channel.resolve("ADDRESS=2".to_string()).is_none());
        assert_eq!(task.await.unwrap().unwrap(), "2");
    }

    #[tokio::test]
    async fn test_unsolicited_body_returned() {
        let (channel, _far) = channel(1000);
        assert_eq!(channel.resolve("READY".to_string()).as_deref(), Some("READY"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_releases_seat() {
        let (channel, _far) = channel(50);
        let err = channel.execute(&AtCommand::probe()).await.unwrap_err();
        assert!(matches!(err, ModemError::CommandTimeout { ref command, timeout_ms: 50 } if command == "AT"));
        assert!(!channel.is_pending());

        // The seat is free again
        let _seat = channel.seat().await;
    }

    #[tokio::test]
    async fn test_abort_fails_waiter() {
        let (channel, far) = channel(5000);
        let mut lines = BufReader::new(far).lines();
        let task = {
            let channel = channel.clone();
            tokio::spawn(async move { channel.execute(&AtCommand::probe()).await })
        };
        lines.next_line().await.unwrap();
        channel.abort();
        assert!(matches!(
            task.await.unwrap(),
            Err(ModemError::Disconnected)
        ));
    }
}
