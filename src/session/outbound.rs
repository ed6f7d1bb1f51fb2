//! Per-connection outbound queue
//!
//! Every connection owns a bounded queue of encoded frames drained by a
//! dedicated writer task. Producers never wait on a peer's socket: enqueue
//! is `try_send`, and a full queue drops the frame for that one recipient.
//!
//! ```text
//!   fan-out ──try_send──► [ mpsc (bounded) ] ──► writer task ──► TCP
//! ```
//!
//! A frame is always a complete unit (a line, or a transfer header plus its
//! body), so a drop never leaves a half-written transfer on the wire.

use std::fmt;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};

use crate::registry::ConnectionId;

/// Why a frame could not be queued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    /// Recipient's queue is at capacity
    Full,
    /// Recipient's writer has exited
    Closed,
}

impl fmt::Display for EnqueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnqueueError::Full => write!(f, "outbound queue full"),
            EnqueueError::Closed => write!(f, "connection closed"),
        }
    }
}

impl std::error::Error for EnqueueError {}

/// Cloneable handle for queueing frames to one connection
#[derive(Debug, Clone)]
pub struct Outbound {
    session_id: ConnectionId,
    tx: mpsc::Sender<Bytes>,
}

impl Outbound {
    /// Create a handle and the receiving end for its writer task
    pub fn channel(session_id: ConnectionId, capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { session_id, tx }, rx)
    }

    /// Session this handle writes to
    pub fn session_id(&self) -> ConnectionId {
        self.session_id
    }

    /// Queue a frame without waiting
    pub fn try_send(&self, frame: Bytes) -> Result<(), EnqueueError> {
        self.tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EnqueueError::Full,
            mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }
}

/// Drain the queue into the socket until the queue closes or shutdown fires
///
/// Returns the number of bytes written.
pub async fn run_writer<W>(
    session_id: ConnectionId,
    mut rx: mpsc::Receiver<Bytes>,
    mut writer: W,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;

    if *shutdown.borrow() {
        return Ok(written);
    }

    loop {
        let frame = tokio::select! {
            _ = shutdown.changed() => break,
            frame = rx.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        tokio::select! {
            _ = shutdown.changed() => break,
            result = write_frame(&mut writer, &frame) => {
                if let Err(e) = result {
                    tracing::debug!(session_id = session_id, error = %e, "Write failed");
                    // Stop accepting frames for a dead socket
                    rx.close();
                    return Err(e);
                }
                written += frame.len() as u64;
            }
        }
    }

    let _ = writer.shutdown().await;
    Ok(written)
}

async fn write_frame<W>(writer: &mut W, frame: &Bytes) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_full_queue_rejects() {
        let (outbound, _rx) = Outbound::channel(7, 2);

        assert_eq!(outbound.session_id(), 7);
        outbound.try_send(Bytes::from_static(b"a\n")).unwrap();
        outbound.try_send(Bytes::from_static(b"b\n")).unwrap();
        assert_eq!(
            outbound.try_send(Bytes::from_static(b"c\n")),
            Err(EnqueueError::Full)
        );
    }

    #[tokio::test]
    async fn test_closed_queue_rejects() {
        let (outbound, rx) = Outbound::channel(1, 4);
        drop(rx);

        assert_eq!(
            outbound.try_send(Bytes::from_static(b"a\n")),
            Err(EnqueueError::Closed)
        );
    }

    #[tokio::test]
    async fn test_writer_drains_in_order() {
        let (outbound, rx) = Outbound::channel(1, 8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (client, server) = tokio::io::duplex(1024);

        outbound.try_send(Bytes::from_static(b"one\n")).unwrap();
        outbound.try_send(Bytes::from_static(b"two\n")).unwrap();
        drop(outbound);

        let written = run_writer(1, rx, server, shutdown_rx).await.unwrap();
        assert_eq!(written, 8);

        let mut client = client;
        let mut received = String::new();
        client.read_to_string(&mut received).await.unwrap();
        assert_eq!(received, "one\ntwo\n");
    }

    #[tokio::test]
    async fn test_writer_stops_on_shutdown() {
        let (_outbound, rx) = Outbound::channel(1, 8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (_client, server) = tokio::io::duplex(64);

        let handle = tokio::spawn(run_writer(1, rx, server, shutdown_rx));
        shutdown_tx.send(true).unwrap();

        let written = handle.await.unwrap().unwrap();
        assert_eq!(written, 0);
    }
}
