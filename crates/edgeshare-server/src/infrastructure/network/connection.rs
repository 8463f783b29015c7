//! Per-connection I/O tasks.
//!
//! Every accepted stream is split in two:
//!
//! - A **reader task** posts each chunk of bytes to the reactor as a
//!   `Received` event and a final `Hangup` at end of stream.  It does no
//!   decoding; the session's frame reader runs on the reactor.
//! - A **writer task** drains an unbounded channel of encoded frames.  The
//!   reactor side of that channel is a [`ChannelSink`], so handlers never
//!   wait on the socket.
//!
//! The `Connected` event is posted before either task starts, so it is always
//! the first event the reactor sees for the connection's target.
//!
//! Every writer task holds a [`WriterGuard`].  At shutdown,
//! [`WriterDrain::wait`] returns once all guards are gone, i.e. once every
//! goodbye frame has been written and the sockets are shut down.

use std::net::SocketAddr;
use std::time::Duration;

use edgeshare_core::protocol::encode_message;
use edgeshare_core::{Event, EventSender, EventTarget, Message};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::events::{NewConnection, ServerEvent};
use crate::application::session::{MessageSink, SinkError};

/// Size of each read from the socket.
const READ_CHUNK: usize = 8 * 1024;

/// Work item for the writer task.
#[derive(Debug)]
pub enum Outbound {
    /// An encoded frame, length prefix included.
    Frame(Vec<u8>),
    /// Flush, shut down the write side and stop reading.
    Close,
}

/// [`MessageSink`] that queues frames for a writer task.
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Outbound>,
    closed: bool,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self { tx, closed: false }
    }
}

impl MessageSink for ChannelSink {
    fn send(&mut self, msg: &Message) -> Result<(), SinkError> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        let frame = encode_message(msg)?;
        self.tx
            .send(Outbound::Frame(frame))
            .map_err(|_| SinkError::Closed)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            let _ = self.tx.send(Outbound::Close);
        }
    }
}

// ── Writer drain ──────────────────────────────────────────────────────────────

/// Held by a writer task for as long as it runs.
#[derive(Debug, Clone)]
pub struct WriterGuard(mpsc::Sender<()>);

/// Waits for every writer task that holds one of its guards.
#[derive(Debug)]
pub struct WriterDrain {
    tx: mpsc::Sender<()>,
    rx: mpsc::Receiver<()>,
}

impl Default for WriterDrain {
    fn default() -> Self {
        Self::new()
    }
}

impl WriterDrain {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self { tx, rx }
    }

    pub fn guard(&self) -> WriterGuard {
        WriterGuard(self.tx.clone())
    }

    /// Returns `true` once every guard was dropped, or `false` if some writer
    /// is still running after `limit`.
    pub async fn wait(self, limit: Duration) -> bool {
        let Self { tx, mut rx } = self;
        drop(tx);
        // No guard ever sends, so `recv` only returns when all are dropped.
        tokio::time::timeout(limit, rx.recv()).await.is_ok()
    }
}

/// Registers `stream` with the reactor and starts its reader and writer
/// tasks.  Returns the connection's event target.
pub fn spawn_connection<S>(
    stream: S,
    peer: SocketAddr,
    sender: &EventSender<ServerEvent>,
    guard: WriterGuard,
) -> EventTarget
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let target = sender.new_target();
    let id = Uuid::new_v4();
    let (read_half, write_half) = tokio::io::split(stream);
    let (tx, rx) = mpsc::unbounded_channel();

    sender.post(Event::new(
        target,
        ServerEvent::Connected(NewConnection {
            target,
            id,
            peer,
            sink: Box::new(ChannelSink::new(tx)),
        }),
    ));

    let reader = tokio::spawn(read_loop(read_half, target, sender.clone()));
    let abort = reader.abort_handle();
    tokio::spawn(async move {
        write_loop(write_half, rx, peer, Some(abort)).await;
        drop(guard);
    });
    debug!(%peer, %id, %target, "connection tasks started");
    target
}

/// Posts inbound bytes until end of stream or a read error, then `Hangup`.
pub async fn read_loop<R>(mut reader: R, target: EventTarget, sender: EventSender<ServerEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if sender.is_shut_down() {
                    return;
                }
                sender.post(Event::new(target, ServerEvent::Received(buf[..n].to_vec())));
            }
            Err(e) => {
                debug!(%target, error = %e, "read failed");
                break;
            }
        }
    }
    sender.post(Event::new(target, ServerEvent::Hangup));
}

/// Writes queued frames until [`Outbound::Close`], a write error, or the
/// sink is dropped.  On `Close` the reader is stopped as well.
pub async fn write_loop<W>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
    peer: SocketAddr,
    reader: Option<AbortHandle>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(item) = rx.recv().await {
        match item {
            Outbound::Frame(bytes) => {
                if let Err(e) = writer.write_all(&bytes).await {
                    warn!(%peer, error = %e, "write failed");
                    return;
                }
            }
            Outbound::Close => {
                if let Some(reader) = reader {
                    reader.abort();
                }
                break;
            }
        }
    }
    if let Err(e) = writer.shutdown().await {
        debug!(%peer, error = %e, "shutdown failed");
    }
}
