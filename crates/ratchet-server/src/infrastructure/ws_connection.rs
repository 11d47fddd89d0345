//! The transport's connection handle.
//!
//! [`WsConnection`] is what the façade and command handlers see.  It never
//! touches the socket itself: `send` queues a frame on a bounded channel and
//! `close` raises a signal.  A dedicated writer task ([`OutboundQueue::drain_into`])
//! owns the WebSocket sink and does the actual writing.
//!
//! ```text
//! handler ──send()──► mpsc (128) ──► writer task ──► WebSocket sink
//! handler ──close()─► Notify ──────►      └─ flush queue, send Close, exit
//! ```
//!
//! When the writer exits (after a close or a failed write) the session's read
//! loop notices and ends the session, which in turn reports `on_close`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Notify;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;
use tracing::debug;

use ratchet_core::{Connection, ConnectionId, Payload, TransportError};

/// Maximum number of frames queued per connection before `send` reports
/// [`TransportError::QueueFull`].
pub const OUTBOUND_QUEUE_CAPACITY: usize = 128;

/// Write half of an accepted WebSocket session.
pub type WsSink = SplitSink<WebSocketStream<TcpStream>, WsMessage>;

/// Handle to one accepted WebSocket session.
#[derive(Debug)]
pub struct WsConnection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    tx: mpsc::Sender<Payload>,
    close_signal: Arc<Notify>,
    close_requested: AtomicBool,
}

/// Receiving side of a [`WsConnection`]: the queued frames and the close signal.
#[derive(Debug)]
pub struct OutboundQueue {
    rx: mpsc::Receiver<Payload>,
    close_signal: Arc<Notify>,
}

impl WsConnection {
    /// Creates a handle for the session with `peer_addr` and the queue its
    /// writer task drains.
    pub fn new(peer_addr: SocketAddr) -> (Self, OutboundQueue) {
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        let close_signal = Arc::new(Notify::new());
        let connection = Self {
            id: ConnectionId::new(),
            peer_addr,
            tx,
            close_signal: Arc::clone(&close_signal),
            close_requested: AtomicBool::new(false),
        };
        (connection, OutboundQueue { rx, close_signal })
    }

    /// Remote address of the client.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// `true` once [`Connection::close`] has been called.
    pub fn is_close_requested(&self) -> bool {
        self.close_requested.load(Ordering::Acquire)
    }
}

impl Connection for WsConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, payload: Payload) -> Result<(), TransportError> {
        if self.is_close_requested() {
            return Err(TransportError::Closed(self.id));
        }
        self.tx.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => TransportError::QueueFull(self.id),
            TrySendError::Closed(_) => TransportError::Closed(self.id),
        })
    }

    fn close(&self) {
        if !self.close_requested.swap(true, Ordering::AcqRel) {
            // `notify_one` stores a permit if the writer is not waiting yet.
            self.close_signal.notify_one();
        }
    }
}

impl OutboundQueue {
    /// Writes queued frames to `sink` until the connection is closed or a
    /// write fails.
    ///
    /// On a close request, frames already queued are flushed before the
    /// Close frame so a reply sent just before closing still arrives.
    pub async fn drain_into(mut self, mut sink: WsSink, id: ConnectionId) {
        loop {
            // `biased` polls the close signal first, so a close requested while
            // frames are still queued is seen before the next frame is written.
            tokio::select! {
                biased;
                _ = self.close_signal.notified() => {
                    // Flush whatever the handlers queued before asking to
                    // close; `try_recv` never waits, so a busy sender cannot
                    // hold the close back.
                    while let Ok(payload) = self.rx.try_recv() {
                        if sink.send(into_ws_message(payload)).await.is_err() {
                            return;
                        }
                    }

                    // Start the closing handshake.  Returning ends the
                    // session: its read loop is watching this task.
                    if let Err(e) = sink.send(WsMessage::Close(None)).await {
                        debug!("connection {id}: failed to send Close frame: {e}");
                    }
                    debug!("connection {id}: closed by server");
                    return;
                }
                frame = self.rx.recv() => {
                    // `None` means every `WsConnection` handle is gone: the
                    // session is over and nobody can queue anything else.
                    let Some(payload) = frame else {
                        return;
                    };

                    // A failed write means the client is gone.  Exiting lets
                    // the session notice and report the close.
                    if let Err(e) = sink.send(into_ws_message(payload)).await {
                        debug!("connection {id}: WebSocket send failed (client disconnected): {e}");
                        return;
                    }
                }
            }
        }
    }
}

/// Converts a core payload into the matching WebSocket data frame.
pub fn into_ws_message(payload: Payload) -> WsMessage {
    match payload {
        Payload::Text(text) => WsMessage::Text(text),
        Payload::Binary(bytes) => WsMessage::Binary(bytes),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
