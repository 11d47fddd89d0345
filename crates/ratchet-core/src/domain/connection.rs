//! Connection handles and message payloads.
//!
//! A [`Connection`] is owned by the transport layer.  The core never creates
//! or destroys one; it only observes the open/close notifications and uses the
//! two capabilities every transport must offer: sending a payload and
//! requesting a close.
//!
//! Identity is carried by [`ConnectionId`], so two `Arc`s pointing at the same
//! session compare equal through their ids even if the transport hands out
//! different wrapper values.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Identity of one live WebSocket session.
///
/// A thin wrapper around a random (v4) UUID.  Transports mint one per accepted
/// connection with [`ConnectionId::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Mints a fresh, random connection id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One complete message received from, or sent to, a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// A UTF-8 text message.
    Text(String),
    /// An opaque binary message.
    Binary(Vec<u8>),
}

impl Payload {
    /// Returns the text content, or `None` for binary payloads.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            Payload::Binary(_) => None,
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_owned())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Binary(bytes)
    }
}

/// Errors a transport reports when it cannot accept an outbound payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The connection is closed (or closing) and no longer accepts frames.
    #[error("connection {0} is closed")]
    Closed(ConnectionId),

    /// The outbound queue for the connection is full.
    #[error("outbound queue for connection {0} is full")]
    QueueFull(ConnectionId),
}

/// A transport-owned handle to one client session.
///
/// Implementations must be cheap to call from inside lifecycle callbacks:
/// neither method may block waiting on the network.
pub trait Connection: Send + Sync {
    /// Identity of this session.
    fn id(&self) -> ConnectionId;

    /// Queues `payload` for delivery to the client.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the connection can no longer accept data.
    fn send(&self, payload: Payload) -> Result<(), TransportError>;

    /// Requests that the transport close this connection.
    ///
    /// The transport later reports the close through the `on_close` callback.
    /// Calling this more than once has no additional effect.
    fn close(&self);
}

// ── Tests ─────────────────────────────────────────────────────────────────────
