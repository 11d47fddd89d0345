//! Application layer for ws-ratchet.
//!
//! Turns transport lifecycle events into registry updates and command
//! invocations.  Knows nothing about sockets or WebSocket framing; the
//! transport in `ratchet-server` drives it through [`ConnectionHandler`].

pub mod server_facade;

pub use server_facade::{ConnectionHandler, ServerFacade, ServerFacadeBuilder};
