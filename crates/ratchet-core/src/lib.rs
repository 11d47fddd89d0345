//! # ratchet-core
//!
//! The transport-independent heart of ws-ratchet, a minimal WebSocket server
//! shell.  It tracks which connections are live and optionally treats incoming
//! messages as named commands dispatched to handler functions.
//!
//! ```text
//! transport (ratchet-server)
//!     │ on_open / on_message / on_error / on_close
//!     ▼
//! application::ServerFacade ──► domain::ConnectionRegistry
//!     │
//!     └─► domain::CommandParser ──► domain::CommandTable ──► handler
//! ```
//!
//! - **`domain`**: connection handles, payloads, the registry, command naming
//!   and parsing, and [`ServerConfig`].
//! - **`application`**: the [`ServerFacade`] lifecycle handler and its builder.
//!
//! This crate performs no I/O and spawns no tasks.

pub mod application;
pub mod domain;

pub use application::{ConnectionHandler, ServerFacade, ServerFacadeBuilder};
pub use domain::{
    handler_identifier, CommandHandler, CommandParser, CommandTable, ConfigError, Connection,
    ConnectionId, ConnectionRegistry, NoCommands, Payload, ServerConfig, SlashCommandParser,
    TransportError,
};
