//! Domain types for ws-ratchet.
//!
//! Everything here is free of sockets and async runtimes: connection handles
//! are traits the transport implements, and the registry and command table
//! are plain in-memory structures.  That keeps them testable with simple
//! doubles.

pub mod command;
pub mod config;
pub mod connection;
pub mod registry;

pub use command::{
    handler_identifier, CommandHandler, CommandParser, CommandTable, NoCommands,
    SlashCommandParser,
};
pub use config::{ConfigError, ServerConfig};
pub use connection::{Connection, ConnectionId, Payload, TransportError};
pub use registry::ConnectionRegistry;
