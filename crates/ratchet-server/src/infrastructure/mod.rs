//! Infrastructure layer for ratchet-server.
//!
//! Handles all I/O: binding the listener, upgrading TCP connections to
//! WebSocket sessions, writing outbound frames, and reading the config file.
//!
//! # What does NOT belong here?
//!
//! - Registry or dispatch rules (that is `ratchet-core`)
//! - Command implementations (that is the application layer)
//! - CLI parsing (that is done in `main.rs`)

pub mod config_file;
pub mod ws_connection;
pub mod ws_server;

pub use config_file::{load_config, ConfigFileError};
pub use ws_connection::WsConnection;
pub use ws_server::{ServerError, WebSocketServer};
