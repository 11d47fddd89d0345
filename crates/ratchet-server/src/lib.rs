//! ratchet-server library crate.
//!
//! The network-facing half of ws-ratchet: a `tokio-tungstenite` transport
//! that drives the lifecycle façade from `ratchet-core`.
//!
//! ```text
//! WebSocket clients
//!         ↕
//! [ratchet-server]
//!   ├── application/       Reference commands (/ping, /echo)
//!   └── infrastructure/
//!         ├── ws_server/     start/stop, accept loop, per-session task
//!         ├── ws_connection/ Connection handle + outbound writer
//!         └── config_file/   TOML config loading
//!         ↕
//! [ratchet-core]  ServerFacade, ConnectionRegistry, CommandTable
//! ```

/// Application layer: the reference command set.
pub mod application;

/// Infrastructure layer: WebSocket server, connections, config file.
pub mod infrastructure;
