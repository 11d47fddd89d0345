//! Application layer for ratchet-server.
//!
//! Holds the reference command set the binary composes into its façade.  The
//! lifecycle and dispatch logic itself lives in `ratchet-core`.

pub mod commands;

pub use commands::{with_reference_commands, EchoCommand};
