//! Server configuration.
//!
//! [`ServerConfig`] is fixed for the lifetime of a running server.  It can be
//! built in code, taken from [`Default`], or parsed from TOML:
//!
//! ```toml
//! port = 9001
//! bind_address = "127.0.0.1"
//! close_connection_on_error = false
//! run_client_commands = true
//! ```
//!
//! Every key is optional; a missing key takes its default value, so an empty
//! document is a valid configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use serde::Deserialize;
use thiserror::Error;

/// Default TCP port the server listens on.
pub const DEFAULT_PORT: u16 = 8080;

/// Error type for configuration parsing.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Runtime settings for one WebSocket server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// TCP port to bind.  `0` asks the OS for an ephemeral port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Interface to bind.  `0.0.0.0` accepts connections on every interface.
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// Close a connection as soon as the transport reports an error on it.
    #[serde(default = "default_true")]
    pub close_connection_on_error: bool,

    /// Interpret incoming messages as client commands.
    #[serde(default = "default_true")]
    pub run_client_commands: bool,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    /// | Field                       | Default   |
    /// |-----------------------------|-----------|
    /// | port                        | `8080`    |
    /// | bind_address                | `0.0.0.0` |
    /// | close_connection_on_error   | `true`    |
    /// | run_client_commands         | `true`    |
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            close_connection_on_error: true,
            run_client_commands: true,
        }
    }
}

impl ServerConfig {
    /// The socket address the listener binds to.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the text is not valid TOML or a value
    /// has the wrong type.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
