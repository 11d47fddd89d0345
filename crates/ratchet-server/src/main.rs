//! ws-ratchet: a minimal WebSocket server shell.
//!
//! Accepts WebSocket connections, keeps track of the live ones, and runs
//! slash commands sent by clients (`/ping`, `/echo <text>`).
//!
//! # Usage
//!
//! ```text
//! ws-ratchet [OPTIONS]
//!
//! Options:
//!   --config <PATH>             TOML config file (keys: port, bind_address,
//!                               close_connection_on_error, run_client_commands)
//!   --port <PORT>               Listener port [default: 8080]
//!   --bind <IP>                 Listener address [default: 0.0.0.0]
//!   --keep-connection-on-error  Do not close a connection after a transport error
//!   --ignore-client-commands    Do not interpret messages as commands
//!   --command-prefix <PREFIX>   Command prefix [default: /]
//! ```
//!
//! Flags override values from the config file.  Log verbosity follows
//! `RUST_LOG` (default `info`).

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ratchet_core::{ServerConfig, ServerFacade};
use ratchet_server::application::with_reference_commands;
use ratchet_server::infrastructure::{load_config, WebSocketServer};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Minimal WebSocket server shell with client commands.
#[derive(Debug, Parser)]
#[command(
    name = "ws-ratchet",
    about = "Minimal WebSocket server shell with client commands",
    version
)]
struct Cli {
    /// TOML configuration file.  Missing keys take their defaults.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// TCP port to listen on (overrides the config file).
    #[arg(long)]
    port: Option<u16>,

    /// IP address to bind (overrides the config file).
    ///
    /// Use `0.0.0.0` to accept connections on every interface, or
    /// `127.0.0.1` to accept only local connections.
    #[arg(long, value_name = "IP")]
    bind: Option<String>,

    /// Keep a connection open after the transport reports an error on it.
    #[arg(long)]
    keep_connection_on_error: bool,

    /// Ignore client commands; incoming messages are dropped.
    #[arg(long)]
    ignore_client_commands: bool,

    /// Prefix that marks a message as a command.
    #[arg(long, default_value = "/")]
    command_prefix: String,
}

impl Cli {
    /// Builds the effective [`ServerConfig`]: config file (or defaults), then
    /// flag overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded or `--bind` is not
    /// a valid IP address.
    fn server_config(&self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => ServerConfig::default(),
        };

        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(bind) = &self.bind {
            config.bind_address = bind
                .parse::<IpAddr>()
                .with_context(|| format!("invalid bind address: '{bind}'"))?;
        }
        if self.keep_connection_on_error {
            config.close_connection_on_error = false;
        }
        if self.ignore_client_commands {
            config.run_client_commands = false;
        }

        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.server_config()?;

    info!(
        "ws-ratchet starting — bind={}, close_on_error={}, commands={}",
        config.bind_addr(),
        config.close_connection_on_error,
        config.run_client_commands
    );

    let builder = with_reference_commands(ServerFacade::builder(config), &cli.command_prefix);
    let mut server = WebSocketServer::new(builder);
    server
        .try_start()
        .await
        .context("failed to start WebSocket server")?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("received Ctrl+C — shutting down");

    server.stop()?;
    server.wait().await?;

    info!("ws-ratchet stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
