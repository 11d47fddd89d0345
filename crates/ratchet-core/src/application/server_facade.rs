//! The server façade: lifecycle callbacks and command dispatch.
//!
//! The transport drives a [`ConnectionHandler`] with four events per session:
//!
//! ```text
//! on_open ──► on_message* / on_error* ──► on_close
//! ```
//!
//! [`ServerFacade`] is the handler.  It keeps the [`ConnectionRegistry`] in
//! step with open/close events, applies the close-on-error policy, and turns
//! messages into command invocations:
//!
//! 1. If `run_client_commands` is off, the message is dropped.
//! 2. The [`CommandParser`] derives a command name (or none).
//! 3. The name is normalised and looked up in the [`CommandTable`].
//! 4. The matching handler, if any, runs once with the connection and payload.
//!
//! A miss at any step is silent.  Errors reported through `on_error` are never
//! propagated; the façade either closes the connection or ignores the error.

use std::error::Error;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::domain::command::{CommandHandler, CommandParser, CommandTable, NoCommands};
use crate::domain::config::ServerConfig;
use crate::domain::connection::{Connection, Payload};
use crate::domain::registry::ConnectionRegistry;

/// The four transport events, as seen by whoever consumes them.
///
/// Callbacks for one connection arrive strictly in order and never overlap;
/// callbacks for different connections may interleave on different threads.
/// Implementations must not block.
pub trait ConnectionHandler: Send + Sync {
    /// The handshake for `connection` completed.
    fn on_open(&self, connection: Arc<dyn Connection>);

    /// `connection` disconnected.  Called exactly once per opened connection.
    fn on_close(&self, connection: &dyn Connection);

    /// The transport hit an error on `connection`.
    fn on_error(&self, connection: &dyn Connection, error: &dyn Error);

    /// A complete message arrived on `connection`.
    fn on_message(&self, connection: &Arc<dyn Connection>, payload: &Payload);
}

/// Lifecycle handler with a connection registry and command dispatch.
pub struct ServerFacade {
    config: ServerConfig,
    registry: ConnectionRegistry,
    commands: Arc<CommandTable>,
    parser: Arc<dyn CommandParser>,
}

impl ServerFacade {
    /// Creates a façade with no commands and the base (never-matching) parser.
    pub fn new(config: ServerConfig) -> Self {
        Self::builder(config).build()
    }

    /// Starts building a façade for `config`.
    pub fn builder(config: ServerConfig) -> ServerFacadeBuilder {
        ServerFacadeBuilder::new(config)
    }

    /// The configuration this façade was built with.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The live connection set.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// The registered command handlers.
    pub fn commands(&self) -> &CommandTable {
        &self.commands
    }

    /// Number of currently open connections.
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Runs the command named by `payload`, if any.
    ///
    /// Returns `true` if a handler was invoked.  Ignores the
    /// `run_client_commands` flag; [`ConnectionHandler::on_message`] checks it.
    pub fn dispatch(&self, connection: &Arc<dyn Connection>, payload: &Payload) -> bool {
        let Some(name) = self.parser.command_name(connection.as_ref(), payload) else {
            trace!("connection {}: message carries no command", connection.id());
            return false;
        };

        match self.commands.resolve(&name) {
            Some(handler) => {
                debug!("connection {}: running command '{name}'", connection.id());
                handler.handle(connection, payload);
                true
            }
            None => {
                trace!("connection {}: no handler for command '{name}'", connection.id());
                false
            }
        }
    }
}

impl ConnectionHandler for ServerFacade {
    fn on_open(&self, connection: Arc<dyn Connection>) {
        let id = connection.id();
        if self.registry.add(connection) {
            debug!("connection {id} opened ({} open)", self.registry.len());
        }
    }

    fn on_close(&self, connection: &dyn Connection) {
        let id = connection.id();
        if self.registry.remove(id) {
            debug!("connection {id} closed ({} open)", self.registry.len());
        }
    }

    fn on_error(&self, connection: &dyn Connection, _error: &dyn Error) {
        if self.config.close_connection_on_error {
            connection.close();
        }
    }

    fn on_message(&self, connection: &Arc<dyn Connection>, payload: &Payload) {
        if self.config.run_client_commands {
            self.dispatch(connection, payload);
        }
    }
}

/// Builder for [`ServerFacade`].
///
/// `build` borrows the builder, so one builder can mint any number of façades.
/// Each gets its own empty registry and shares the command table and parser.
#[derive(Clone)]
pub struct ServerFacadeBuilder {
    config: ServerConfig,
    commands: CommandTable,
    parser: Arc<dyn CommandParser>,
}

impl ServerFacadeBuilder {
    /// Creates a builder with no commands and the [`NoCommands`] parser.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            commands: CommandTable::new(),
            parser: Arc::new(NoCommands),
        }
    }

    /// The configuration the built façades will use.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Sets the strategy that derives command names from messages.
    pub fn parser(mut self, parser: impl CommandParser + 'static) -> Self {
        self.parser = Arc::new(parser);
        self
    }

    /// Registers `handler` for the command `name`.
    ///
    /// An empty `name` is ignored.
    pub fn command(mut self, name: &str, handler: impl CommandHandler + 'static) -> Self {
        self.commands.register(name, handler);
        self
    }

    /// Builds a façade with a fresh, empty registry.
    pub fn build(&self) -> ServerFacade {
        ServerFacade {
            config: self.config.clone(),
            registry: ConnectionRegistry::new(),
            commands: Arc::new(self.commands.clone()),
            parser: Arc::clone(&self.parser),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
