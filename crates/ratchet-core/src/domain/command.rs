//! Client commands: naming, handler table and parsing strategies.
//!
//! A client asks for a command by sending a message the configured
//! [`CommandParser`] recognises.  The parser yields a command *name*; the name
//! is normalised to a handler *identifier* with [`handler_identifier`] and
//! looked up in a [`CommandTable`].
//!
//! ```text
//! "/echo hi"  ──parser──►  "echo"  ──normalise──►  "commandEcho"  ──table──►  handler
//! ```
//!
//! Normalisation upper-cases the first character and prefixes
//! [`HANDLER_PREFIX`], so `"echo"` and `"Echo"` resolve to the same handler.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::connection::{Connection, Payload};

/// Marker prepended to every handler identifier.
pub const HANDLER_PREFIX: &str = "command";

/// Prefix [`SlashCommandParser`] looks for when none is configured.
pub const DEFAULT_COMMAND_PREFIX: &str = "/";

/// Normalises a command name into its handler identifier.
///
/// Returns `None` for an empty name, which never names a command.
///
/// ```rust
/// use ratchet_core::domain::command::handler_identifier;
///
/// assert_eq!(handler_identifier("ping").as_deref(), Some("commandPing"));
/// assert_eq!(handler_identifier(""), None);
/// ```
pub fn handler_identifier(name: &str) -> Option<String> {
    let mut chars = name.chars();
    let first = chars.next()?;
    let mut identifier = String::with_capacity(HANDLER_PREFIX.len() + name.len());
    identifier.push_str(HANDLER_PREFIX);
    identifier.extend(first.to_uppercase());
    identifier.push_str(chars.as_str());
    Some(identifier)
}

/// Splits `text` into `(name, arguments)` if it starts with `prefix`.
///
/// The name runs from the end of the prefix to the first whitespace
/// character; the arguments are everything after that, with leading
/// whitespace removed.  Returns `None` if the prefix is missing or the name
/// would be empty.
pub fn split_command<'a>(text: &'a str, prefix: &str) -> Option<(&'a str, &'a str)> {
    let rest = text.strip_prefix(prefix)?;
    let (name, arguments) = match rest.find(char::is_whitespace) {
        Some(index) => (&rest[..index], rest[index..].trim_start()),
        None => (rest, ""),
    };
    if name.is_empty() {
        return None;
    }
    Some((name, arguments))
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// A handler invoked for one recognised command.
///
/// Handlers run inside the transport's message callback and therefore must
/// not block.  Replies go through [`Connection::send`], which only queues.
pub trait CommandHandler: Send + Sync {
    /// Handles `payload`, the complete message that named this command.
    fn handle(&self, connection: &Arc<dyn Connection>, payload: &Payload);
}

impl<F> CommandHandler for F
where
    F: Fn(&Arc<dyn Connection>, &Payload) + Send + Sync,
{
    fn handle(&self, connection: &Arc<dyn Connection>, payload: &Payload) {
        self(connection, payload)
    }
}

/// Explicit mapping from handler identifiers to handlers.
///
/// Populated once at construction time; cloning is cheap because handlers are
/// reference counted.
#[derive(Clone, Default)]
pub struct CommandTable {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for the command `name`.
    ///
    /// The handler is stored under `handler_identifier(name)`, replacing any
    /// handler already registered under that identifier.  Returns the
    /// identifier, or `None` (and registers nothing) if `name` is empty.
    pub fn register(
        &mut self,
        name: &str,
        handler: impl CommandHandler + 'static,
    ) -> Option<String> {
        let identifier = handler_identifier(name)?;
        self.handlers.insert(identifier.clone(), Arc::new(handler));
        Some(identifier)
    }

    /// Finds the handler for the command `name`, if one is registered.
    pub fn resolve(&self, name: &str) -> Option<&Arc<dyn CommandHandler>> {
        let identifier = handler_identifier(name)?;
        self.handlers.get(&identifier)
    }

    /// Registered handler identifiers in sorted order.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut identifiers: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        identifiers.sort_unstable();
        identifiers
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// `true` when no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for CommandTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandTable")
            .field("handlers", &self.identifiers())
            .finish()
    }
}

// ── Parsers ───────────────────────────────────────────────────────────────────

/// Strategy that derives a command name from a received message.
///
/// Returning `None` (or an empty string) means "no command".
pub trait CommandParser: Send + Sync {
    fn command_name(&self, connection: &dyn Connection, payload: &Payload) -> Option<String>;
}

impl<F> CommandParser for F
where
    F: Fn(&dyn Connection, &Payload) -> Option<String> + Send + Sync,
{
    fn command_name(&self, connection: &dyn Connection, payload: &Payload) -> Option<String> {
        self(connection, payload)
    }
}

/// The base strategy: never recognises a command.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCommands;

impl CommandParser for NoCommands {
    fn command_name(&self, _connection: &dyn Connection, _payload: &Payload) -> Option<String> {
        None
    }
}

/// Recognises text messages of the form `<prefix><name> [arguments]`.
///
/// Binary payloads never carry a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlashCommandParser {
    prefix: String,
}

impl SlashCommandParser {
    /// Creates a parser that looks for `prefix` at the start of the message.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The prefix this parser looks for.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The text following the command name, or `None` if `payload` is not a
    /// command for this parser.
    pub fn arguments<'a>(&self, payload: &'a Payload) -> Option<&'a str> {
        let text = payload.as_text()?;
        split_command(text, &self.prefix).map(|(_, arguments)| arguments)
    }
}

impl Default for SlashCommandParser {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_PREFIX)
    }
}

impl CommandParser for SlashCommandParser {
    fn command_name(&self, _connection: &dyn Connection, payload: &Payload) -> Option<String> {
        let text = payload.as_text()?;
        split_command(text, &self.prefix).map(|(name, _)| name.to_owned())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
