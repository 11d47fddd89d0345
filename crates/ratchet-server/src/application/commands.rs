//! The command set the `ws-ratchet` binary ships with.
//!
//! | Message           | Reply        |
//! |-------------------|--------------|
//! | `/ping`           | `pong`       |
//! | `/echo <text>`    | `<text>`     |
//!
//! The prefix (`/` above) is configurable.  Anything else is ignored by the
//! façade, as is every message when client commands are disabled.

use std::sync::Arc;

use tracing::debug;

use ratchet_core::{CommandHandler, Connection, Payload, ServerFacadeBuilder, SlashCommandParser};

/// Installs the slash-command parser for `prefix` and the reference commands.
pub fn with_reference_commands(builder: ServerFacadeBuilder, prefix: &str) -> ServerFacadeBuilder {
    let parser = SlashCommandParser::new(prefix);
    builder
        .parser(parser.clone())
        .command("ping", ping)
        .command("echo", EchoCommand::new(parser))
}

/// Replies `pong`.
pub fn ping(connection: &Arc<dyn Connection>, _payload: &Payload) {
    reply(connection, "pong");
}

/// Replies with the text following the command word.
#[derive(Debug, Clone)]
pub struct EchoCommand {
    parser: SlashCommandParser,
}

impl EchoCommand {
    pub fn new(parser: SlashCommandParser) -> Self {
        Self { parser }
    }
}

impl CommandHandler for EchoCommand {
    fn handle(&self, connection: &Arc<dyn Connection>, payload: &Payload) {
        let text = self.parser.arguments(payload).unwrap_or_default();
        reply(connection, text);
    }
}

fn reply(connection: &Arc<dyn Connection>, text: &str) {
    if let Err(e) = connection.send(Payload::from(text)) {
        debug!("reply dropped: {e}");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
