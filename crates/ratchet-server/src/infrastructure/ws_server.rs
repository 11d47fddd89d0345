//! WebSocket server: start/stop, accept loop and per-session tasks.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address ([`WebSocketServer::try_start`]).
//! 2. Minting a fresh [`ServerFacade`] (and with it an empty registry) for
//!    every successful start.
//! 3. Accepting incoming TCP connections and upgrading each one to a
//!    WebSocket session on its own Tokio task.
//! 4. Translating session events into the four [`ConnectionHandler`]
//!    callbacks, strictly in order per connection.
//! 5. Stopping the accept loop when [`WebSocketServer::stop`] clears the
//!    `running` flag.
//!
//! # Error policy
//!
//! Setup failures are the only errors that leave this module, and only
//! through [`WebSocketServer::try_start`].  [`WebSocketServer::start`] folds
//! them into a `bool` and keeps the cause in [`WebSocketServer::last_error`].
//! Per-connection errors are logged here and then handed to `on_error`.

use std::io;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::StreamExt;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message as WsMessage};
use tracing::{debug, error, info, warn};

use ratchet_core::{
    Connection, ConnectionHandler, Payload, ServerConfig, ServerFacade, ServerFacadeBuilder,
};

use crate::infrastructure::ws_connection::WsConnection;

/// How long `accept` waits before the loop re-checks the `running` flag.
pub const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// How long a finished session waits for its writer to flush a Close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Errors returned by [`WebSocketServer`] lifecycle operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not be bound (port in use, missing permission, ...).
    #[error("failed to bind WebSocket listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The bound listener could not report its local address.
    #[error("failed to read listener address: {0}")]
    LocalAddr(#[source] io::Error),

    /// `stop` or `wait` was called without a successful `start`.
    #[error("server is not running")]
    NotStarted,

    /// `start` was called while the server is already serving.
    #[error("server is already running on {0}")]
    AlreadyRunning(SocketAddr),
}

/// State that only exists while the server is started.
struct RunningServer {
    local_addr: SocketAddr,
    facade: Arc<ServerFacade>,
    running: Arc<AtomicBool>,
    accept_task: JoinHandle<()>,
}

/// A WebSocket server driving a [`ServerFacade`].
///
/// ```no_run
/// use ratchet_core::{ServerConfig, ServerFacade};
/// use ratchet_server::infrastructure::WebSocketServer;
///
/// # async fn example() -> Result<(), ratchet_server::infrastructure::ServerError> {
/// let mut server = WebSocketServer::new(ServerFacade::builder(ServerConfig::default()));
/// if !server.start().await {
///     eprintln!("start failed: {:?}", server.last_error());
///     return Ok(());
/// }
/// // ... later
/// server.stop()?;
/// server.wait().await?;
/// # Ok(())
/// # }
/// ```
pub struct WebSocketServer {
    builder: ServerFacadeBuilder,
    running: Option<RunningServer>,
    last_error: Option<ServerError>,
}

impl WebSocketServer {
    /// Creates a stopped server.  Nothing is bound until `start`.
    pub fn new(builder: ServerFacadeBuilder) -> Self {
        Self {
            builder,
            running: None,
            last_error: None,
        }
    }

    /// The configuration the server starts with.
    pub fn config(&self) -> &ServerConfig {
        self.builder.config()
    }

    /// Binds the listener and begins serving.
    ///
    /// Returns `false` on any setup failure; the cause is available from
    /// [`last_error`](Self::last_error).
    pub async fn start(&mut self) -> bool {
        match self.try_start().await {
            Ok(_) => {
                self.last_error = None;
                true
            }
            Err(e) => {
                warn!("WebSocket server failed to start: {e}");
                self.last_error = Some(e);
                false
            }
        }
    }

    /// Binds the listener and begins serving, returning the bound address.
    ///
    /// The accept loop runs on a spawned task, so this returns as soon as the
    /// listener is bound.
    ///
    /// # Errors
    ///
    /// - [`ServerError::AlreadyRunning`] if the server is serving already.
    /// - [`ServerError::Bind`] if the listener cannot be bound.
    /// - [`ServerError::LocalAddr`] if the bound address cannot be read.
    ///
    /// On error no façade is created, so no registry is reachable.
    pub async fn try_start(&mut self) -> Result<SocketAddr, ServerError> {
        if let Some(running) = &self.running {
            if running.running.load(Ordering::Relaxed) {
                return Err(ServerError::AlreadyRunning(running.local_addr));
            }
        }

        let addr = self.config().bind_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr().map_err(ServerError::LocalAddr)?;

        let facade = Arc::new(self.builder.build());
        let handler: Arc<dyn ConnectionHandler> = facade.clone();
        let running = Arc::new(AtomicBool::new(true));
        let accept_task = tokio::spawn(run_accept_loop(listener, handler, Arc::clone(&running)));

        info!("WebSocket server listening on {local_addr}");

        self.running = Some(RunningServer {
            local_addr,
            facade,
            running,
            accept_task,
        });
        Ok(local_addr)
    }

    /// Requests the accept loop to shut down.
    ///
    /// Fire-and-forget: the loop exits within [`ACCEPT_POLL_INTERVAL`].  Open
    /// sessions are not interrupted.  Use [`wait`](Self::wait) to block until
    /// the loop has exited.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NotStarted`] if the server was never started.
    pub fn stop(&self) -> Result<(), ServerError> {
        let running = self.running.as_ref().ok_or(ServerError::NotStarted)?;
        if running.running.swap(false, Ordering::Relaxed) {
            info!("WebSocket server on {} stopping", running.local_addr);
        }
        Ok(())
    }

    /// Waits for the accept loop to exit and releases the running state.
    ///
    /// Returns once [`stop`](Self::stop) has taken effect.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NotStarted`] if the server was never started.
    pub async fn wait(&mut self) -> Result<(), ServerError> {
        let running = self.running.take().ok_or(ServerError::NotStarted)?;
        if let Err(e) = running.accept_task.await {
            error!("accept loop task failed: {e}");
        }
        info!("WebSocket server on {} stopped", running.local_addr);
        Ok(())
    }

    /// `true` while the accept loop has not been asked to stop.
    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|r| r.running.load(Ordering::Relaxed))
    }

    /// The address the listener is bound to, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }

    /// The façade serving the current run, once started.
    pub fn facade(&self) -> Option<&Arc<ServerFacade>> {
        self.running.as_ref().map(|r| &r.facade)
    }

    /// Why the most recent [`start`](Self::start) failed, if it did.
    pub fn last_error(&self) -> Option<&ServerError> {
        self.last_error.as_ref()
    }
}

impl Drop for WebSocketServer {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.running.store(false, Ordering::Relaxed);
        }
    }
}

// ── Accept loop ───────────────────────────────────────────────────────────────

/// Accepts connections until `running` is cleared.
///
/// Each accepted connection is handed off to a dedicated Tokio task so that
/// one slow client never blocks others.
async fn run_accept_loop(
    listener: TcpListener,
    handler: Arc<dyn ConnectionHandler>,
    running: Arc<AtomicBool>,
) {
    loop {
        // Check the shutdown flag before each accept attempt.
        if !running.load(Ordering::Relaxed) {
            debug!("shutdown flag set; stopping accept loop");
            break;
        }

        // Use a short timeout on `accept()` so the loop can periodically check
        // the `running` flag even when no client is connecting.  Without it the
        // loop would block on `accept()` and `stop` would never take effect.
        match timeout(ACCEPT_POLL_INTERVAL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                debug!("new TCP connection from {peer_addr}");
                let handler = Arc::clone(&handler);

                // The session task owns the socket from here on; the accept
                // loop goes straight back to waiting for the next client.
                tokio::spawn(async move {
                    handle_session(stream, peer_addr, handler).await;
                });
            }
            Ok(Err(e)) => {
                // Transient accept error (e.g., too many open file descriptors).
                // Log it and keep serving the clients we already have.
                error!("accept error: {e}");
            }
            Err(_) => {
                // Timeout: nobody connected in the last poll interval.
                // Loop back to check the `running` flag.
            }
        }
    }
    // Dropping `listener` here closes the socket, so new connection attempts
    // are refused from now on.
}

// ── Per-session handler ───────────────────────────────────────────────────────

/// Runs one session and logs how it ended.
async fn handle_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    handler: Arc<dyn ConnectionHandler>,
) {
    match run_session(raw_stream, peer_addr, handler).await {
        Ok(()) => debug!("session {peer_addr} ended"),
        Err(e) => warn!("session {peer_addr} failed: {e:#}"),
    }
}

/// The `on_open` .. `on_close` bracket of one session.
///
/// `on_close` is reported exactly once: explicitly through
/// [`finish`](Self::finish), or from `Drop` if the session task unwinds
/// (a panicking command handler, for instance).  Either way the connection
/// leaves the registry.
struct OpenSession {
    handler: Arc<dyn ConnectionHandler>,
    connection: Arc<dyn Connection>,
    closed: bool,
}

impl OpenSession {
    /// Reports `on_open` and returns the guard that will report `on_close`.
    fn open(handler: Arc<dyn ConnectionHandler>, connection: Arc<dyn Connection>) -> Self {
        handler.on_open(Arc::clone(&connection));
        Self {
            handler,
            connection,
            closed: false,
        }
    }

    fn handler(&self) -> &dyn ConnectionHandler {
        self.handler.as_ref()
    }

    fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    /// Reports `on_close` on the normal exit path.
    fn finish(mut self) {
        self.report_close();
    }

    fn report_close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.handler.on_close(self.connection.as_ref());
        }
    }
}

impl Drop for OpenSession {
    fn drop(&mut self) {
        if !self.closed && std::thread::panicking() {
            error!("connection {}: session task panicked; reporting close", self.connection.id());
        }
        self.report_close();
    }
}

/// Runs the complete lifecycle of a single WebSocket session.
///
/// 1. Completes the HTTP upgrade handshake.  A failed handshake produces no
///    callbacks at all.
/// 2. Creates the [`WsConnection`], spawns its writer and reports `on_open`.
/// 3. Reads frames in order, reporting `on_message` / `on_error`.
/// 4. Reports `on_close` exactly once, however the session ended.
///
/// # Errors
///
/// Returns an error only if the WebSocket handshake fails.
async fn run_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    handler: Arc<dyn ConnectionHandler>,
) -> anyhow::Result<()> {
    // ── Step 1: Complete the WebSocket handshake ───────────────────────────────
    //
    // `accept_async` reads the client's HTTP Upgrade request and answers with
    // "101 Switching Protocols".  The connection is not reported to the
    // handler until this succeeds.
    let ws_stream = accept_async(raw_stream)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;

    // ── Step 2: Create the connection handle and its writer ───────────────────
    //
    // The read half stays with this task; the write half goes to a writer task
    // that drains the connection's outbound queue.  Handlers therefore never
    // wait on the socket when they reply.
    let (ws_tx, mut ws_rx) = ws_stream.split();
    let (connection, outbound) = WsConnection::new(peer_addr);
    let connection = Arc::new(connection);
    let id = connection.id();

    let mut writer = tokio::spawn(outbound.drain_into(ws_tx, id));
    let mut writer_done = false;

    info!("connection {id} opened from {}", connection.peer_addr());
    let session = OpenSession::open(handler, connection.clone());

    // ── Step 3: Read frames until the session ends ────────────────────────────
    //
    // Frames are handled one at a time on this task, which is what keeps the
    // callbacks for one connection in order.
    loop {
        let frame = tokio::select! {
            frame = ws_rx.next() => frame,
            _ = &mut writer => {
                // The writer only exits after a close request or a failed
                // write; either way the session is over.
                writer_done = true;
                break;
            }
        };

        match frame {
            Some(Ok(WsMessage::Text(text))) => {
                session.handler().on_message(session.connection(), &Payload::Text(text));
            }
            Some(Ok(WsMessage::Binary(bytes))) => {
                session.handler().on_message(session.connection(), &Payload::Binary(bytes));
            }
            Some(Ok(WsMessage::Ping(data))) => {
                // tokio-tungstenite queues the Pong reply itself.
                debug!("connection {id}: ping ({} bytes)", data.len());
            }
            Some(Ok(WsMessage::Pong(_))) => {
                debug!("connection {id}: pong received");
            }
            Some(Ok(WsMessage::Close(_))) => {
                debug!("connection {id}: Close frame received");
                break;
            }
            Some(Ok(WsMessage::Frame(_))) => {
                debug!("connection {id}: raw frame (ignored)");
            }
            Some(Err(e)) => {
                // The stream yields nothing after an error, so any read error
                // ends the session.  A clean disconnect arrives as `None`.
                warn!("connection {id}: transport error: {e}");
                session.handler().on_error(session.connection().as_ref(), &e);
                break;
            }
            None => {
                debug!("connection {id}: stream ended");
                break;
            }
        }
    }

    // ── Step 4: Report the close and let the writer finish ────────────────────
    session.finish();
    info!("connection {id} closed");

    if !writer_done {
        // Give the writer a moment to flush queued replies and the Close frame.
        connection.close();
        if timeout(CLOSE_GRACE, &mut writer).await.is_err() {
            writer.abort();
        }
    }

    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
