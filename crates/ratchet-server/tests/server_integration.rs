//! End-to-end tests for the WebSocket server.
//!
//! Each test starts a [`WebSocketServer`] on an ephemeral loopback port and
//! talks to it with a real `tokio-tungstenite` client, verifying:
//!
//! - Commands round-trip over the wire (`/ping`, `/echo`).
//! - The registry follows real clients connecting and disconnecting.
//! - A handler-requested close tears the session down from the server side.
//! - A panicking command still removes its connection from the registry.
//! - Disabling client commands silences every reply.
//! - A failed start (port already taken) leaves no façade behind.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use ratchet_core::{Connection, Payload, ServerConfig, ServerFacade, ServerFacadeBuilder};
use ratchet_server::application::with_reference_commands;
use ratchet_server::infrastructure::{ServerError, WebSocketServer};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

fn loopback_config() -> ServerConfig {
    ServerConfig {
        port: 0,
        bind_address: "127.0.0.1".parse().unwrap(),
        ..ServerConfig::default()
    }
}

fn reference_builder(config: ServerConfig) -> ServerFacadeBuilder {
    with_reference_commands(ServerFacade::builder(config), "/")
}

async fn started(builder: ServerFacadeBuilder) -> WebSocketServer {
    let mut server = WebSocketServer::new(builder);
    assert!(server.start().await, "start failed: {:?}", server.last_error());
    server
}

async fn connect(server: &WebSocketServer) -> Client {
    let addr = server.local_addr().expect("server is started");
    let (client, _response) = connect_async(format!("ws://{addr}"))
        .await
        .expect("client handshake");
    client
}

/// Returns the next text frame, skipping control frames.
async fn next_text(client: &mut Client) -> Option<String> {
    loop {
        match timeout(REPLY_TIMEOUT, client.next()).await.ok()?? {
            Ok(Message::Text(text)) => return Some(text),
            Ok(Message::Ping(_) | Message::Pong(_)) => continue,
            _ => return None,
        }
    }
}

/// Polls `condition` until it holds or two seconds pass.
async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + REPLY_TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(20)).await;
    }
    condition()
}

async fn shutdown(mut server: WebSocketServer) {
    server.stop().expect("stop");
    server.wait().await.expect("wait");
}

#[tokio::test]
async fn test_ping_and_echo_round_trip() {
    let server = started(reference_builder(loopback_config())).await;
    let mut client = connect(&server).await;

    client.send(Message::Text("/ping".into())).await.unwrap();
    assert_eq!(next_text(&mut client).await.as_deref(), Some("pong"));

    client.send(Message::Text("/echo hello there".into())).await.unwrap();
    assert_eq!(next_text(&mut client).await.as_deref(), Some("hello there"));

    client.close(None).await.unwrap();
    shutdown(server).await;
}

#[tokio::test]
async fn test_registry_tracks_connect_and_disconnect() {
    let server = started(reference_builder(loopback_config())).await;
    let facade = Arc::clone(server.facade().expect("facade exists after start"));

    let mut first = connect(&server).await;
    let second = connect(&server).await;
    assert!(eventually(|| facade.connection_count() == 2).await);

    first.close(None).await.unwrap();
    // Drain until the server acknowledges the close.
    while let Ok(Some(_)) = timeout(REPLY_TIMEOUT, first.next()).await {}
    assert!(eventually(|| facade.connection_count() == 1).await);

    drop(second);
    assert!(eventually(|| facade.connection_count() == 0).await);

    shutdown(server).await;
}

#[tokio::test]
async fn test_handler_close_ends_session_from_server_side() {
    let builder = reference_builder(loopback_config()).command(
        "quit",
        |conn: &Arc<dyn Connection>, _: &Payload| {
            let _ = conn.send(Payload::from("bye"));
            conn.close();
        },
    );
    let server = started(builder).await;
    let facade = Arc::clone(server.facade().unwrap());
    let mut client = connect(&server).await;
    assert!(eventually(|| facade.connection_count() == 1).await);

    client.send(Message::Text("/quit".into())).await.unwrap();

    // The reply queued before the close still arrives, then the Close frame.
    assert_eq!(next_text(&mut client).await.as_deref(), Some("bye"));
    let end = timeout(REPLY_TIMEOUT, client.next()).await.unwrap();
    assert!(matches!(end, Some(Ok(Message::Close(_))) | None | Some(Err(_))));
    assert!(eventually(|| facade.connection_count() == 0).await);

    shutdown(server).await;
}

#[tokio::test]
async fn test_panicking_command_does_not_leak_registry_entry() {
    let builder = reference_builder(loopback_config()).command(
        "boom",
        |_: &Arc<dyn Connection>, _: &Payload| panic!("command failed"),
    );
    let server = started(builder).await;
    let facade = Arc::clone(server.facade().unwrap());
    let mut client = connect(&server).await;
    assert!(eventually(|| facade.connection_count() == 1).await);

    client.send(Message::Text("/boom".into())).await.unwrap();
    drop(client);

    assert!(eventually(|| facade.connection_count() == 0).await);

    // The server keeps serving other clients.
    let mut next = connect(&server).await;
    next.send(Message::Text("/ping".into())).await.unwrap();
    assert_eq!(next_text(&mut next).await.as_deref(), Some("pong"));

    next.close(None).await.unwrap();
    shutdown(server).await;
}

#[tokio::test]
async fn test_disabled_commands_produce_no_reply() {
    let config = ServerConfig {
        run_client_commands: false,
        ..loopback_config()
    };
    let server = started(reference_builder(config)).await;
    let mut client = connect(&server).await;

    client.send(Message::Text("/ping".into())).await.unwrap();

    let reply = timeout(Duration::from_millis(300), client.next()).await;
    assert!(reply.is_err(), "no frame expected, got {reply:?}");

    client.close(None).await.unwrap();
    shutdown(server).await;
}

#[tokio::test]
async fn test_start_fails_when_port_is_taken() {
    // Arrange: occupy a port.
    let blocker = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = blocker.local_addr().unwrap().port();
    let config = ServerConfig {
        port,
        ..loopback_config()
    };
    let mut server = WebSocketServer::new(reference_builder(config));

    // Act
    let started = server.start().await;

    // Assert
    assert!(!started);
    assert!(matches!(server.last_error(), Some(ServerError::Bind { .. })));
    assert!(server.facade().is_none(), "no registry may be reachable");
    assert!(!server.is_running());
    assert!(matches!(server.stop(), Err(ServerError::NotStarted)));
}

#[tokio::test]
async fn test_restart_after_failure_clears_last_error() {
    let blocker = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = blocker.local_addr().unwrap().port();
    let mut server = WebSocketServer::new(reference_builder(ServerConfig {
        port,
        ..loopback_config()
    }));
    assert!(!server.start().await);

    drop(blocker);
    assert!(server.start().await, "start failed: {:?}", server.last_error());

    assert!(server.last_error().is_none());
    shutdown(server).await;
}

#[tokio::test]
async fn test_stop_refuses_new_connections() {
    let mut server = started(reference_builder(loopback_config())).await;
    let addr = server.local_addr().unwrap();

    server.stop().unwrap();
    server.wait().await.unwrap();

    let result = connect_async(format!("ws://{addr}")).await;
    assert!(result.is_err(), "listener must be closed after stop");
}
