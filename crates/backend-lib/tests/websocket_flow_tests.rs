// =============
// tests/websocket_flow_tests.rs
// =============
//! End-to-end editing over real WebSocket connections.
mod common;

use common::{eventually, setup_test_env};
use futures_util::{SinkExt, StreamExt};
use livepad_backend_lib::{ws_router::create_router, AppState};
use livepad_common::{ClientMessage, ServerMessage};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_server(state: Arc<AppState>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    client
}

async fn send(client: &mut Client, message: &ClientMessage) {
    let json = serde_json::to_string(message).unwrap();
    client.send(Message::Text(json.into())).await.unwrap();
}

async fn send_raw(client: &mut Client, raw: &str) {
    client.send(Message::Text(raw.to_string().into())).await.unwrap();
}

async fn recv(client: &mut Client) -> ServerMessage {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .expect("timed out waiting for a server message")
            .expect("connection closed")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn expect_silence(client: &mut Client) {
    let next = tokio::time::timeout(Duration::from_millis(200), client.next()).await;
    assert!(next.is_err(), "unexpected message: {next:?}");
}

fn join(session_id: &str) -> ClientMessage {
    ClientMessage::JoinEditor {
        session_id: session_id.to_string(),
    }
}

fn change(content: &str) -> ClientMessage {
    ClientMessage::ContentChange {
        content: content.to_string(),
    }
}

fn update(content: &str) -> ServerMessage {
    ServerMessage::ContentUpdate {
        content: content.to_string(),
    }
}

#[tokio::test]
async fn test_two_editors_share_a_document() {
    let (state, _temp_dir) = setup_test_env();
    let addr = spawn_server(state.clone()).await;

    let mut a = connect(addr).await;
    let mut b = connect(addr).await;

    send(&mut a, &join("doc1")).await;
    assert_eq!(recv(&mut a).await, update(""));

    send(&mut a, &change("hi")).await;
    let registry = state.registry().clone();
    assert!(eventually(|| registry.text_of("doc1").as_deref() == Some("hi")).await);

    send(&mut b, &join("doc1")).await;
    assert_eq!(recv(&mut b).await, update("hi"));

    send(&mut b, &change("hello")).await;
    assert_eq!(recv(&mut a).await, update("hello"));
    expect_silence(&mut b).await;
}

#[tokio::test]
async fn test_last_disconnect_saves_document() {
    let (state, _temp_dir) = setup_test_env();
    let addr = spawn_server(state.clone()).await;

    let mut a = connect(addr).await;
    send(&mut a, &join("notes")).await;
    recv(&mut a).await;
    send(&mut a, &change("remember this")).await;
    a.close(None).await.unwrap();

    let router = state.router.clone();
    assert!(eventually(|| router.connection_count() == 0).await);
    state.cache.drain_pending().await;
    assert_eq!(
        state.gateway().load("notes").await.as_deref(),
        Some("remember this")
    );

    // A later joiner is served from storage once the session is evicted
    state.scheduler.evict_idle();
    let mut b = connect(addr).await;
    send(&mut b, &join("notes")).await;
    assert_eq!(recv(&mut b).await, update("remember this"));
}

#[tokio::test]
async fn test_malformed_frames_keep_connection_open() {
    let (state, _temp_dir) = setup_test_env();
    let addr = spawn_server(state).await;

    let mut a = connect(addr).await;
    send_raw(&mut a, "not json").await;
    match recv(&mut a).await {
        ServerMessage::Error { code, .. } => assert_eq!(code, "MALFORMED_MESSAGE"),
        other => panic!("expected error, got {other:?}"),
    }

    send(&mut a, &join("doc1")).await;
    assert_eq!(recv(&mut a).await, update(""));
}

#[tokio::test]
async fn test_oversized_edit_is_refused() {
    let (state, _temp_dir) = setup_test_env();
    let addr = spawn_server(state.clone()).await;

    let mut a = connect(addr).await;
    send(&mut a, &join("doc1")).await;
    recv(&mut a).await;

    send(&mut a, &change(&"x".repeat(2048))).await;
    match recv(&mut a).await {
        ServerMessage::Error { code, .. } => assert_eq!(code, "DOCUMENT_TOO_LARGE"),
        other => panic!("expected error, got {other:?}"),
    }
    assert_eq!(state.registry().text_of("doc1").as_deref(), Some(""));
}

#[tokio::test]
async fn test_shutdown_flushes_live_sessions() {
    let (state, _temp_dir) = setup_test_env();
    let addr = spawn_server(state.clone()).await;

    let mut a = connect(addr).await;
    send(&mut a, &join("draft")).await;
    recv(&mut a).await;
    send(&mut a, &change("unsaved")).await;
    let registry = state.registry().clone();
    assert!(eventually(|| registry.text_of("draft").as_deref() == Some("unsaved")).await);

    assert_eq!(state.shutdown.shutdown().await, 1);
    assert_eq!(state.gateway().load("draft").await.as_deref(), Some("unsaved"));

    send(&mut a, &change("after shutdown")).await;
    match recv(&mut a).await {
        ServerMessage::Error { code, .. } => assert_eq!(code, "SHUTTING_DOWN"),
        other => panic!("expected error, got {other:?}"),
    }
}
