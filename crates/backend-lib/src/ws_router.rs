// ============================
// livepad-backend-lib/src/ws_router.rs
// ============================
//! HTTP routes and WebSocket connection handling.
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::Method,
    response::IntoResponse,
    routing::{delete, get, post},
    Router,
};
use futures_util::{SinkExt, StreamExt};
use livepad_common::{ClientMessage, ConnectionId, ServerMessage};
use metrics::counter;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::handlers;
use crate::metrics::{WS_CONNECTION, WS_DISCONNECTION};
use crate::registry::Outbox;
use crate::validation;
use crate::AppState;

/// Build the full router: control surface plus the WebSocket endpoint
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/editor/load/{id}", get(handlers::load_session))
        .route("/editor/save/{id}", post(handlers::save_session))
        .route("/editor/delete/{id}", delete(handlers::delete_session))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handler for WebSocket connections
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    counter!(WS_CONNECTION).increment(1);
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = Uuid::new_v4();
    let (mut sink, mut stream) = socket.split();
    let (outbox, mut outbox_rx) = mpsc::unbounded_channel::<ServerMessage>();

    state.router.connect(connection_id, outbox.clone());
    info!(connection_id = %connection_id, "Client connected");

    // Forward queued server messages to the socket, in order
    let send_task = tokio::spawn(async move {
        while let Some(message) = outbox_rx.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    warn!("failed to serialize server message: {}", e);
                    continue;
                },
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(connection_id = %connection_id, "socket error: {}", e);
                break;
            },
        };

        let message = match serde_json::from_str::<ClientMessage>(text.as_str()) {
            Ok(message) => message,
            Err(e) => {
                reply(&outbox, connection_id, ServerMessage::error("MALFORMED_MESSAGE", e.to_string()));
                continue;
            },
        };

        if let Err(e) = dispatch(&state, connection_id, message).await {
            debug!(connection_id = %connection_id, "rejected client message: {}", e);
            reply(
                &outbox,
                connection_id,
                ServerMessage::error(e.wire_code(), e.sanitized_message()),
            );
        }
    }

    state.router.disconnect(connection_id);
    counter!(WS_DISCONNECTION).increment(1);
    info!(connection_id = %connection_id, "Client disconnected");

    send_task.abort();
}

/// Queue a reply for this connection. Returns whether it was queued.
fn reply(outbox: &Outbox, connection_id: ConnectionId, message: ServerMessage) -> bool {
    match outbox.send(message) {
        Ok(()) => true,
        Err(e) => {
            debug!(connection_id = %connection_id, "outbox closed, dropping reply: {:?}", e.0);
            false
        },
    }
}

async fn dispatch(
    state: &AppState,
    connection_id: ConnectionId,
    message: ClientMessage,
) -> Result<(), AppError> {
    validation::validate_client_message(&message, state.settings.max_document_bytes)?;
    match message {
        ClientMessage::JoinEditor { session_id } => {
            state.router.join(connection_id, &session_id).await
        },
        ClientMessage::ContentChange { content } => state.router.edit(connection_id, content),
        ClientMessage::LeaveEditor => {
            state.router.leave(connection_id);
            Ok(())
        },
    }
}
