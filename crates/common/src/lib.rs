// ================
// common/src/lib.rs
// ================
//! Common types and structures
//! used for communication between `livepad` clients and the server.
//! This module defines the WebSocket protocol messages and the JSON bodies
//! of the HTTP control surface.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one live WebSocket participant
pub type ConnectionId = Uuid;

/// Messages sent from client to server
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Attach this connection to a session, leaving any previous one
    /// # Fields
    /// * `session_id` - Opaque id of the shared document
    JoinEditor { session_id: String },
    /// Replace the whole document text
    /// # Fields
    /// * `content` - New full text of the document
    ContentChange { content: String },
    /// Detach from the current session without closing the socket
    LeaveEditor,
}

/// Messages sent from server to client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Current full text of the session, sent on join and on sibling edits
    ContentUpdate { content: String },
    /// Something the client sent could not be processed
    Error { code: String, message: String },
}

impl ServerMessage {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Response body of `GET /editor/load/{id}`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LoadResponse {
    pub success: bool,
    pub content: String,
}

/// Response body of `POST /editor/save/{id}`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SaveResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response body of `DELETE /editor/delete/{id}`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DeleteResponse {
    pub success: bool,
}

/// Whether a durable store is attached to the server
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageStatus {
    Connected,
    Disconnected,
}

/// Response body of `GET /health`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    /// RFC 3339 time the report was produced
    pub timestamp: String,
    pub active_session_count: usize,
    pub total_connection_count: usize,
    pub storage_status: StorageStatus,
}
