// ============================
// livepad-backend-lib/src/registry.rs
// ============================
//! In-memory registry of resident sessions.
//!
//! The registry is a concurrent map from session id to a per-session lock,
//! so unrelated sessions never serialize on each other. Structural changes
//! that depend on a session's membership (attach, evict-if-empty) run while
//! the map shard is held, which makes a concurrent join and eviction of the
//! same id linearizable. Lock order is always map shard, then session.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use livepad_common::{ConnectionId, ServerMessage};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

/// Delivery channel of one connection
pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

/// Shared, lockable session state
pub type SessionHandle = Arc<Mutex<Session>>;

/// One shared document resident in memory
#[derive(Debug, Default)]
pub struct Session {
    text: String,
    connections: HashMap<ConnectionId, Outbox>,
    last_persisted_at: Option<Instant>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the whole text; the previous value is dropped unseen
    pub fn set_text(&mut self, text: String) {
        self.text = text;
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn has_connection(&self, connection_id: &ConnectionId) -> bool {
        self.connections.contains_key(connection_id)
    }

    pub fn attach(&mut self, connection_id: ConnectionId, outbox: Outbox) {
        self.connections.insert(connection_id, outbox);
    }

    /// Returns whether the connection was attached
    pub fn detach(&mut self, connection_id: &ConnectionId) -> bool {
        self.connections.remove(connection_id).is_some()
    }

    pub fn last_persisted_at(&self) -> Option<Instant> {
        self.last_persisted_at
    }

    pub fn mark_persisted(&mut self, at: Instant) {
        self.last_persisted_at = Some(at);
    }

    /// Non-blank and not persisted within `interval` of `now`
    pub fn needs_write_back(&self, now: Instant, interval: Duration) -> bool {
        if self.is_blank() {
            return false;
        }
        match self.last_persisted_at {
            Some(at) => now.saturating_duration_since(at) > interval,
            None => true,
        }
    }

    /// Deliver to one attached connection. Returns whether it was delivered.
    pub fn deliver_to(&self, connection_id: &ConnectionId, message: ServerMessage) -> bool {
        match self.connections.get(connection_id) {
            Some(outbox) => {
                let delivered = outbox.send(message).is_ok();
                if !delivered {
                    debug!(connection_id = %connection_id, "outbox closed, dropping message");
                }
                delivered
            },
            None => false,
        }
    }

    /// Deliver to every attached connection except `exclude`. Returns the
    /// number of connections reached.
    pub fn deliver_to_others(&self, exclude: &ConnectionId, message: &ServerMessage) -> usize {
        let mut delivered = 0;
        for (connection_id, outbox) in &self.connections {
            if connection_id == exclude {
                continue;
            }
            if outbox.send(message.clone()).is_ok() {
                delivered += 1;
            } else {
                debug!(connection_id = %connection_id, "outbox closed, dropping message");
            }
        }
        delivered
    }
}

/// Result of detaching a connection from a resident session
#[derive(Debug, PartialEq, Eq)]
pub struct Detached {
    /// Connections still attached
    pub remaining: usize,
    /// Text copied under the session lock when the last connection left
    /// and the text is non-blank
    pub last_text: Option<String>,
}

/// Registry of resident sessions, keyed by session id
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, SessionHandle>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing session or a fresh empty one
    pub fn get_or_create(&self, id: &str) -> SessionHandle {
        self.sessions
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Session::new())))
            .value()
            .clone()
    }

    pub fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    /// Get-or-create `id` and attach the connection in one step, so an
    /// eviction of the same id cannot slip in between.
    pub fn attach(&self, id: &str, connection_id: ConnectionId, outbox: Outbox) -> SessionHandle {
        let entry = self
            .sessions
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Session::new())));
        entry.value().lock().attach(connection_id, outbox);
        entry.value().clone()
    }

    /// Detach a connection. Returns `None` if the session is not resident.
    pub fn detach(&self, id: &str, connection_id: &ConnectionId) -> Option<Detached> {
        let session = self.get(id)?;
        let mut session = session.lock();
        session.detach(connection_id);
        let remaining = session.connection_count();
        let last_text = (remaining == 0 && !session.is_blank()).then(|| session.text().to_string());
        Some(Detached {
            remaining,
            last_text,
        })
    }

    /// Remove the session iff no connection is attached
    pub fn evict_if_empty(&self, id: &str) -> bool {
        self.sessions
            .remove_if(id, |_, session| session.lock().connection_count() == 0)
            .is_some()
    }

    /// Remove the session regardless of attached connections
    pub fn remove(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Copy of the resident text of `id`
    pub fn text_of(&self, id: &str) -> Option<String> {
        let session = self.get(id)?;
        let text = session.lock().text().to_string();
        Some(text)
    }

    pub fn mark_persisted(&self, id: &str, at: Instant) {
        if let Some(session) = self.get(id) {
            session.lock().mark_persisted(at);
        }
    }

    /// Point-in-time list of resident ids
    pub fn ids(&self) -> Vec<String> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Point-in-time list of resident sessions
    pub fn snapshot(&self) -> Vec<(String, SessionHandle)> {
        self.sessions
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Sum of attached connections over all resident sessions
    pub fn connection_count(&self) -> usize {
        self.snapshot()
            .iter()
            .map(|(_, session)| session.lock().connection_count())
            .sum()
    }
}
