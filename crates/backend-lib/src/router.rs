// ============================
// livepad-backend-lib/src/router.rs
// ============================
//! Broadcast router: join/leave membership and fan-out of edits.
//!
//! Each connection is either unattached or attached to exactly one session.
//! Joining while attached elsewhere leaves the old session first. Edits
//! replace the whole session text and are delivered to every other attached
//! connection; concurrent edits resolve by arrival order, last one wins.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use livepad_common::{ConnectionId, ServerMessage};
use metrics::{counter, gauge};
use tracing::{debug, info};

use crate::error::AppError;
use crate::metrics::{EDIT_APPLIED, EDIT_REJECTED, SESSION_ACTIVE, SESSION_JOINED};
use crate::registry::{Outbox, SessionRegistry};
use crate::validation::validate_document_size;
use crate::writeback::WriteBackCache;

/// Per-connection routing state
#[derive(Debug)]
struct ConnectionState {
    outbox: Outbox,
    session_id: Option<String>,
}

pub struct BroadcastRouter {
    cache: Arc<WriteBackCache>,
    connections: DashMap<ConnectionId, ConnectionState>,
    accepting: AtomicBool,
    max_document_bytes: usize,
}

impl BroadcastRouter {
    pub fn new(cache: Arc<WriteBackCache>, max_document_bytes: usize) -> Self {
        Self {
            cache,
            connections: DashMap::new(),
            accepting: AtomicBool::new(true),
            max_document_bytes,
        }
    }

    fn registry(&self) -> &SessionRegistry {
        self.cache.registry()
    }

    /// Register a new, unattached connection
    pub fn connect(&self, connection_id: ConnectionId, outbox: Outbox) {
        self.connections.insert(
            connection_id,
            ConnectionState {
                outbox,
                session_id: None,
            },
        );
    }

    /// Session the connection is attached to, if any
    pub fn session_of(&self, connection_id: &ConnectionId) -> Option<String> {
        self.connections
            .get(connection_id)
            .and_then(|state| state.session_id.clone())
    }

    /// Number of registered connections, attached or not
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Stop accepting joins and edits
    pub fn close(&self) {
        self.accepting.store(false, Ordering::SeqCst);
    }

    /// Attach `connection_id` to `session_id` and send it the current text.
    ///
    /// An empty session is hydrated from storage first; only the joining
    /// connection receives the text.
    pub async fn join(&self, connection_id: ConnectionId, session_id: &str) -> Result<(), AppError> {
        if !self.is_accepting() {
            return Err(AppError::ShuttingDown);
        }

        let (outbox, previous) = {
            let mut state = self
                .connections
                .get_mut(&connection_id)
                .ok_or_else(|| AppError::Internal(format!("unknown connection {connection_id}")))?;
            let previous = state.session_id.replace(session_id.to_string());
            (state.outbox.clone(), previous)
        };

        if let Some(previous) = previous.filter(|previous| previous != session_id) {
            self.detach(connection_id, &previous);
        }

        let session = self.registry().attach(session_id, connection_id, outbox);
        self.cache.hydrate(session_id, &session).await;

        let connections = {
            let session = session.lock();
            session.deliver_to(
                &connection_id,
                ServerMessage::ContentUpdate {
                    content: session.text().to_string(),
                },
            );
            session.connection_count()
        };

        counter!(SESSION_JOINED).increment(1);
        gauge!(SESSION_ACTIVE).set(self.registry().len() as f64);
        info!(
            connection_id = %connection_id,
            session_id = %session_id,
            "Client joined session ({} total)",
            connections
        );
        Ok(())
    }

    /// Replace the attached session's text and fan it out to the siblings.
    ///
    /// Edits from unattached connections are ignored.
    pub fn edit(&self, connection_id: ConnectionId, content: String) -> Result<(), AppError> {
        if !self.is_accepting() {
            return Err(AppError::ShuttingDown);
        }
        if let Err(e) = validate_document_size(&content, self.max_document_bytes) {
            counter!(EDIT_REJECTED).increment(1);
            return Err(e.into());
        }

        let Some(session_id) = self.session_of(&connection_id) else {
            debug!(connection_id = %connection_id, "edit from unattached connection ignored");
            return Ok(());
        };
        let Some(session) = self.registry().get(&session_id) else {
            debug!(session_id = %session_id, "edit for non-resident session ignored");
            return Ok(());
        };

        let mut session = session.lock();
        if !session.has_connection(&connection_id) {
            debug!(connection_id = %connection_id, "edit from detached connection ignored");
            return Ok(());
        }
        let message = ServerMessage::ContentUpdate {
            content: content.clone(),
        };
        session.set_text(content);
        let delivered = session.deliver_to_others(&connection_id, &message);

        counter!(EDIT_APPLIED).increment(1);
        debug!(session_id = %session_id, "edit relayed to {} connections", delivered);
        Ok(())
    }

    /// Detach the connection from its session, keeping it registered
    pub fn leave(&self, connection_id: ConnectionId) {
        let previous = self
            .connections
            .get_mut(&connection_id)
            .and_then(|mut state| state.session_id.take());
        if let Some(previous) = previous {
            self.detach(connection_id, &previous);
        }
    }

    /// Leave and forget the connection
    pub fn disconnect(&self, connection_id: ConnectionId) {
        self.leave(connection_id);
        self.connections.remove(&connection_id);
    }

    fn detach(&self, connection_id: ConnectionId, session_id: &str) {
        let Some(detached) = self.registry().detach(session_id, &connection_id) else {
            return;
        };
        info!(
            connection_id = %connection_id,
            session_id = %session_id,
            "Client left session ({} remaining)",
            detached.remaining
        );
        // Last one out: save now instead of waiting for the next sweep.
        // Eviction is left to the cleanup sweep.
        if let Some(text) = detached.last_text {
            self.cache.persist_in_background(session_id.to_string(), text);
        }
    }
}
