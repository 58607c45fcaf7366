// ============================
// livepad-backend-lib/src/writeback.rs
// ============================
//! Read-through hydration and write-back of resident sessions.
//!
//! Sits between the registry and the persistence gateway. Session locks are
//! only held to copy text in or out; every storage call happens with no
//! lock held.
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use metrics::histogram;
use parking_lot::Mutex;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::AppError;
use crate::metrics::WRITEBACK_BATCH_SIZE;
use crate::persistence::{PersistenceGateway, SaveOutcome};
use crate::registry::{SessionHandle, SessionRegistry};

pub struct WriteBackCache {
    registry: Arc<SessionRegistry>,
    gateway: Arc<PersistenceGateway>,
    /// Fire-and-forget saves, joined before shutdown completes
    pending: Mutex<JoinSet<()>>,
}

impl WriteBackCache {
    pub fn new(registry: Arc<SessionRegistry>, gateway: Arc<PersistenceGateway>) -> Self {
        Self {
            registry,
            gateway,
            pending: Mutex::new(JoinSet::new()),
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn gateway(&self) -> &Arc<PersistenceGateway> {
        &self.gateway
    }

    /// Fill an empty session from durable storage.
    ///
    /// The stored text is only adopted if the session is still empty once
    /// the load completes; an edit that lands meanwhile wins.
    pub async fn hydrate(&self, id: &str, session: &SessionHandle) {
        if !session.lock().text().is_empty() {
            return;
        }
        if let Some(stored) = self.gateway.load(id).await {
            let mut session = session.lock();
            if session.text().is_empty() {
                debug!(session_id = %id, bytes = stored.len(), "hydrated from storage");
                session.set_text(stored);
            }
        }
    }

    /// Get-or-create `id`, hydrate it, and return its text
    pub async fn load_session(&self, id: &str) -> String {
        let session = self.registry.get_or_create(id);
        self.hydrate(id, &session).await;
        let text = session.lock().text().to_string();
        text
    }

    /// Save `text` under `id` and stamp the session on success
    pub async fn persist_text(&self, id: &str, text: &str) -> SaveOutcome {
        let outcome = self.gateway.save(id, text).await;
        if outcome.is_persisted() {
            self.registry.mark_persisted(id, Instant::now());
        }
        outcome
    }

    /// Explicit save of a resident session
    pub async fn persist(&self, id: &str) -> Result<SaveOutcome, AppError> {
        let text = self
            .registry
            .text_of(id)
            .filter(|text| !text.trim().is_empty())
            .ok_or(AppError::NoContent)?;
        Ok(self.persist_text(id, &text).await)
    }

    /// Save `text` without waiting for it; joined by `drain_pending`.
    ///
    /// The text is captured by the caller, so the save still lands if the
    /// session is evicted before the task runs.
    pub fn persist_in_background(self: &Arc<Self>, id: String, text: String) {
        let cache = Arc::clone(self);
        let mut pending = self.pending.lock();
        while pending.try_join_next().is_some() {}
        pending.spawn(async move {
            let outcome = cache.persist_text(&id, &text).await;
            debug!(session_id = %id, ?outcome, "background save finished");
        });
    }

    /// Wait for every in-flight background save
    pub async fn drain_pending(&self) {
        let mut pending = std::mem::take(&mut *self.pending.lock());
        while pending.join_next().await.is_some() {}
    }

    async fn persist_many(&self, batch: Vec<(String, String)>) -> usize {
        let saves = batch
            .iter()
            .map(|(id, text)| self.persist_text(id, text));
        join_all(saves)
            .await
            .into_iter()
            .filter(|outcome| outcome.is_persisted())
            .count()
    }

    /// Save every non-blank session not persisted within `interval`.
    /// Saves run concurrently and a failed save does not affect its siblings.
    /// Returns the number of sessions persisted.
    pub async fn write_back_stale(&self, interval: Duration) -> usize {
        let now = Instant::now();
        let batch: Vec<(String, String)> = self
            .registry
            .snapshot()
            .into_iter()
            .filter_map(|(id, session)| {
                let session = session.lock();
                session
                    .needs_write_back(now, interval)
                    .then(|| (id, session.text().to_string()))
            })
            .collect();

        if batch.is_empty() {
            return 0;
        }

        let issued = batch.len();
        histogram!(WRITEBACK_BATCH_SIZE).record(issued as f64);
        let saved = self.persist_many(batch).await;
        info!("Batch saved {} of {} sessions", saved, issued);
        saved
    }

    /// Save every non-blank resident session, whatever its age
    pub async fn flush_all(&self) -> usize {
        let batch: Vec<(String, String)> = self
            .registry
            .snapshot()
            .into_iter()
            .filter_map(|(id, session)| {
                let session = session.lock();
                (!session.is_blank()).then(|| (id, session.text().to_string()))
            })
            .collect();
        self.persist_many(batch).await
    }

    /// Drop `id` from memory and from durable storage
    pub async fn delete(&self, id: &str) {
        self.registry.remove(id);
        self.gateway.delete(id).await;
        info!(session_id = %id, "session deleted");
    }
}
