// ============================
// livepad-backend-lib/src/persistence.rs
// ============================
//! Persistence gateway: the only component that talks to durable storage.
//!
//! Every operation is best-effort. Storage and codec failures are logged and
//! reported to the caller as "absent" or as a non-persisted outcome; nothing
//! here returns an error into an event-processing step. With no backend
//! attached all operations complete immediately as no-ops.
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use livepad_common::StorageStatus;
use metrics::counter;
use tracing::{debug, error, warn};

use crate::codec::Codec;
use crate::error::StorageError;
use crate::metrics::{SAVE_FAILED, SAVE_OK};
use crate::storage::{Storage, StoredDocument};

/// Result of a save request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The record was written
    Persisted,
    /// Trimmed text was empty; nothing written
    SkippedBlank,
    /// No backend attached
    NoStore,
    /// Encoding or storage failed; already logged
    Failed,
}

impl SaveOutcome {
    pub fn is_persisted(self) -> bool {
        self == SaveOutcome::Persisted
    }
}

/// Wraps a storage backend and the codec
pub struct PersistenceGateway {
    storage: Option<Arc<dyn Storage>>,
    codec: Codec,
    timeout: Duration,
}

impl PersistenceGateway {
    pub fn new(storage: Option<Arc<dyn Storage>>, codec: Codec, timeout: Duration) -> Self {
        Self {
            storage,
            codec,
            timeout,
        }
    }

    /// Gateway with no backend at all
    pub fn in_memory() -> Self {
        Self::new(None, Codec::plain(), Duration::from_secs(5))
    }

    pub fn has_storage(&self) -> bool {
        self.storage.is_some()
    }

    pub fn status(&self) -> StorageStatus {
        if self.has_storage() {
            StorageStatus::Connected
        } else {
            StorageStatus::Disconnected
        }
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, StorageError>
    where
        F: Future<Output = Result<T, StorageError>>,
    {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| StorageError::Timeout(self.timeout))?
    }

    /// Fetch and decode the stored text of `id`
    pub async fn load(&self, id: &str) -> Option<String> {
        let storage = self.storage.as_ref()?;

        let record = match self.bounded(storage.fetch(id)).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(session_id = %id, "no stored document");
                return None;
            },
            Err(e) => {
                error!(session_id = %id, backend = storage.name(), "load failed: {}", e);
                return None;
            },
        };

        match self.codec.decode(&record.content) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(session_id = %id, "stored document unreadable, treating as absent: {}", e);
                None
            },
        }
    }

    /// Encode and upsert `text` under `id`, skipping blank text
    pub async fn save(&self, id: &str, text: &str) -> SaveOutcome {
        let Some(storage) = self.storage.as_ref() else {
            return SaveOutcome::NoStore;
        };
        if text.trim().is_empty() {
            return SaveOutcome::SkippedBlank;
        }

        let content = match self.codec.encode(text) {
            Ok(content) => content,
            Err(e) => {
                error!(session_id = %id, "encode failed: {}", e);
                counter!(SAVE_FAILED).increment(1);
                return SaveOutcome::Failed;
            },
        };

        let document = StoredDocument {
            id: id.to_string(),
            content,
            updated_at: Utc::now(),
        };

        match self.bounded(storage.upsert(document)).await {
            Ok(()) => {
                debug!(session_id = %id, bytes = text.len(), "document saved");
                counter!(SAVE_OK).increment(1);
                SaveOutcome::Persisted
            },
            Err(e) => {
                error!(session_id = %id, backend = storage.name(), "save failed: {}", e);
                counter!(SAVE_FAILED).increment(1);
                SaveOutcome::Failed
            },
        }
    }

    /// Remove the stored record of `id`; missing records are fine
    pub async fn delete(&self, id: &str) {
        let Some(storage) = self.storage.as_ref() else {
            return;
        };
        if let Err(e) = self.bounded(storage.remove(id)).await {
            error!(session_id = %id, backend = storage.name(), "delete failed: {}", e);
        }
    }

    /// Release the backend
    pub async fn close(&self) {
        let Some(storage) = self.storage.as_ref() else {
            return;
        };
        if let Err(e) = self.bounded(storage.close()).await {
            warn!(backend = storage.name(), "closing storage failed: {}", e);
        }
    }
}
