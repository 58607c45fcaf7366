// ============================
// livepad-backend-lib/src/lib.rs
// ============================
//! Core backend-lib functionality for the `livepad` collaborative editing
//! server: the session cache, write-back persistence and the transport
//! shell around them.

pub mod codec;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod persistence;
pub mod registry;
pub mod router;
pub mod scheduler;
pub mod shutdown;
pub mod storage;
pub mod validation;
pub mod writeback;
pub mod ws_router;

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::codec::Codec;
use crate::config::Settings;
use crate::persistence::PersistenceGateway;
use crate::registry::SessionRegistry;
use crate::router::BroadcastRouter;
use crate::scheduler::LifecycleScheduler;
use crate::shutdown::ShutdownCoordinator;
use crate::storage::{FlatFileStorage, Storage};
use crate::writeback::WriteBackCache;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Settings the server was started with
    pub settings: Arc<Settings>,
    /// Resident sessions and their persistence
    pub cache: Arc<WriteBackCache>,
    /// Join/leave membership and edit fan-out
    pub router: Arc<BroadcastRouter>,
    /// Periodic write-back and eviction
    pub scheduler: Arc<LifecycleScheduler>,
    /// Final flush on termination
    pub shutdown: Arc<ShutdownCoordinator>,
}

impl AppState {
    /// Build the state, opening the flat-file store when `storage.path` is set
    pub fn new(settings: Settings) -> anyhow::Result<Self> {
        let storage = match &settings.storage.path {
            Some(path) => {
                let store = FlatFileStorage::new(path)
                    .with_context(|| format!("opening document store at {}", path.display()))?;
                info!(path = %path.display(), "using flat-file document store");
                Some(Arc::new(store) as Arc<dyn Storage>)
            },
            None => {
                info!("no storage configured, documents live in memory only");
                None
            },
        };
        Self::with_storage(settings, storage)
    }

    /// Build the state around an already opened backend
    pub fn with_storage(settings: Settings, storage: Option<Arc<dyn Storage>>) -> anyhow::Result<Self> {
        let codec = Codec::new(settings.encryption_key.as_deref())
            .context("deriving document encryption key")?;
        if codec.is_encrypted() {
            info!("documents are encrypted at rest");
        }

        let gateway = Arc::new(PersistenceGateway::new(storage, codec, settings.storage_timeout()));
        let cache = Arc::new(WriteBackCache::new(Arc::new(SessionRegistry::new()), gateway));
        let router = Arc::new(BroadcastRouter::new(cache.clone(), settings.max_document_bytes));
        let scheduler = Arc::new(LifecycleScheduler::new(
            cache.clone(),
            settings.save_interval(),
            settings.cleanup_interval(),
        ));
        let shutdown = Arc::new(ShutdownCoordinator::new(
            router.clone(),
            scheduler.clone(),
            cache.clone(),
        ));

        Ok(Self {
            settings: Arc::new(settings),
            cache,
            router,
            scheduler,
            shutdown,
        })
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        self.cache.registry()
    }

    pub fn gateway(&self) -> &Arc<PersistenceGateway> {
        self.cache.gateway()
    }
}
