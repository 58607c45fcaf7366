// ============================
// livepad-backend-lib/src/shutdown.rs
// ============================
//! Graceful shutdown: flush resident sessions before the process exits.
use std::sync::Arc;

use tracing::info;

use crate::router::BroadcastRouter;
use crate::scheduler::LifecycleScheduler;
use crate::writeback::WriteBackCache;

pub struct ShutdownCoordinator {
    router: Arc<BroadcastRouter>,
    scheduler: Arc<LifecycleScheduler>,
    cache: Arc<WriteBackCache>,
}

impl ShutdownCoordinator {
    pub fn new(
        router: Arc<BroadcastRouter>,
        scheduler: Arc<LifecycleScheduler>,
        cache: Arc<WriteBackCache>,
    ) -> Self {
        Self {
            router,
            scheduler,
            cache,
        }
    }

    /// Refuse new work, save every non-blank session once, wait for
    /// in-flight saves and release storage. Failed saves are not retried.
    /// Returns the number of sessions persisted by the final flush.
    pub async fn shutdown(&self) -> usize {
        info!("Shutting down, saving all sessions");
        self.router.close();
        self.scheduler.stop().await;

        let saved = self.cache.flush_all().await;
        self.cache.drain_pending().await;
        self.cache.gateway().close().await;

        info!("Saved {} sessions before exit", saved);
        saved
    }
}

/// Resolves on Ctrl-C or, on unix, SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("termination signal received");
}
