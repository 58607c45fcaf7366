// ============================
// livepad-backend-lib/src/scheduler.rs
// ============================
//! Periodic write-back and eviction sweeps.
//!
//! Both sweeps work on a point-in-time snapshot of resident ids and never
//! hold a registry-wide lock, so connection events keep flowing while a
//! sweep runs. Eviction does not save first: a session whose last
//! connection left is expected to be covered by the leave-triggered save or
//! an earlier write-back.
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::metrics::{SESSION_ACTIVE, SESSION_EVICTED};
use crate::writeback::WriteBackCache;

pub struct LifecycleScheduler {
    cache: Arc<WriteBackCache>,
    save_interval: Duration,
    cleanup_interval: Duration,
    stop_tx: watch::Sender<bool>,
    tasks: Mutex<JoinSet<()>>,
}

impl LifecycleScheduler {
    pub fn new(cache: Arc<WriteBackCache>, save_interval: Duration, cleanup_interval: Duration) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            cache,
            save_interval,
            cleanup_interval,
            stop_tx,
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Run one write-back sweep
    pub async fn write_back(&self) -> usize {
        self.cache.write_back_stale(self.save_interval).await
    }

    /// Run one eviction sweep. Returns the number of sessions evicted.
    pub fn evict_idle(&self) -> usize {
        let registry = self.cache.registry();
        let evicted = registry
            .ids()
            .into_iter()
            .filter(|id| registry.evict_if_empty(id))
            .inspect(|id| debug!(session_id = %id, "evicted idle session"))
            .count();

        if evicted > 0 {
            counter!(SESSION_EVICTED).increment(evicted as u64);
            info!("Cleaned up {} inactive sessions", evicted);
        }
        gauge!(SESSION_ACTIVE).set(registry.len() as f64);
        evicted
    }

    /// Spawn both sweep loops. The first tick of each fires one full
    /// interval after start.
    pub fn start(self: &Arc<Self>) {
        let mut tasks = self.tasks.lock();

        let scheduler = Arc::clone(self);
        let mut stop_rx = self.stop_tx.subscribe();
        tasks.spawn(async move {
            let period = scheduler.save_interval;
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        scheduler.write_back().await;
                    }
                    _ = stop_rx.changed() => break,
                }
            }
            debug!("write-back loop stopped");
        });

        let scheduler = Arc::clone(self);
        let mut stop_rx = self.stop_tx.subscribe();
        tasks.spawn(async move {
            let period = scheduler.cleanup_interval;
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        scheduler.evict_idle();
                    }
                    _ = stop_rx.changed() => break,
                }
            }
            debug!("eviction loop stopped");
        });

        info!(
            save_interval = ?self.save_interval,
            cleanup_interval = ?self.cleanup_interval,
            "lifecycle scheduler started"
        );
    }

    /// Stop both loops and wait for any sweep in progress to finish
    pub async fn stop(&self) {
        self.stop_tx.send_replace(true);
        let mut tasks = std::mem::take(&mut *self.tasks.lock());
        while tasks.join_next().await.is_some() {}
    }
}
