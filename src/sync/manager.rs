//! Sync manager
//!
//! Keeps indexed codebases fresh with minimal redundant work. Freshness
//! requests pass three sequential gates: coalescing (concurrent requests
//! for one codebase share a single in-flight operation), throttling (a
//! recent successful sync short-circuits), and execution. A background
//! loop walks indexed codebases sequentially every few minutes.

use crate::domain::error::{Error, Result};
use crate::domain::types::SyncChanges;
use crate::index::Context;
use crate::infrastructure::constants::{BACKGROUND_SYNC_PERIOD, BACKGROUND_SYNC_STARTUP_DELAY};
use crate::infrastructure::shutdown::ShutdownCoordinator;
use crate::snapshot::SnapshotManager;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Outcome of one freshness request
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// A recent sync made this request a no-op
    Skipped,
    /// The codebase path no longer exists and was removed from the snapshot
    Removed,
    /// An incremental sync ran
    Synced(SyncChanges),
}

/// Callback invoked with the change set after each executed sync
pub type SyncListener = Arc<dyn Fn(&str, &SyncChanges) + Send + Sync>;

type SharedSync = Shared<BoxFuture<'static, std::result::Result<SyncOutcome, String>>>;

/// Coalesced, throttled freshness coordinator
pub struct SyncManager {
    context: Arc<Context>,
    snapshots: Arc<SnapshotManager>,
    inflight: Mutex<HashMap<String, SharedSync>>,
    last_sync: Mutex<HashMap<String, Instant>>,
    listeners: std::sync::RwLock<Vec<SyncListener>>,
}

impl SyncManager {
    pub fn new(context: Arc<Context>, snapshots: Arc<SnapshotManager>) -> Self {
        Self {
            context,
            snapshots,
            inflight: Mutex::new(HashMap::new()),
            last_sync: Mutex::new(HashMap::new()),
            listeners: std::sync::RwLock::new(Vec::new()),
        }
    }

    /// Register a listener for executed syncs (e.g. sidecar delta rebuild)
    pub fn add_sync_listener(&self, listener: SyncListener) {
        if let Ok(mut listeners) = self.listeners.write() {
            listeners.push(listener);
        }
    }

    /// Ensure the codebase index reflects the tree, subject to the
    /// coalescing and throttling gates
    pub async fn ensure_freshness(
        self: &Arc<Self>,
        canonical_path: &str,
        threshold: Duration,
    ) -> Result<SyncOutcome> {
        // Gate 1: coalesce onto an in-flight sync for this path
        let future = {
            let mut inflight = self.inflight.lock().await;
            if let Some(existing) = inflight.get(canonical_path) {
                existing.clone()
            } else {
                // Gate 2: throttle on a recent successful sync
                if threshold > Duration::ZERO {
                    let last_sync = self.last_sync.lock().await;
                    if let Some(at) = last_sync.get(canonical_path) {
                        if at.elapsed() < threshold {
                            return Ok(SyncOutcome::Skipped);
                        }
                    }
                }

                // Gate 3: execute
                let manager = Arc::clone(self);
                let path = canonical_path.to_string();
                let future: SharedSync = async move {
                    let result = manager.run_sync(&path).await.map_err(|e| e.to_string());
                    manager.inflight.lock().await.remove(&path);
                    result
                }
                .boxed()
                .shared();
                inflight.insert(canonical_path.to_string(), future.clone());
                future
            }
        };

        future.await.map_err(Error::internal)
    }

    async fn run_sync(self: &Arc<Self>, canonical_path: &str) -> Result<SyncOutcome> {
        if !Path::new(canonical_path).exists() {
            tracing::info!(
                "Codebase {} no longer exists; removing from snapshot",
                canonical_path
            );
            self.snapshots.remove_codebase(canonical_path);
            let _ = self.snapshots.save().await;
            return Ok(SyncOutcome::Removed);
        }

        let changes = self.context.incremental_sync(canonical_path).await?;
        self.last_sync
            .lock()
            .await
            .insert(canonical_path.to_string(), Instant::now());
        self.snapshots
            .set_sync_completed(canonical_path, &changes);
        let _ = self.snapshots.save().await;

        if changes.has_changes() {
            let listeners = self
                .listeners
                .read()
                .map(|l| l.clone())
                .unwrap_or_default();
            for listener in listeners {
                listener(canonical_path, &changes);
            }
        }

        Ok(SyncOutcome::Synced(changes))
    }

    /// Long-lived loop syncing indexed codebases sequentially; tracked by
    /// the coordinator and cancelled through its token
    pub fn spawn_background_loop(
        self: &Arc<Self>,
        shutdown: &ShutdownCoordinator,
    ) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        shutdown.spawn_cancellable("background-sync", move |token| async move {
            tokio::select! {
                _ = tokio::time::sleep(BACKGROUND_SYNC_STARTUP_DELAY) => {}
                _ = token.cancelled() => return,
            }
            let mut ticker = tokio::time::interval(BACKGROUND_SYNC_PERIOD);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        for path in manager.snapshots.searchable_codebases() {
                            if token.is_cancelled() {
                                return;
                            }
                            if let Err(e) = manager.ensure_freshness(&path, Duration::ZERO).await {
                                tracing::warn!("Background sync of {} failed: {}", path, e);
                            }
                        }
                    }
                    _ = token.cancelled() => return,
                }
            }
        })
    }
}
