//! Debounced filesystem watcher
//!
//! Optional mode of the sync manager: filesystem events for tracked
//! codebase roots schedule a freshness pass once the configured debounce
//! window has elapsed without further events.

use crate::domain::error::{Error, Result};
use crate::infrastructure::shutdown::ShutdownCoordinator;
use crate::sync::manager::SyncManager;
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

const WATCHER_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Running watcher bound to a set of codebase roots
pub struct CodebaseWatcher {
    watcher: RecommendedWatcher,
    roots: Arc<Mutex<Vec<String>>>,
    _task: tokio::task::JoinHandle<()>,
}

impl CodebaseWatcher {
    /// Start the watcher. Events map to the closest tracked codebase root;
    /// each root syncs once its debounce window closes. The debounce task
    /// is tracked by the coordinator and stops on cancellation.
    pub fn spawn(
        sync_manager: Arc<SyncManager>,
        debounce: Duration,
        shutdown: &ShutdownCoordinator,
    ) -> Result<Self> {
        let roots: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let (tx, mut rx) = mpsc::channel::<String>(256);

        let roots_for_events = Arc::clone(&roots);
        let watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| {
                let Ok(event) = result else { return };
                if !(event.kind.is_create() || event.kind.is_modify() || event.kind.is_remove()) {
                    return;
                }
                let roots = match roots_for_events.lock() {
                    Ok(roots) => roots,
                    Err(_) => return,
                };
                for path in &event.paths {
                    if let Some(root) = owning_root(&roots, path) {
                        let _ = tx.blocking_send(root);
                        break;
                    }
                }
            },
            NotifyConfig::default(),
        )
        .map_err(|e| Error::internal(format!("Failed to create watcher: {}", e)))?;

        let task = {
            let token = shutdown.child_token();
            shutdown.spawn("watcher-debounce", async move {
                let mut pending: HashMap<String, Instant> = HashMap::new();
                let mut ticker = tokio::time::interval(WATCHER_POLL_INTERVAL);
                loop {
                    tokio::select! {
                        event = rx.recv() => {
                            match event {
                                Some(root) => {
                                    pending.insert(root, Instant::now());
                                }
                                None => return,
                            }
                        }
                        _ = ticker.tick() => {
                            let due: Vec<String> = pending
                                .iter()
                                .filter(|(_, at)| at.elapsed() >= debounce)
                                .map(|(root, _)| root.clone())
                                .collect();
                            for root in due {
                                pending.remove(&root);
                                if let Err(e) = sync_manager
                                    .ensure_freshness(&root, Duration::ZERO)
                                    .await
                                {
                                    tracing::warn!("Watcher sync of {} failed: {}", root, e);
                                }
                            }
                        }
                        _ = token.cancelled() => return,
                    }
                }
            })
        };

        Ok(Self {
            watcher,
            roots,
            _task: task,
        })
    }

    /// Track a codebase root
    pub fn watch_root(&mut self, canonical_path: &str) -> Result<()> {
        self.watcher
            .watch(Path::new(canonical_path), RecursiveMode::Recursive)
            .map_err(|e| Error::internal(format!("Failed to watch {}: {}", canonical_path, e)))?;
        if let Ok(mut roots) = self.roots.lock() {
            if !roots.iter().any(|root| root == canonical_path) {
                roots.push(canonical_path.to_string());
            }
        }
        Ok(())
    }
}

/// The longest tracked root that contains `path`
fn owning_root(roots: &[String], path: &Path) -> Option<String> {
    let path_text = path.to_string_lossy();
    roots
        .iter()
        .filter(|root| {
            let prefix = format!("{}/", root.trim_end_matches('/'));
            path_text.as_ref() == root.as_str() || path_text.starts_with(&prefix)
        })
        .max_by_key(|root| root.len())
        .cloned()
}
