//! Shutdown coordination
//!
//! All background work — the freshness loop, the filesystem watcher, and
//! the sidecar rebuilds the sync lifecycle spawns — runs under one
//! coordinator: a `CancellationToken` for hierarchical stop signaling and
//! a `TaskTracker` so shutdown can await every outstanding task.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Coordinator for background task lifecycle
#[derive(Clone)]
pub struct ShutdownCoordinator {
    cancel_token: CancellationToken,
    task_tracker: TaskTracker,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            cancel_token: CancellationToken::new(),
            task_tracker: TaskTracker::new(),
        }
    }

    /// Child token, cancelled when the coordinator shuts down
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }

    /// Whether shutdown has been initiated
    pub fn is_shutting_down(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Number of tracked tasks still running
    pub fn active_tasks(&self) -> usize {
        self.task_tracker.len()
    }

    /// Spawn a tracked background task; shutdown awaits it
    pub fn spawn<F>(&self, name: &'static str, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        tracing::debug!("Spawning tracked task: {}", name);
        tokio::spawn(self.task_tracker.track_future(future))
    }

    /// Spawn a tracked task that receives a child token and is expected to
    /// exit when it is cancelled
    pub fn spawn_cancellable<F, Fut>(&self, name: &'static str, task_fn: F) -> JoinHandle<Fut::Output>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        let token = self.child_token();
        self.spawn(name, task_fn(token))
    }

    /// Cancel every token, stop accepting tasks, and wait for the tracked
    /// tasks to finish. Returns `false` when the timeout expires first.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        tracing::info!(
            "Shutting down background work ({} active tasks)",
            self.task_tracker.len()
        );
        self.cancel_token.cancel();
        self.task_tracker.close();

        tokio::select! {
            _ = self.task_tracker.wait() => true,
            _ = tokio::time::sleep(timeout) => {
                tracing::warn!(
                    "Shutdown timed out with {} tasks still active",
                    self.task_tracker.len()
                );
                false
            }
        }
    }
}
