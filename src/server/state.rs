//! Shared handler state

use crate::callgraph::CallGraphSidecarManager;
use crate::config::{CapabilityResolver, Config};
use crate::index::Context;
use crate::infrastructure::shutdown::ShutdownCoordinator;
use crate::snapshot::SnapshotManager;
use crate::sync::SyncManager;
use std::sync::Arc;

/// Everything the tool handlers need, assembled once at startup
pub struct ServerState {
    pub config: Arc<Config>,
    pub capabilities: Arc<CapabilityResolver>,
    pub context: Arc<Context>,
    pub snapshots: Arc<SnapshotManager>,
    pub sync_manager: Arc<SyncManager>,
    pub callgraph: Arc<CallGraphSidecarManager>,
    /// Lifecycle of every background task: the freshness loop, the
    /// watcher, and sidecar rebuilds
    pub shutdown: Arc<ShutdownCoordinator>,
}
