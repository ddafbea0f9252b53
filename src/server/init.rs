//! Server assembly and the stdio serve loop

use crate::callgraph::CallGraphSidecarManager;
use crate::config::{CapabilityResolver, Config};
use crate::index::Context;
use crate::infrastructure::constants::{SHUTDOWN_TIMEOUT, WATCHER_DEBOUNCE};
use crate::infrastructure::paths::StatePaths;
use crate::infrastructure::shutdown::ShutdownCoordinator;
use crate::providers::{create_embedding_provider, create_vector_store};
use crate::server::mcp_server::SatoriServer;
use crate::server::state::ServerState;
use crate::snapshot::SnapshotManager;
use crate::sync::{CodebaseWatcher, SyncManager};
use rmcp::transport::stdio;
use rmcp::ServiceExt;
use std::sync::Arc;
use std::time::Duration;

/// Build every component from the loaded configuration
pub async fn build_state(
    config: Config,
    state_paths: StatePaths,
) -> Result<Arc<ServerState>, Box<dyn std::error::Error>> {
    let config = Arc::new(config);
    let capabilities = Arc::new(CapabilityResolver::new(&config));
    let shutdown = Arc::new(ShutdownCoordinator::new());

    let embedding = create_embedding_provider(&config)?;
    let store = create_vector_store(&config).await?;

    let context = Arc::new(Context::new(
        Arc::clone(&config),
        embedding,
        store,
        state_paths.clone(),
    ));
    let runtime_fingerprint = context.runtime_fingerprint();

    let snapshots = Arc::new(SnapshotManager::new(
        state_paths.snapshot_file(),
        runtime_fingerprint.clone(),
    ));
    let sync_manager = Arc::new(SyncManager::new(Arc::clone(&context), Arc::clone(&snapshots)));
    let callgraph = Arc::new(CallGraphSidecarManager::new(
        state_paths,
        runtime_fingerprint,
    ));

    // The sidecar follows incremental syncs through the delta policy; each
    // rebuild runs as a tracked task so shutdown can await it
    {
        let callgraph = Arc::clone(&callgraph);
        let context = Arc::clone(&context);
        let snapshots = Arc::clone(&snapshots);
        let shutdown = Arc::clone(&shutdown);
        sync_manager.add_sync_listener(Arc::new(move |path, changes| {
            let callgraph = Arc::clone(&callgraph);
            let context = Arc::clone(&context);
            let snapshots = Arc::clone(&snapshots);
            let path = path.to_string();
            let changes = changes.clone();
            shutdown.spawn("sidecar-rebuild", async move {
                let matcher = match context.matcher_handle(&path).await {
                    Ok(matcher) => matcher,
                    Err(e) => {
                        tracing::warn!("Sidecar rebuild skipped for {}: {}", path, e);
                        return;
                    }
                };
                match callgraph
                    .rebuild_if_supported_delta(&path, &changes, matcher)
                    .await
                {
                    Ok(Some(sidecar)) => {
                        let info = callgraph.info_for(&path, &sidecar);
                        if let Err(e) =
                            snapshots.set_codebase_call_graph_sidecar(&path, Some(info))
                        {
                            tracing::warn!("Failed to record sidecar info for {}: {}", path, e);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!("Sidecar rebuild failed for {}: {}", path, e),
                }
            });
        }));
    }

    Ok(Arc::new(ServerState {
        config,
        capabilities,
        context,
        snapshots,
        sync_manager,
        callgraph,
        shutdown,
    }))
}

/// Run the Satori MCP server over stdio until the transport closes
pub async fn run_server() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();
    let state_paths = StatePaths::resolve()?;
    let state = build_state(config, state_paths).await?;

    tracing::info!(
        "Starting Satori v{} ({})",
        env!("CARGO_PKG_VERSION"),
        state.capabilities.telemetry_tag()
    );

    state.sync_manager.spawn_background_loop(&state.shutdown);

    let mut watcher = None;
    if state.config.watcher_enabled {
        let debounce = Duration::from_millis(state.config.watcher_debounce_ms)
            .max(Duration::from_millis(1))
            .min(Duration::from_secs(600));
        match CodebaseWatcher::spawn(
            Arc::clone(&state.sync_manager),
            if state.config.watcher_debounce_ms == 0 {
                WATCHER_DEBOUNCE
            } else {
                debounce
            },
            &state.shutdown,
        ) {
            Ok(mut running) => {
                for path in state.snapshots.searchable_codebases() {
                    if let Err(e) = running.watch_root(&path) {
                        tracing::warn!("Cannot watch {}: {}", path, e);
                    }
                }
                watcher = Some(running);
            }
            Err(e) => tracing::warn!("Filesystem watcher disabled: {}", e),
        }
    }

    let server = SatoriServer::new(Arc::clone(&state));
    let service = server.serve(stdio()).await?;
    tracing::info!("Satori MCP server ready on stdio");
    service.waiting().await?;

    // Transport closed: cancel background work, await the tracked tasks,
    // then flush pending state
    state.shutdown.shutdown(SHUTDOWN_TIMEOUT).await;
    drop(watcher);
    if state.snapshots.is_dirty() {
        let _ = state.snapshots.save().await;
    }
    tracing::info!("Satori shutdown complete");
    Ok(())
}
