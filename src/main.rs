//! Satori MCP server binary

use satori::server::run_server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    satori::infrastructure::logging::init_tracing()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    run_server()
        .await
        .map_err(|e| anyhow::anyhow!("Server failed: {}", e))
}
