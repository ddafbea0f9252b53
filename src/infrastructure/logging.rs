//! Tracing initialization for the stdio server
//!
//! Log output goes to stderr; stdout belongs to the MCP transport.

use tracing_subscriber::EnvFilter;

/// Initialize tracing with the standard filter chain
pub fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into())
        .add_directive("satori=debug".parse()?)
        .add_directive("rmcp=info".parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    Ok(())
}
