//! MCP protocol surface: argument schemas, envelopes, handlers, serving

pub mod args;
pub mod envelope;
pub mod handlers;
pub mod init;
pub mod mcp_server;
pub mod state;

pub use init::{build_state, run_server};
pub use mcp_server::SatoriServer;
pub use state::ServerState;
