//! # Satori
//!
//! A Model Context Protocol server for semantic code indexing and
//! retrieval.
//!
//! Given one or more absolute codebase roots, Satori chunks source files
//! along syntactic boundaries, embeds the chunks into a vector store,
//! maintains an incremental snapshot of file state so only changed files
//! are re-embedded, serves semantic search queries, and enforces strict
//! compatibility between the embedding/model/schema that produced an
//! index and the runtime that queries it.
//!
//! ## Architecture
//!
//! - [`domain`]: shared types, the error model, and capability port traits
//! - [`chunking`]: AST-based splitting with a generic fallback
//! - [`sync`]: the Merkle file synchronizer, sync manager, and watcher
//! - [`snapshot`]: the per-codebase lifecycle map with fingerprint gating
//! - [`index`]: the indexing-and-retrieval engine
//! - [`callgraph`]: the heuristic call-graph sidecar
//! - [`providers`]: embedding and vector-store implementations
//! - [`server`]: the six MCP tools and the stdio serve loop

pub mod callgraph;
pub mod chunking;
pub mod config;
pub mod domain;
pub mod index;
pub mod infrastructure;
pub mod providers;
pub mod server;
pub mod snapshot;
pub mod sync;

pub use domain::error::{Error, Result};
pub use domain::types::*;
pub use server::{run_server, SatoriServer};
