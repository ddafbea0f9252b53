//! Indexing engine: ignore layers, collection management, build, sync, search

pub mod collection;
pub mod engine;
pub mod ignore;

pub use engine::{chunk_id, Context, IndexReport, ProgressFn};
