//! Vector store implementations

pub mod memory;
#[cfg(feature = "milvus")]
pub mod milvus;

pub use memory::MemoryVectorStore;
#[cfg(feature = "milvus")]
pub use milvus::MilvusVectorStore;
