//! Tool handlers, one per MCP tool

pub mod call_graph;
pub mod file_outline;
pub mod list_codebases;
pub mod manage_index;
pub mod read_file;
pub mod search_codebase;

pub use call_graph::CallGraphHandler;
pub use file_outline::FileOutlineHandler;
pub use list_codebases::ListCodebasesHandler;
pub use manage_index::ManageIndexHandler;
pub use read_file::ReadFileHandler;
pub use search_codebase::SearchCodebaseHandler;
