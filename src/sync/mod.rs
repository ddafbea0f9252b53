//! File synchronizer, sync manager, and filesystem watcher

pub mod manager;
pub mod synchronizer;
pub mod watcher;

pub use manager::{SyncManager, SyncOutcome};
pub use synchronizer::FileSynchronizer;
pub use watcher::CodebaseWatcher;
