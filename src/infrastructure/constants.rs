//! Runtime constants and tunable defaults

use std::time::Duration;

/// Maximum chunk length in characters before line-based subdivision
pub const CHUNK_SIZE: usize = 2500;

/// Characters of overlap prepended from the preceding chunk
pub const CHUNK_OVERLAP: usize = 300;

/// Default number of chunks embedded and inserted per batch
pub const EMBEDDING_BATCH_SIZE: usize = 100;

/// Hard ceiling on chunks per index build
pub const CHUNK_LIMIT: usize = 450_000;

/// Default line cap for `read_file` responses
pub const READ_FILE_MAX_LINES: usize = 1000;

/// Gap in lines under which adjacent search hits of one file merge.
/// Tunable, not an invariant.
pub const MERGE_CLUSTER_GAP: u32 = 20;

/// Character cap applied when formatting non-raw search output.
/// Tunable, not an invariant.
pub const PREVIEW_LIMIT: usize = 4000;

/// Reciprocal Rank Fusion constant for hybrid search
pub const RRF_K: f32 = 100.0;

/// Freshness threshold applied before serving a search
pub const SEARCH_FRESHNESS_THRESHOLD: Duration = Duration::from_secs(180);

/// Period of the background freshness loop
pub const BACKGROUND_SYNC_PERIOD: Duration = Duration::from_secs(180);

/// Delay before the background freshness loop starts
pub const BACKGROUND_SYNC_STARTUP_DELAY: Duration = Duration::from_secs(5);

/// Default debounce window of the filesystem watcher
pub const WATCHER_DEBOUNCE: Duration = Duration::from_millis(5000);

/// Budget for awaiting tracked background tasks at shutdown
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Total budget for acquiring the snapshot lock
pub const SNAPSHOT_LOCK_WAIT: Duration = Duration::from_millis(2000);

/// Retry interval while waiting on the snapshot lock
pub const SNAPSHOT_LOCK_RETRY: Duration = Duration::from_millis(25);

/// Age after which a lock whose owner is gone is broken
pub const SNAPSHOT_LOCK_STALE: Duration = Duration::from_secs(30);

/// Age after which an `indexing` entry is considered abandoned during merge
pub const STALE_INDEXING_AGE: Duration = Duration::from_secs(600);

/// Maximum breadcrumb entries per chunk
pub const BREADCRUMB_MAX_DEPTH: usize = 2;

/// Maximum characters per breadcrumb entry
pub const BREADCRUMB_MAX_LEN: usize = 120;

/// Default search result limit
pub const SEARCH_DEFAULT_LIMIT: usize = 10;

/// Search result limit cap for local embedding setups
pub const SEARCH_MAX_LIMIT_LOCAL: usize = 50;

/// Search result limit cap for remote embedding setups
pub const SEARCH_MAX_LIMIT_REMOTE: usize = 30;

/// Maximum symbols returned by a single `file_outline` call
pub const OUTLINE_MAX_SYMBOLS: usize = 500;

/// Maximum traversal depth of a `call_graph` query
pub const CALL_GRAPH_MAX_DEPTH: usize = 3;
