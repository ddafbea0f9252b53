//! Merkle-style file synchronizer
//!
//! Classifies files as added, modified, or removed since the last recorded
//! snapshot while hashing as little as possible: a file whose size and
//! mtime match the previous record reuses its recorded content hash. A
//! root hash over the sorted (path, hash) pairs gives an O(1) unchanged
//! fast path. Directories that cannot be enumerated degrade to a partial
//! scan that never produces spurious removals.

use crate::domain::error::{Error, Result};
use crate::domain::types::ChangeReport;
use crate::index::ignore::CompiledIgnore;
use crate::infrastructure::paths::normalize_separators;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

/// Identity of one tracked file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub size: u64,
    pub mtime_ns: u128,
    pub content_hash: String,
}

/// Persisted synchronizer state
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PersistedState {
    files: BTreeMap<String, FileRecord>,
    merkle_root: String,
    runs_since_full_rehash: u32,
}

/// Outcome of one filesystem scan
struct ScanOutcome {
    files: BTreeMap<String, FileRecord>,
    hashed_count: usize,
    partial_scan: bool,
    unscanned_dir_prefixes: Vec<String>,
}

/// Per-codebase file synchronizer. Each codebase owns its own instance, so
/// concurrent access is structurally impossible.
pub struct FileSynchronizer {
    root: PathBuf,
    matcher: Arc<CompiledIgnore>,
    state_file: PathBuf,
    state: PersistedState,
    /// Re-hash every file every N runs; 0 disables the periodic rehash
    full_rehash_interval: u32,
}

impl FileSynchronizer {
    pub fn new(
        root: impl Into<PathBuf>,
        matcher: Arc<CompiledIgnore>,
        state_file: PathBuf,
        full_rehash_interval: u32,
    ) -> Self {
        Self {
            root: root.into(),
            matcher,
            state_file,
            state: PersistedState::default(),
            full_rehash_interval,
        }
    }

    /// Load the persisted snapshot, or record the current tree as the
    /// baseline when none exists
    pub async fn init(&mut self) -> Result<()> {
        if self.state_file.exists() {
            let content = fs::read_to_string(&self.state_file)?;
            match serde_json::from_str::<PersistedState>(&content) {
                Ok(state) => {
                    self.state = state;
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(
                        "Discarding unreadable synchronizer snapshot {}: {}",
                        self.state_file.display(),
                        e
                    );
                }
            }
        }
        let outcome = self.scan().await?;
        self.state.merkle_root = merkle_root(&outcome.files);
        self.state.files = outcome.files;
        self.state.runs_since_full_rehash = 0;
        self.persist()?;
        Ok(())
    }

    /// Classify changes since the previous snapshot and persist the new one
    pub async fn check_for_changes(&mut self) -> Result<ChangeReport> {
        let outcome = self.scan().await?;
        let report = diff_states(&self.state.files, &outcome);

        let new_root = merkle_root(&outcome.files);
        let mut files = outcome.files;
        if outcome.partial_scan {
            // Retain prior entries under unscanned prefixes so a later full
            // scan can still classify them; keep the prior root to avoid
            // masking their changes
            for (path, record) in &self.state.files {
                if under_any_prefix(path, &outcome.unscanned_dir_prefixes) {
                    files.entry(path.clone()).or_insert_with(|| record.clone());
                }
            }
        } else {
            self.state.merkle_root = new_root;
        }
        self.state.files = files;
        self.state.runs_since_full_rehash = self.state.runs_since_full_rehash.wrapping_add(1);
        self.persist()?;
        Ok(report)
    }

    /// Classify changes without mutating or persisting state, for
    /// preflight probes
    pub async fn peek_changes(&self) -> Result<ChangeReport> {
        let outcome = self.scan().await?;
        Ok(diff_states(&self.state.files, &outcome))
    }

    /// Remove the persisted snapshot for a codebase
    pub fn delete_snapshot(state_file: &Path) -> Result<()> {
        if state_file.exists() {
            fs::remove_file(state_file)?;
        }
        Ok(())
    }

    async fn scan(&self) -> Result<ScanOutcome> {
        let root = self.root.clone();
        let matcher = Arc::clone(&self.matcher);
        let previous = self.state.files.clone();
        let rehash_all = self.full_rehash_interval > 0
            && self.state.runs_since_full_rehash != 0
            && self.state.runs_since_full_rehash % self.full_rehash_interval == 0;

        tokio::task::spawn_blocking(move || scan_tree(&root, &matcher, &previous, rehash_all))
            .await
            .map_err(|e| Error::internal(format!("Scan task failed: {}", e)))?
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.state_file.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string(&self.state)?;
        fs::write(&self.state_file, content)?;
        Ok(())
    }
}

/// Walk the tree depth-first, classifying and hashing as needed
fn scan_tree(
    root: &Path,
    matcher: &CompiledIgnore,
    previous: &BTreeMap<String, FileRecord>,
    rehash_all: bool,
) -> Result<ScanOutcome> {
    let mut outcome = ScanOutcome {
        files: BTreeMap::new(),
        hashed_count: 0,
        partial_scan: false,
        unscanned_dir_prefixes: Vec::new(),
    };
    walk_dir(root, root, matcher, previous, rehash_all, &mut outcome);
    Ok(outcome)
}

fn walk_dir(
    root: &Path,
    dir: &Path,
    matcher: &CompiledIgnore,
    previous: &BTreeMap<String, FileRecord>,
    rehash_all: bool,
    outcome: &mut ScanOutcome,
) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            let prefix = relative_of(root, dir);
            tracing::warn!("Cannot enumerate {}: {}", dir.display(), e);
            outcome.partial_scan = true;
            if !prefix.is_empty() {
                outcome.unscanned_dir_prefixes.push(prefix);
            }
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };
        let path = entry.path();
        let relative = relative_of(root, &path);
        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };

        if file_type.is_dir() {
            if matcher.is_ignored(&relative, true) {
                continue;
            }
            walk_dir(root, &path, matcher, previous, rehash_all, outcome);
        } else if file_type.is_file() {
            if matcher.is_ignored(&relative, false) {
                continue;
            }
            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };
            let size = metadata.len();
            let mtime_ns = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_nanos())
                .unwrap_or(0);

            let reusable = previous
                .get(&relative)
                .filter(|prev| !rehash_all && prev.size == size && prev.mtime_ns == mtime_ns);

            let content_hash = match reusable {
                Some(prev) => prev.content_hash.clone(),
                None => match hash_file(&path) {
                    Ok(hash) => {
                        outcome.hashed_count += 1;
                        hash
                    }
                    Err(e) => {
                        tracing::warn!("Skipping unreadable file {}: {}", path.display(), e);
                        continue;
                    }
                },
            };

            outcome.files.insert(
                relative,
                FileRecord {
                    size,
                    mtime_ns,
                    content_hash,
                },
            );
        }
    }
}

fn relative_of(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .map(|rel| normalize_separators(&rel.to_string_lossy()))
        .unwrap_or_default()
}

/// Streaming SHA-256 of raw file bytes
fn hash_file(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 65536];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Root hash over sorted (path, hash) pairs
fn merkle_root(files: &BTreeMap<String, FileRecord>) -> String {
    let mut hasher = Sha256::new();
    for (path, record) in files {
        hasher.update(path.as_bytes());
        hasher.update(b"\0");
        hasher.update(record.content_hash.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

/// Segment-safe prefix test: `a` does not swallow `ab/`
fn under_any_prefix(path: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|prefix| {
        path == prefix || path.starts_with(&format!("{}/", prefix.trim_end_matches('/')))
    })
}

fn diff_states(previous: &BTreeMap<String, FileRecord>, current: &ScanOutcome) -> ChangeReport {
    let current_root = merkle_root(&current.files);
    let previous_root = merkle_root(previous);

    if current_root == previous_root && !current.partial_scan {
        return ChangeReport {
            hashed_count: current.hashed_count,
            ..Default::default()
        };
    }

    let mut report = ChangeReport {
        hashed_count: current.hashed_count,
        partial_scan: current.partial_scan,
        unscanned_dir_prefixes: current.unscanned_dir_prefixes.clone(),
        ..Default::default()
    };

    for (path, record) in &current.files {
        match previous.get(path) {
            None => report.added.push(path.clone()),
            Some(prev) if prev.content_hash != record.content_hash => {
                report.modified.push(path.clone())
            }
            Some(_) => {}
        }
    }
    for path in previous.keys() {
        if !current.files.contains_key(path)
            && !under_any_prefix(path, &current.unscanned_dir_prefixes)
        {
            report.removed.push(path.clone());
        }
    }
    report
}
