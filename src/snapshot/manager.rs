//! Snapshot manager
//!
//! Owns the in-memory lifecycle map, enforces the fingerprint access gate,
//! and coordinates cross-process writes: saving re-reads the on-disk file
//! under the lock, merges entry-by-entry with a deterministic preference,
//! applies pending removals, and renames a temp file into place.

use crate::domain::error::{Error, Result};
use crate::domain::types::{
    AccessDecision, CodebaseInfo, CodebaseStatus, FingerprintSource, IndexFingerprint, IndexStats,
    ReindexReason, SidecarInfo, SyncChanges,
};
use crate::infrastructure::constants::STALE_INDEXING_AGE;
use crate::snapshot::lock::SnapshotLock;
use crate::snapshot::{parse_snapshot, SnapshotFile};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

struct State {
    codebases: HashMap<String, CodebaseInfo>,
    pending_removals: HashSet<String>,
    dirty: bool,
}

/// Owner of the per-codebase lifecycle map
pub struct SnapshotManager {
    file_path: PathBuf,
    runtime_fingerprint: IndexFingerprint,
    state: Arc<Mutex<State>>,
}

impl SnapshotManager {
    /// Create the manager and load any existing snapshot file
    pub fn new(file_path: PathBuf, runtime_fingerprint: IndexFingerprint) -> Self {
        let codebases = load_from_disk(&file_path).unwrap_or_default();
        Self {
            file_path,
            runtime_fingerprint,
            state: Arc::new(Mutex::new(State {
                codebases,
                pending_removals: HashSet::new(),
                dirty: false,
            })),
        }
    }

    pub fn runtime_fingerprint(&self) -> &IndexFingerprint {
        &self.runtime_fingerprint
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ------------------------------------------------------------------
    // Read access (clone-on-read; callers never hold live references)
    // ------------------------------------------------------------------

    pub fn get_codebase_info(&self, canonical_path: &str) -> Option<CodebaseInfo> {
        self.lock_state().codebases.get(canonical_path).cloned()
    }

    pub fn list_codebases(&self) -> Vec<(String, CodebaseInfo)> {
        let state = self.lock_state();
        let mut entries: Vec<(String, CodebaseInfo)> = state
            .codebases
            .iter()
            .map(|(path, info)| (path.clone(), info.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Canonical paths currently in a searchable state
    pub fn searchable_codebases(&self) -> Vec<String> {
        let state = self.lock_state();
        let mut paths: Vec<String> = state
            .codebases
            .iter()
            .filter(|(_, info)| info.status.is_searchable())
            .map(|(path, _)| path.clone())
            .collect();
        paths.sort();
        paths
    }

    /// Resolve the tracked codebase containing `path`: an exact match, or
    /// the closest tracked ancestor
    pub fn resolve_codebase_root(&self, path: &str) -> Option<String> {
        let state = self.lock_state();
        if state.codebases.contains_key(path) {
            return Some(path.to_string());
        }
        let mut best: Option<&String> = None;
        for candidate in state.codebases.keys() {
            let prefix = format!("{}/", candidate.trim_end_matches('/'));
            if path.starts_with(&prefix) {
                match best {
                    Some(current) if current.len() >= candidate.len() => {}
                    _ => best = Some(candidate),
                }
            }
        }
        best.cloned()
    }

    pub fn is_dirty(&self) -> bool {
        self.lock_state().dirty
    }

    // ------------------------------------------------------------------
    // Status transitions
    // ------------------------------------------------------------------

    fn update_entry(
        &self,
        canonical_path: &str,
        apply: impl FnOnce(&mut CodebaseInfo),
    ) {
        let mut state = self.lock_state();
        let entry = state
            .codebases
            .entry(canonical_path.to_string())
            .or_insert_with(|| {
                CodebaseInfo::new(CodebaseStatus::Indexing {
                    indexing_percentage: 0.0,
                })
            });
        apply(entry);
        entry.last_updated = Utc::now().to_rfc3339();
        state.pending_removals.remove(canonical_path);
        state.dirty = true;
    }

    pub fn set_indexing(&self, canonical_path: &str, percentage: f32) {
        self.update_entry(canonical_path, |entry| {
            entry.status = CodebaseStatus::Indexing {
                indexing_percentage: percentage.clamp(0.0, 100.0),
            };
        });
    }

    /// Record a finished build, stamping the runtime fingerprint as verified
    pub fn set_indexed(&self, canonical_path: &str, stats: &IndexStats) {
        let fingerprint = self.runtime_fingerprint.clone();
        self.update_entry(canonical_path, |entry| {
            entry.status = CodebaseStatus::Indexed {
                indexed_files: stats.indexed_files,
                total_chunks: stats.total_chunks,
                index_status: stats.status,
            };
            entry.index_fingerprint = Some(fingerprint);
            entry.fingerprint_source = Some(FingerprintSource::Verified);
        });
    }

    pub fn set_sync_completed(&self, canonical_path: &str, changes: &SyncChanges) {
        self.update_entry(canonical_path, |entry| {
            entry.status = CodebaseStatus::SyncCompleted {
                added: changes.added.len(),
                removed: changes.removed.len(),
                modified: changes.modified.len(),
                total_changes: changes.total_changes(),
            };
        });
    }

    pub fn set_index_failed(
        &self,
        canonical_path: &str,
        error_message: String,
        last_attempted_percentage: Option<f32>,
    ) {
        self.update_entry(canonical_path, |entry| {
            entry.status = CodebaseStatus::IndexFailed {
                error_message,
                last_attempted_percentage,
            };
        });
    }

    pub fn set_requires_reindex(
        &self,
        canonical_path: &str,
        reason: ReindexReason,
        message: String,
    ) {
        self.update_entry(canonical_path, |entry| {
            entry.status = CodebaseStatus::RequiresReindex {
                message,
                reindex_reason: reason,
            };
        });
    }

    /// Remove an entry; the tombstone survives cross-process merges for one
    /// save cycle
    pub fn remove_codebase(&self, canonical_path: &str) {
        let mut state = self.lock_state();
        state.codebases.remove(canonical_path);
        state.pending_removals.insert(canonical_path.to_string());
        state.dirty = true;
    }

    // ------------------------------------------------------------------
    // Metadata-only setters: must not change status or status-derived
    // counters
    // ------------------------------------------------------------------

    fn update_metadata(
        &self,
        canonical_path: &str,
        apply: impl FnOnce(&mut CodebaseInfo),
    ) -> Result<()> {
        let mut state = self.lock_state();
        let entry = state
            .codebases
            .get_mut(canonical_path)
            .ok_or_else(|| Error::not_found(format!("No snapshot entry for {}", canonical_path)))?;
        let status_before = entry.status.clone();
        apply(entry);
        assert_eq!(
            status_before, entry.status,
            "metadata-only setter changed the lifecycle status"
        );
        entry.last_updated = Utc::now().to_rfc3339();
        state.dirty = true;
        Ok(())
    }

    pub fn set_codebase_call_graph_sidecar(
        &self,
        canonical_path: &str,
        sidecar: Option<SidecarInfo>,
    ) -> Result<()> {
        self.update_metadata(canonical_path, |entry| {
            entry.call_graph_sidecar = sidecar;
        })
    }

    pub fn set_codebase_index_manifest(
        &self,
        canonical_path: &str,
        manifest: Vec<String>,
    ) -> Result<()> {
        self.update_metadata(canonical_path, |entry| {
            let mut manifest = manifest;
            manifest.sort();
            manifest.dedup();
            entry.index_manifest = Some(manifest);
        })
    }

    pub fn set_codebase_ignore_rules_version(
        &self,
        canonical_path: &str,
        version: u64,
    ) -> Result<()> {
        self.update_metadata(canonical_path, |entry| {
            entry.ignore_rules_version = Some(version);
        })
    }

    pub fn set_codebase_ignore_control_signature(
        &self,
        canonical_path: &str,
        signature: String,
    ) -> Result<()> {
        self.update_metadata(canonical_path, |entry| {
            entry.ignore_control_signature = Some(signature);
        })
    }

    // ------------------------------------------------------------------
    // Access gate
    // ------------------------------------------------------------------

    /// Refuse queries on incompatible or legacy indexes, demoting the entry
    /// to `requires_reindex`
    pub fn ensure_fingerprint_compatibility_on_access(
        &self,
        canonical_path: &str,
    ) -> AccessDecision {
        let info = match self.get_codebase_info(canonical_path) {
            Some(info) => info,
            None => return AccessDecision::allowed(false),
        };

        if let CodebaseStatus::RequiresReindex {
            message,
            reindex_reason,
        } = &info.status
        {
            return AccessDecision::denied(*reindex_reason, message.clone(), false);
        }

        if !info.status.is_searchable() {
            return AccessDecision::allowed(false);
        }

        if info.fingerprint_source == Some(FingerprintSource::AssumedV2) {
            let message = format!(
                "Index of {} predates fingerprint verification; reindex to continue",
                canonical_path
            );
            self.set_requires_reindex(
                canonical_path,
                ReindexReason::LegacyUnverifiedFingerprint,
                message.clone(),
            );
            return AccessDecision::denied(
                ReindexReason::LegacyUnverifiedFingerprint,
                message,
                true,
            );
        }

        let Some(indexed) = info.index_fingerprint else {
            let message = format!(
                "Index of {} has no recorded fingerprint; reindex to continue",
                canonical_path
            );
            self.set_requires_reindex(
                canonical_path,
                ReindexReason::MissingFingerprint,
                message.clone(),
            );
            return AccessDecision::denied(ReindexReason::MissingFingerprint, message, true);
        };

        if !indexed.is_compatible(&self.runtime_fingerprint) {
            let message = format!(
                "Index fingerprint {} does not match runtime fingerprint {}; reindex to continue",
                indexed.render(),
                self.runtime_fingerprint.render()
            );
            self.set_requires_reindex(
                canonical_path,
                ReindexReason::FingerprintMismatch,
                message.clone(),
            );
            return AccessDecision::denied(ReindexReason::FingerprintMismatch, message, true);
        }

        AccessDecision::allowed(false)
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Save under the cross-process lock. Returns `false` when the lock was
    /// unavailable within its budget; the dirty flag stays set so a later
    /// save retries.
    pub async fn save(&self) -> Result<bool> {
        self.save_with_wait(true).await
    }

    /// Save with a single lock probe instead of the bounded wait
    pub async fn try_save(&self) -> Result<bool> {
        self.save_with_wait(false).await
    }

    async fn save_with_wait(&self, wait: bool) -> Result<bool> {
        let (codebases, pending_removals) = {
            let state = self.lock_state();
            (state.codebases.clone(), state.pending_removals.clone())
        };
        let file_path = self.file_path.clone();

        let merged = tokio::task::spawn_blocking(move || {
            write_merged(&file_path, codebases, &pending_removals, wait)
        })
        .await
        .map_err(|e| Error::internal(format!("Snapshot save task failed: {}", e)))??;

        match merged {
            Some(codebases) => {
                let mut state = self.lock_state();
                state.codebases = codebases;
                state.pending_removals.clear();
                state.dirty = false;
                Ok(true)
            }
            None => {
                tracing::debug!("Snapshot lock unavailable; save skipped, state stays dirty");
                Ok(false)
            }
        }
    }
}

/// Merge-and-write under the lock. Returns the merged map, or `None` when
/// the lock could not be acquired.
fn write_merged(
    file_path: &Path,
    memory: HashMap<String, CodebaseInfo>,
    pending_removals: &HashSet<String>,
    wait: bool,
) -> Result<Option<HashMap<String, CodebaseInfo>>> {
    let Some(_lock) = SnapshotLock::acquire(file_path, wait)? else {
        return Ok(None);
    };

    let disk = load_from_disk(file_path).unwrap_or_default();
    let now = Utc::now();

    let mut merged: HashMap<String, CodebaseInfo> = HashMap::new();
    let mut keys: HashSet<&String> = memory.keys().collect();
    keys.extend(disk.keys());

    for key in keys {
        if pending_removals.contains(key) {
            continue;
        }
        let winner = match (disk.get(key), memory.get(key)) {
            (Some(disk_entry), Some(memory_entry)) => {
                prefer_entry(disk_entry, memory_entry, now).clone()
            }
            (Some(disk_entry), None) => disk_entry.clone(),
            (None, Some(memory_entry)) => memory_entry.clone(),
            (None, None) => continue,
        };
        merged.insert(key.clone(), winner);
    }

    let file = SnapshotFile::new(merged.clone());
    let body = serde_json::to_string_pretty(&file)?;
    let tmp_path = file_path.with_file_name(format!(
        "{}.tmp-{}-{}",
        file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "snapshot".to_string()),
        std::process::id(),
        uuid::Uuid::new_v4().simple()
    ));
    if let Some(parent) = tmp_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&tmp_path, body)?;
    fs::rename(&tmp_path, file_path)?;

    Ok(Some(merged))
}

/// Load the lifecycle map, quarantining malformed files instead of
/// overwriting them
fn load_from_disk(file_path: &Path) -> Option<HashMap<String, CodebaseInfo>> {
    if !file_path.exists() {
        return None;
    }
    let content = match fs::read_to_string(file_path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!("Cannot read snapshot {}: {}", file_path.display(), e);
            return None;
        }
    };
    match parse_snapshot(&content) {
        Some(codebases) => Some(codebases),
        None => {
            quarantine_corrupt(file_path);
            None
        }
    }
}

fn quarantine_corrupt(file_path: &Path) {
    let corrupt_path = file_path.with_file_name(format!(
        "{}.corrupt-{}-{}-{}.json",
        file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "snapshot".to_string()),
        std::process::id(),
        Utc::now().timestamp_millis(),
        uuid::Uuid::new_v4().simple()
    ));
    tracing::warn!(
        "Quarantining malformed snapshot {} -> {}",
        file_path.display(),
        corrupt_path.display()
    );
    if fs::rename(file_path, &corrupt_path).is_err() {
        if fs::copy(file_path, &corrupt_path).is_ok() {
            let _ = fs::remove_file(file_path);
        }
    }
}

// ----------------------------------------------------------------------
// Merge preference
// ----------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum MergeClass {
    Searchable = 0,
    TerminalBad = 1,
    Active = 2,
}

fn classify(info: &CodebaseInfo) -> MergeClass {
    match info.status {
        CodebaseStatus::Indexing { .. } => MergeClass::Active,
        CodebaseStatus::IndexFailed { .. } | CodebaseStatus::RequiresReindex { .. } => {
            MergeClass::TerminalBad
        }
        CodebaseStatus::Indexed { .. } | CodebaseStatus::SyncCompleted { .. } => {
            MergeClass::Searchable
        }
    }
}

fn parsed_timestamp(info: &CodebaseInfo) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&info.last_updated)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn is_stale_indexing(info: &CodebaseInfo, now: DateTime<Utc>) -> bool {
    matches!(info.status, CodebaseStatus::Indexing { .. })
        && now
            .signed_duration_since(parsed_timestamp(info))
            .to_std()
            .map(|age| age > STALE_INDEXING_AGE)
            .unwrap_or(false)
}

/// Deterministic entry preference for the cross-process merge
fn prefer_entry<'a>(
    disk: &'a CodebaseInfo,
    memory: &'a CodebaseInfo,
    now: DateTime<Utc>,
) -> &'a CodebaseInfo {
    let disk_class = classify(disk);
    let memory_class = classify(memory);

    // Between two indexing entries a fresh one beats a stale one
    // regardless of percentage
    if disk_class == MergeClass::Active && memory_class == MergeClass::Active {
        return match (is_stale_indexing(disk, now), is_stale_indexing(memory, now)) {
            (true, false) => memory,
            (false, true) => disk,
            _ => later_of(disk, memory),
        };
    }

    // A stale indexing entry is demoted when the other side is non-indexing
    if disk_class == MergeClass::Active && is_stale_indexing(disk, now) {
        return memory;
    }
    if memory_class == MergeClass::Active && is_stale_indexing(memory, now) {
        return disk;
    }

    match disk_class.cmp(&memory_class) {
        std::cmp::Ordering::Greater => disk,
        std::cmp::Ordering::Less => memory,
        std::cmp::Ordering::Equal => later_of(disk, memory),
    }
}

fn later_of<'a>(disk: &'a CodebaseInfo, memory: &'a CodebaseInfo) -> &'a CodebaseInfo {
    if parsed_timestamp(memory) >= parsed_timestamp(disk) {
        memory
    } else {
        disk
    }
}
