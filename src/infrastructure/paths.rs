//! User-level state directory layout and path canonicalization
//!
//! All persistent state lives under `~/.satori/`:
//! - `mcp-codebase-snapshot.json` plus its `.lock`/`.tmp-*`/`.corrupt-*` siblings
//! - `merkle/<hash>.json` per-codebase file-state snapshots
//! - `call-graph/<hash>.json` per-codebase sidecars
//!
//! A legacy `~/.context/` directory is migrated on first resolution.

use crate::domain::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

const STATE_DIR_NAME: &str = ".satori";
const LEGACY_DIR_NAME: &str = ".context";
const SNAPSHOT_FILE_NAME: &str = "mcp-codebase-snapshot.json";
const MERKLE_DIR_NAME: &str = "merkle";
const CALL_GRAPH_DIR_NAME: &str = "call-graph";

/// Resolver for all on-disk state paths
#[derive(Debug, Clone)]
pub struct StatePaths {
    root: PathBuf,
}

impl StatePaths {
    /// Resolve the user-level state root, migrating the legacy directory
    /// when present
    pub fn resolve() -> Result<Self> {
        let home =
            dirs::home_dir().ok_or_else(|| Error::internal("Cannot determine home directory"))?;
        let root = home.join(STATE_DIR_NAME);
        let legacy = home.join(LEGACY_DIR_NAME);
        if legacy.is_dir() && !root.exists() {
            migrate_legacy_dir(&legacy, &root)?;
        }
        Self::at(root)
    }

    /// Use an explicit base directory (tests)
    pub fn at(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The lifecycle snapshot file
    pub fn snapshot_file(&self) -> PathBuf {
        self.root.join(SNAPSHOT_FILE_NAME)
    }

    /// Per-codebase file-state snapshot
    pub fn merkle_file(&self, canonical_path: &str) -> Result<PathBuf> {
        let dir = self.root.join(MERKLE_DIR_NAME);
        fs::create_dir_all(&dir)?;
        Ok(dir.join(format!("{}.json", path_digest(canonical_path))))
    }

    /// Per-codebase call-graph sidecar
    pub fn call_graph_file(&self, canonical_path: &str) -> Result<PathBuf> {
        let dir = self.root.join(CALL_GRAPH_DIR_NAME);
        fs::create_dir_all(&dir)?;
        Ok(dir.join(format!("{}.json", path_digest(canonical_path))))
    }
}

/// MD5 digest of a canonical codebase path, used for deterministic state
/// file names and collection names
pub fn path_digest(canonical_path: &str) -> String {
    format!("{:x}", md5::compute(canonical_path.as_bytes()))
}

/// Rename the legacy state directory, falling back to copy-then-remove for
/// cross-device moves
fn migrate_legacy_dir(legacy: &Path, target: &Path) -> Result<()> {
    tracing::info!(
        "Migrating legacy state directory {} -> {}",
        legacy.display(),
        target.display()
    );
    match fs::rename(legacy, target) {
        Ok(()) => Ok(()),
        Err(_) => {
            copy_dir_recursive(legacy, target)?;
            fs::remove_dir_all(legacy)?;
            Ok(())
        }
    }
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Canonicalize a codebase path: real path when resolvable, trailing
/// separators trimmed. The canonical string is the unique key for
/// snapshots, collections, and sidecars.
pub fn canonical_codebase_path(path: &Path) -> Result<String> {
    let resolved = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let mut text = resolved.to_string_lossy().to_string();
    while text.len() > 1 && (text.ends_with('/') || text.ends_with('\\')) {
        text.pop();
    }
    if text.is_empty() {
        return Err(Error::invalid_argument("Empty codebase path"));
    }
    Ok(text)
}

/// Compute the relative path of `file` under `root` with forward slashes.
///
/// Retries against the non-canonicalized root so files reached through a
/// symlinked root still resolve before being rejected.
pub fn relative_to_root(root: &Path, file: &Path) -> Result<String> {
    let real_root = fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    let real_file = fs::canonicalize(file).unwrap_or_else(|_| file.to_path_buf());
    let rel = real_file
        .strip_prefix(&real_root)
        .or_else(|_| real_file.strip_prefix(root))
        .or_else(|_| file.strip_prefix(root))
        .map_err(|_| {
            Error::invalid_argument(format!(
                "{} is not under {}",
                file.display(),
                root.display()
            ))
        })?;
    Ok(normalize_separators(&rel.to_string_lossy()))
}

/// Forward-slash normalization for stored relative paths
pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}
