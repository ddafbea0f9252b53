//! Per-codebase lifecycle snapshot
//!
//! The snapshot file maps canonical codebase paths to their lifecycle
//! state. It is always written as v3; legacy v1 (a list of indexed paths)
//! and v2 (structured entries without fingerprints) are readable and
//! migrated on first load by tagging entries with
//! `fingerprintSource = "assumed_v2"`.

pub mod lock;
pub mod manager;

pub use manager::SnapshotManager;

use crate::domain::types::{CodebaseInfo, CodebaseStatus, FingerprintSource, IndexBuildOutcome};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The current on-disk format tag
pub const SNAPSHOT_FORMAT_V3: &str = "v3";

/// The v3 snapshot file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotFile {
    pub format_version: String,
    pub codebases: HashMap<String, CodebaseInfo>,
    pub last_updated: String,
}

impl SnapshotFile {
    pub fn new(codebases: HashMap<String, CodebaseInfo>) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_V3.to_string(),
            codebases,
            last_updated: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Legacy v2 layout: structured entries, possibly without format tag
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacySnapshotV2 {
    #[serde(default)]
    format_version: Option<String>,
    codebases: HashMap<String, CodebaseInfo>,
}

/// Parse any known snapshot format into the lifecycle map, migrating
/// legacy entries. Returns `None` for malformed content.
pub fn parse_snapshot(content: &str) -> Option<HashMap<String, CodebaseInfo>> {
    let value: serde_json::Value = serde_json::from_str(content).ok()?;

    // v1: a bare list of indexed codebase paths
    if let Some(paths) = value.as_array() {
        let mut codebases = HashMap::new();
        for path in paths {
            let path = path.as_str()?;
            codebases.insert(path.to_string(), migrated_v1_entry());
        }
        return Some(codebases);
    }

    let object = value.as_object()?;
    let format_version = object.get("formatVersion").and_then(|v| v.as_str());

    if format_version == Some(SNAPSHOT_FORMAT_V3) {
        let file: SnapshotFile = serde_json::from_value(value.clone()).ok()?;
        return Some(file.codebases);
    }

    // v2 and earlier structured layouts: migrate by tagging searchable
    // entries without a verified fingerprint
    let legacy: LegacySnapshotV2 = serde_json::from_value(value.clone()).ok()?;
    if let Some(tag) = legacy.format_version {
        if tag != "v2" {
            return None;
        }
    }
    let mut codebases = legacy.codebases;
    for info in codebases.values_mut() {
        if info.status.is_searchable() && info.fingerprint_source.is_none() {
            info.fingerprint_source = Some(FingerprintSource::AssumedV2);
        }
    }
    Some(codebases)
}

fn migrated_v1_entry() -> CodebaseInfo {
    let mut info = CodebaseInfo::new(CodebaseStatus::Indexed {
        indexed_files: 0,
        total_chunks: 0,
        index_status: IndexBuildOutcome::Completed,
    });
    info.fingerprint_source = Some(FingerprintSource::AssumedV2);
    info
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v1_list_migrates_to_assumed_entries() {
        let codebases = parse_snapshot(r#"["/repo/a", "/repo/b"]"#).unwrap();
        assert_eq!(codebases.len(), 2);
        let info = &codebases["/repo/a"];
        assert_eq!(info.fingerprint_source, Some(FingerprintSource::AssumedV2));
        assert!(info.status.is_searchable());
    }

    #[test]
    fn v2_entries_gain_assumed_fingerprint_source() {
        let content = r#"{
            "formatVersion": "v2",
            "codebases": {
                "/repo": {
                    "status": "indexed",
                    "indexedFiles": 4,
                    "totalChunks": 9,
                    "indexStatus": "completed",
                    "lastUpdated": "2026-01-01T00:00:00Z"
                }
            }
        }"#;
        let codebases = parse_snapshot(content).unwrap();
        assert_eq!(
            codebases["/repo"].fingerprint_source,
            Some(FingerprintSource::AssumedV2)
        );
    }

    #[test]
    fn v3_roundtrip_preserves_entries() {
        let mut codebases = HashMap::new();
        codebases.insert(
            "/repo".to_string(),
            CodebaseInfo::new(CodebaseStatus::SyncCompleted {
                added: 1,
                removed: 0,
                modified: 2,
                total_changes: 3,
            }),
        );
        let file = SnapshotFile::new(codebases.clone());
        let json = serde_json::to_string_pretty(&file).unwrap();
        let parsed = parse_snapshot(&json).unwrap();
        assert_eq!(parsed, codebases);
    }

    #[test]
    fn malformed_content_is_rejected() {
        assert!(parse_snapshot("not json").is_none());
        assert!(parse_snapshot(r#"{"formatVersion": "v9", "codebases": {}}"#).is_none());
        assert!(parse_snapshot("42").is_none());
    }
}
