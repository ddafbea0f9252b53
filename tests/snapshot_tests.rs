//! Integration tests for the lifecycle snapshot

use satori::domain::types::{
    CodebaseStatus, FingerprintSource, GateOutcome, IndexBuildOutcome, IndexFingerprint,
    IndexStats, ReindexReason, SchemaVersion,
};
use satori::snapshot::SnapshotManager;
use tempfile::TempDir;

fn runtime_fingerprint() -> IndexFingerprint {
    IndexFingerprint {
        embedding_provider: "openai".into(),
        embedding_model: "text-embedding-3-small".into(),
        embedding_dimension: 1536,
        vector_store_provider: "milvus".into(),
        schema_version: SchemaVersion::HybridV3,
    }
}

fn indexed_stats() -> IndexStats {
    IndexStats {
        indexed_files: 3,
        total_chunks: 30,
        status: IndexBuildOutcome::Completed,
    }
}

#[tokio::test]
async fn save_load_is_identity_on_the_lifecycle_map() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.json");

    let manager = SnapshotManager::new(path.clone(), runtime_fingerprint());
    manager.set_indexed("/repo/a", &indexed_stats());
    manager.set_sync_completed(
        "/repo/b",
        &satori::SyncChanges {
            added: vec!["x.rs".into()],
            removed: vec![],
            modified: vec!["y.rs".into()],
        },
    );
    manager.set_index_failed("/repo/c", "embedder unreachable".into(), Some(40.0));
    manager.save().await.unwrap();

    let reloaded = SnapshotManager::new(path, runtime_fingerprint());
    let entries = reloaded.list_codebases();
    assert_eq!(entries.len(), 3);

    let a = reloaded.get_codebase_info("/repo/a").unwrap();
    assert_eq!(a.status.name(), "indexed");
    let b = reloaded.get_codebase_info("/repo/b").unwrap();
    assert_eq!(
        b.status,
        CodebaseStatus::SyncCompleted {
            added: 1,
            removed: 0,
            modified: 1,
            total_changes: 2,
        }
    );
    let c = reloaded.get_codebase_info("/repo/c").unwrap();
    assert_eq!(c.status.name(), "indexfailed");
}

#[tokio::test]
async fn status_reads_are_stable_without_setters() {
    let dir = TempDir::new().unwrap();
    let manager = SnapshotManager::new(dir.path().join("snap.json"), runtime_fingerprint());
    manager.set_indexed("/repo", &indexed_stats());

    let first = manager.get_codebase_info("/repo").unwrap();
    let second = manager.get_codebase_info("/repo").unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn legacy_v2_entry_is_denied_and_demoted_on_access() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.json");
    std::fs::write(
        &path,
        r#"{
            "formatVersion": "v2",
            "codebases": {
                "/repo": {
                    "status": "indexed",
                    "indexedFiles": 5,
                    "totalChunks": 50,
                    "indexStatus": "completed",
                    "lastUpdated": "2026-01-01T00:00:00Z"
                }
            }
        }"#,
    )
    .unwrap();

    let manager = SnapshotManager::new(path, runtime_fingerprint());
    let info = manager.get_codebase_info("/repo").unwrap();
    assert_eq!(info.fingerprint_source, Some(FingerprintSource::AssumedV2));

    let decision = manager.ensure_fingerprint_compatibility_on_access("/repo");
    assert!(!decision.is_allowed());
    match decision.outcome {
        GateOutcome::Denied { reason, .. } => {
            assert_eq!(reason, ReindexReason::LegacyUnverifiedFingerprint);
        }
        GateOutcome::Allowed => panic!("expected denial"),
    }
    assert_eq!(
        manager.get_codebase_info("/repo").unwrap().status.name(),
        "requires_reindex"
    );
}

#[tokio::test]
async fn fingerprint_mismatch_message_names_both_fingerprints() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.json");

    // A writer with a different stack persists the entry
    let writer_fingerprint = IndexFingerprint {
        embedding_provider: "voyageai".into(),
        embedding_model: "voyage-4-large".into(),
        embedding_dimension: 1024,
        vector_store_provider: "milvus".into(),
        schema_version: SchemaVersion::HybridV3,
    };
    let writer = SnapshotManager::new(path.clone(), writer_fingerprint);
    writer.set_indexed("/repo", &indexed_stats());
    writer.save().await.unwrap();

    let reader = SnapshotManager::new(path, runtime_fingerprint());
    let decision = reader.ensure_fingerprint_compatibility_on_access("/repo");
    assert!(!decision.is_allowed());
    match decision.outcome {
        GateOutcome::Denied { reason, message } => {
            assert_eq!(reason, ReindexReason::FingerprintMismatch);
            assert!(message.contains("voyageai/voyage-4-large/1024/milvus/hybrid_v3"));
            assert!(message.contains("openai/text-embedding-3-small/1536/milvus/hybrid_v3"));
        }
        GateOutcome::Allowed => panic!("expected denial"),
    }
}

#[tokio::test]
async fn stale_indexing_on_disk_loses_to_fresh_progress() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.json");

    // Disk entry: indexing at 80%, aged a day
    let stale = serde_json::json!({
        "formatVersion": "v3",
        "lastUpdated": "2026-01-01T00:00:00Z",
        "codebases": {
            "/repo": {
                "status": "indexing",
                "indexingPercentage": 80.0,
                "lastUpdated": (chrono::Utc::now() - chrono::Duration::hours(24)).to_rfc3339(),
            }
        }
    });
    std::fs::write(&path, serde_json::to_string_pretty(&stale).unwrap()).unwrap();

    // In-memory: a fresh build just started
    let manager = SnapshotManager::new(path.clone(), runtime_fingerprint());
    manager.set_indexing("/repo", 0.0);
    manager.save().await.unwrap();

    let reloaded = SnapshotManager::new(path, runtime_fingerprint());
    match reloaded.get_codebase_info("/repo").unwrap().status {
        CodebaseStatus::Indexing {
            indexing_percentage,
        } => assert_eq!(indexing_percentage, 0.0),
        other => panic!("unexpected status {:?}", other),
    }
}

#[tokio::test]
async fn v1_list_is_migrated_and_gated() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.json");
    std::fs::write(&path, r#"["/repo/legacy"]"#).unwrap();

    let manager = SnapshotManager::new(path, runtime_fingerprint());
    let info = manager.get_codebase_info("/repo/legacy").unwrap();
    assert!(info.status.is_searchable());
    assert_eq!(info.fingerprint_source, Some(FingerprintSource::AssumedV2));

    let decision = manager.ensure_fingerprint_compatibility_on_access("/repo/legacy");
    assert!(!decision.is_allowed());
}

#[tokio::test]
async fn resolve_codebase_root_prefers_longest_ancestor() {
    let dir = TempDir::new().unwrap();
    let manager = SnapshotManager::new(dir.path().join("snap.json"), runtime_fingerprint());
    manager.set_indexed("/repo", &indexed_stats());
    manager.set_indexed("/repo/nested", &indexed_stats());

    assert_eq!(
        manager.resolve_codebase_root("/repo/nested/src").as_deref(),
        Some("/repo/nested")
    );
    assert_eq!(
        manager.resolve_codebase_root("/repo/src/lib.rs").as_deref(),
        Some("/repo")
    );
    assert_eq!(manager.resolve_codebase_root("/repository"), None);
    assert_eq!(manager.resolve_codebase_root("/elsewhere"), None);
}
