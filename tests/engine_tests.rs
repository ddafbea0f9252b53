//! Integration tests for the indexing engine

mod common;

use common::{canonical_of, test_state, write_fixture};
use satori::chunking::SplitterKind;
use satori::domain::types::FilterExpr;
use satori::IndexBuildOutcome;
use tempfile::TempDir;

#[tokio::test]
async fn index_build_then_search_finds_content() {
    let state_dir = TempDir::new().unwrap();
    let repo = TempDir::new().unwrap();
    write_fixture(
        repo.path(),
        &[
            (
                "src/auth.py",
                "def validate_token(token):\n    return token is not None\n",
            ),
            ("src/math.py", "def add(a, b):\n    return a + b\n"),
        ],
    );

    let state = test_state(&state_dir).await;
    let canonical = canonical_of(&repo);
    let report = state
        .context
        .index_codebase(&canonical, false, SplitterKind::Ast, &[], None)
        .await
        .unwrap();
    assert_eq!(report.stats.indexed_files, 2);
    assert!(report.stats.total_chunks >= 2);
    assert_eq!(report.stats.status, IndexBuildOutcome::Completed);
    assert_eq!(
        report.manifest,
        vec!["src/auth.py".to_string(), "src/math.py".to_string()]
    );

    let hits = state
        .context
        .semantic_search(&canonical, "validate_token token", 5, 0.0, FilterExpr::new())
        .await
        .unwrap();
    assert!(!hits.is_empty());
    assert!(hits.iter().any(|hit| hit.relative_path == "src/auth.py"));
}

#[tokio::test]
async fn search_excludes_the_completion_marker() {
    let state_dir = TempDir::new().unwrap();
    let repo = TempDir::new().unwrap();

    let state = test_state(&state_dir).await;
    let canonical = canonical_of(&repo);
    // An empty tree builds a collection containing only the marker
    let report = state
        .context
        .index_codebase(&canonical, false, SplitterKind::Ast, &[], None)
        .await
        .unwrap();
    assert_eq!(report.stats.total_chunks, 0);

    let marker = state.context.completion_marker(&canonical).await.unwrap();
    assert!(marker.is_some());

    let hits = state
        .context
        .semantic_search(&canonical, "anything at all", 10, 0.0, FilterExpr::new())
        .await
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn marker_records_build_statistics_and_fingerprint() {
    let state_dir = TempDir::new().unwrap();
    let repo = TempDir::new().unwrap();
    write_fixture(repo.path(), &[("a.py", "def f():\n    return 1\n")]);

    let state = test_state(&state_dir).await;
    let canonical = canonical_of(&repo);
    let report = state
        .context
        .index_codebase(&canonical, false, SplitterKind::Ast, &[], None)
        .await
        .unwrap();

    let marker = state
        .context
        .completion_marker(&canonical)
        .await
        .unwrap()
        .expect("marker present");
    assert_eq!(marker.codebase_path, canonical);
    assert_eq!(marker.indexed_files, report.stats.indexed_files);
    assert_eq!(marker.total_chunks, report.stats.total_chunks);
    assert!(marker
        .fingerprint
        .is_compatible(&state.context.runtime_fingerprint()));
}

#[tokio::test]
async fn rebuild_produces_identical_chunk_ids() {
    let state_dir = TempDir::new().unwrap();
    let repo = TempDir::new().unwrap();
    write_fixture(
        repo.path(),
        &[
            ("a.py", "def f():\n    return 1\n"),
            ("b.py", "def g():\n    return 2\n"),
        ],
    );

    let state = test_state(&state_dir).await;
    let canonical = canonical_of(&repo);
    let collection = state.context.collection_for(&canonical);

    state
        .context
        .index_codebase(&canonical, false, SplitterKind::Ast, &[], None)
        .await
        .unwrap();
    let mut first: Vec<String> = state
        .context
        .store()
        .query_by_filter(&collection, &FilterExpr::new(), 1000)
        .await
        .unwrap()
        .into_iter()
        .map(|doc| doc.id)
        .collect();
    first.sort();

    state.context.clear_index(&canonical).await.unwrap();
    state
        .context
        .index_codebase(&canonical, false, SplitterKind::Ast, &[], None)
        .await
        .unwrap();
    let mut second: Vec<String> = state
        .context
        .store()
        .query_by_filter(&collection, &FilterExpr::new(), 1000)
        .await
        .unwrap()
        .into_iter()
        .map(|doc| doc.id)
        .collect();
    second.sort();

    assert_eq!(first, second);
}

#[tokio::test]
async fn incremental_sync_applies_adds_removes_and_modifications() {
    let state_dir = TempDir::new().unwrap();
    let repo = TempDir::new().unwrap();
    write_fixture(
        repo.path(),
        &[
            ("keep.py", "def keep():\n    return 'keep'\n"),
            ("gone.py", "def gone():\n    return 'gone'\n"),
        ],
    );

    let state = test_state(&state_dir).await;
    let canonical = canonical_of(&repo);
    state
        .context
        .index_codebase(&canonical, false, SplitterKind::Ast, &[], None)
        .await
        .unwrap();
    // Register the baseline before mutating the tree
    let first_sync = state.context.incremental_sync(&canonical).await.unwrap();
    assert!(!first_sync.has_changes() || !first_sync.added.is_empty());

    std::fs::remove_file(repo.path().join("gone.py")).unwrap();
    write_fixture(
        repo.path(),
        &[("fresh.py", "def fresh_function_name():\n    return 42\n")],
    );

    let changes = state.context.incremental_sync(&canonical).await.unwrap();
    assert_eq!(changes.added, vec!["fresh.py".to_string()]);
    assert_eq!(changes.removed, vec!["gone.py".to_string()]);

    let hits = state
        .context
        .semantic_search(
            &canonical,
            "fresh_function_name",
            10,
            0.0,
            FilterExpr::new(),
        )
        .await
        .unwrap();
    assert!(hits.iter().any(|hit| hit.relative_path == "fresh.py"));
    assert!(hits.iter().all(|hit| hit.relative_path != "gone.py"));
}

#[tokio::test]
async fn unchanged_tree_syncs_to_empty_change_set() {
    let state_dir = TempDir::new().unwrap();
    let repo = TempDir::new().unwrap();
    write_fixture(repo.path(), &[("a.py", "def f():\n    return 1\n")]);

    let state = test_state(&state_dir).await;
    let canonical = canonical_of(&repo);
    state
        .context
        .index_codebase(&canonical, false, SplitterKind::Ast, &[], None)
        .await
        .unwrap();

    // First sync establishes the synchronizer baseline; second must be empty
    state.context.incremental_sync(&canonical).await.unwrap();
    let changes = state.context.incremental_sync(&canonical).await.unwrap();
    assert!(!changes.has_changes());
}

#[tokio::test]
async fn search_returns_empty_for_unindexed_codebase() {
    let state_dir = TempDir::new().unwrap();
    let repo = TempDir::new().unwrap();
    let state = test_state(&state_dir).await;
    let canonical = canonical_of(&repo);

    let hits = state
        .context
        .semantic_search(&canonical, "anything", 10, 0.0, FilterExpr::new())
        .await
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn runtime_fingerprint_reflects_configuration() {
    let state_dir = TempDir::new().unwrap();
    let state = test_state(&state_dir).await;
    let fingerprint = state.context.runtime_fingerprint();
    assert_eq!(fingerprint.embedding_provider, "null");
    assert_eq!(fingerprint.embedding_dimension, 8);
    assert_eq!(fingerprint.vector_store_provider, "memory");
    assert_eq!(
        fingerprint.schema_version,
        satori::SchemaVersion::HybridV3
    );
}
