//! End-to-end tests through the tool handlers

mod common;

use common::{canonical_of, envelope_json, is_error, test_state, wait_until_indexed, write_fixture};
use satori::server::args::{ManageIndexAction, ManageIndexArgs, ReadFileArgs, SearchCodebaseArgs};
use satori::server::handlers::{ManageIndexHandler, ReadFileHandler, SearchCodebaseHandler};
use satori::server::ServerState;
use std::sync::Arc;
use tempfile::TempDir;

fn manage_args(action: ManageIndexAction, path: &str) -> ManageIndexArgs {
    serde_json::from_value(serde_json::json!({
        "action": match action {
            ManageIndexAction::Create => "create",
            ManageIndexAction::Reindex => "reindex",
            ManageIndexAction::Sync => "sync",
            ManageIndexAction::Status => "status",
            ManageIndexAction::Clear => "clear",
        },
        "path": path,
    }))
    .unwrap()
}

fn search_args(path: &str, query: &str) -> SearchCodebaseArgs {
    serde_json::from_value(serde_json::json!({ "path": path, "query": query })).unwrap()
}

async fn create_and_wait(state: &Arc<ServerState>, canonical: &str) {
    let handler = ManageIndexHandler::new(Arc::clone(state));
    let result = handler
        .handle(manage_args(ManageIndexAction::Create, canonical))
        .await;
    let envelope = envelope_json(&result);
    assert_eq!(envelope["status"], "ok", "create refused: {}", envelope);
    wait_until_indexed(state, canonical).await;
}

#[tokio::test]
async fn create_index_search_and_status_flow() {
    let state_dir = TempDir::new().unwrap();
    let repo = TempDir::new().unwrap();
    write_fixture(
        repo.path(),
        &[(
            "src/auth.py",
            "def validate_token(token):\n    return token is not None\n",
        )],
    );

    let state = test_state(&state_dir).await;
    let canonical = canonical_of(&repo);
    create_and_wait(&state, &canonical).await;

    let status = ManageIndexHandler::new(Arc::clone(&state))
        .handle(manage_args(ManageIndexAction::Status, &canonical))
        .await;
    let envelope = envelope_json(&status);
    assert_eq!(envelope["status"], "ok");
    assert_eq!(envelope["detail"]["codebase"]["status"], "indexed");
    assert!(envelope["detail"]["collection"]
        .as_str()
        .unwrap()
        .starts_with("hybrid_code_chunks_"));

    let search = SearchCodebaseHandler::new(Arc::clone(&state))
        .handle(search_args(&canonical, "validate token"))
        .await;
    assert!(!is_error(&search));
    let envelope = envelope_json(&search);
    assert_eq!(envelope["tool"], "search_codebase");
    assert!(envelope["totalResults"].as_u64().unwrap() >= 1);
    let groups = envelope["groups"].as_array().unwrap();
    let first_item = &groups[0]["items"][0];
    assert_eq!(first_item["relativePath"], "src/auth.py");
}

#[tokio::test]
async fn search_on_untracked_path_is_a_usage_error() {
    let state_dir = TempDir::new().unwrap();
    let repo = TempDir::new().unwrap();
    let state = test_state(&state_dir).await;

    let result = SearchCodebaseHandler::new(Arc::clone(&state))
        .handle(search_args(&canonical_of(&repo), "anything"))
        .await;
    assert!(is_error(&result));
}

#[tokio::test]
async fn subdirectory_search_resolves_to_the_indexed_parent() {
    let state_dir = TempDir::new().unwrap();
    let repo = TempDir::new().unwrap();
    write_fixture(
        repo.path(),
        &[
            ("src/auth.py", "def validate_token(token):\n    return token\n"),
            ("docs/notes.py", "def unrelated():\n    return 0\n"),
        ],
    );

    let state = test_state(&state_dir).await;
    let canonical = canonical_of(&repo);
    create_and_wait(&state, &canonical).await;

    let sub_path = format!("{}/src", canonical);
    let result = SearchCodebaseHandler::new(Arc::clone(&state))
        .handle(search_args(&sub_path, "validate token"))
        .await;
    let envelope = envelope_json(&result);
    assert_eq!(envelope["resolvedPath"], canonical.as_str());
    for group in envelope["groups"].as_array().unwrap() {
        for item in group["items"].as_array().unwrap() {
            assert!(item["relativePath"].as_str().unwrap().starts_with("src/"));
        }
    }
}

#[tokio::test]
async fn ignore_only_reindex_is_blocked_with_hints() {
    let state_dir = TempDir::new().unwrap();
    let repo = TempDir::new().unwrap();
    write_fixture(
        repo.path(),
        &[("src/app.py", "def app():\n    return 1\n")],
    );

    let state = test_state(&state_dir).await;
    let canonical = canonical_of(&repo);
    create_and_wait(&state, &canonical).await;

    // Establish the synchronizer baseline, then change only ignore rules
    ManageIndexHandler::new(Arc::clone(&state))
        .handle(manage_args(ManageIndexAction::Sync, &canonical))
        .await;
    write_fixture(repo.path(), &[(".gitignore", "coverage/**\n")]);
    // Record the pre-change signature the way a finished build does
    let reindex = ManageIndexHandler::new(Arc::clone(&state))
        .handle(manage_args(ManageIndexAction::Reindex, &canonical))
        .await;

    let envelope = envelope_json(&reindex);
    assert_eq!(envelope["status"], "blocked", "envelope: {}", envelope);
    assert_eq!(envelope["reason"], "unnecessary_reindex_ignore_only");
    assert_eq!(envelope["warnings"][0], "REINDEX_UNNECESSARY_IGNORE_ONLY");
    assert_eq!(envelope["hints"]["sync"]["args"]["action"], "sync");
    assert_eq!(
        envelope["hints"]["overrideReindex"]["args"]["allowUnnecessaryReindex"],
        true
    );

    // The override proceeds
    let mut override_args = manage_args(ManageIndexAction::Reindex, &canonical);
    override_args.allow_unnecessary_reindex = true;
    let overridden = ManageIndexHandler::new(Arc::clone(&state))
        .handle(override_args)
        .await;
    let envelope = envelope_json(&overridden);
    assert_eq!(envelope["status"], "ok");
    wait_until_indexed(&state, &canonical).await;
}

#[tokio::test]
async fn clear_removes_the_tracked_entry() {
    let state_dir = TempDir::new().unwrap();
    let repo = TempDir::new().unwrap();
    write_fixture(repo.path(), &[("a.py", "def f():\n    return 1\n")]);

    let state = test_state(&state_dir).await;
    let canonical = canonical_of(&repo);
    create_and_wait(&state, &canonical).await;
    assert!(state.context.has_collection(&canonical).await.unwrap());

    let result = ManageIndexHandler::new(Arc::clone(&state))
        .handle(manage_args(ManageIndexAction::Clear, &canonical))
        .await;
    assert_eq!(envelope_json(&result)["status"], "ok");
    assert!(state.snapshots.get_codebase_info(&canonical).is_none());
    assert!(!state.context.has_collection(&canonical).await.unwrap());
}

#[tokio::test]
async fn read_file_truncates_with_a_continuation_hint() {
    let state_dir = TempDir::new().unwrap();
    let repo = TempDir::new().unwrap();
    let body: String = (1..=20).map(|i| format!("line {}\n", i)).collect();
    write_fixture(repo.path(), &[("long.txt", body.as_str())]);

    let mut config = common::test_config();
    config.read_file_max_lines = 10;
    let state = common::test_state_with(&state_dir, config).await;

    let file_path = repo.path().join("long.txt").to_string_lossy().to_string();
    let args: ReadFileArgs = serde_json::from_value(serde_json::json!({ "path": file_path }))
        .unwrap();
    let result = ReadFileHandler::new(Arc::clone(&state)).handle(args).await;

    let value = serde_json::to_value(&result).unwrap();
    let text = value["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("line 10"));
    assert!(!text.contains("line 11\n"));
    assert!(text.contains(&file_path));
    assert!(text.contains("\"start_line\": 11"));
}

#[tokio::test]
async fn read_file_range_modes_follow_the_policy() {
    let state_dir = TempDir::new().unwrap();
    let repo = TempDir::new().unwrap();
    let body: String = (1..=30).map(|i| format!("line {}\n", i)).collect();
    write_fixture(repo.path(), &[("f.txt", body.as_str())]);
    let state = test_state(&state_dir).await;
    let file_path = repo.path().join("f.txt").to_string_lossy().to_string();

    // end only: 1..end
    let args: ReadFileArgs = serde_json::from_value(
        serde_json::json!({ "path": file_path, "end_line": 3, "mode": "annotated" }),
    )
    .unwrap();
    let result = ReadFileHandler::new(Arc::clone(&state)).handle(args).await;
    let envelope = envelope_json(&result);
    assert_eq!(envelope["startLine"], 1);
    assert_eq!(envelope["endLine"], 3);
    assert_eq!(envelope["truncated"], false);

    // both bounds clamp to the file
    let args: ReadFileArgs = serde_json::from_value(serde_json::json!({
        "path": file_path, "start_line": 25, "end_line": 500, "mode": "annotated"
    }))
    .unwrap();
    let result = ReadFileHandler::new(Arc::clone(&state)).handle(args).await;
    let envelope = envelope_json(&result);
    assert_eq!(envelope["startLine"], 25);
    assert_eq!(envelope["endLine"], 30);
}

#[tokio::test]
async fn read_file_open_symbol_uses_a_direct_span_verbatim() {
    let state_dir = TempDir::new().unwrap();
    let repo = TempDir::new().unwrap();
    let body: String = (1..=10).map(|i| format!("line {}\n", i)).collect();
    write_fixture(repo.path(), &[("f.py", body.as_str())]);
    let state = test_state(&state_dir).await;
    let file_path = repo.path().join("f.py").to_string_lossy().to_string();

    let args: ReadFileArgs = serde_json::from_value(serde_json::json!({
        "path": file_path,
        "mode": "annotated",
        "open_symbol": { "start_line": 4, "end_line": 6 },
    }))
    .unwrap();
    let result = ReadFileHandler::new(Arc::clone(&state)).handle(args).await;
    let envelope = envelope_json(&result);
    assert_eq!(envelope["startLine"], 4);
    assert_eq!(envelope["endLine"], 6);
    assert_eq!(envelope["content"], "line 4\nline 5\nline 6");
}

#[tokio::test]
async fn legacy_v2_entry_denies_search_with_requires_reindex() {
    let state_dir = TempDir::new().unwrap();
    let repo = TempDir::new().unwrap();
    write_fixture(repo.path(), &[("a.py", "def f():\n    return 1\n")]);
    let canonical = canonical_of(&repo);

    // Seed a v2 snapshot file before the state is built
    let paths =
        satori::infrastructure::paths::StatePaths::at(state_dir.path().join("satori-state"))
            .unwrap();
    std::fs::write(
        paths.snapshot_file(),
        serde_json::to_string_pretty(&serde_json::json!({
            "formatVersion": "v2",
            "codebases": {
                (canonical.as_str()): {
                    "status": "indexed",
                    "indexedFiles": 1,
                    "totalChunks": 2,
                    "indexStatus": "completed",
                    "lastUpdated": "2026-01-01T00:00:00Z",
                }
            }
        }))
        .unwrap(),
    )
    .unwrap();

    let state = common::test_state(&state_dir).await;
    let result = SearchCodebaseHandler::new(Arc::clone(&state))
        .handle(search_args(&canonical, "anything"))
        .await;
    let envelope = envelope_json(&result);
    assert_eq!(envelope["status"], "requires_reindex");
    assert_eq!(envelope["reason"], "legacy_unverified_fingerprint");

    let info = state.snapshots.get_codebase_info(&canonical).unwrap();
    assert_eq!(info.status.name(), "requires_reindex");
}
