//! Integration tests for the call-graph sidecar

mod common;

use common::{canonical_of, test_state, write_fixture};
use satori::callgraph::manager::{OutlineSelector, OutlineStatus};
use satori::callgraph::query::{run_query, CallGraphQuery};
use satori::callgraph::Direction;
use tempfile::TempDir;

const PY_FIXTURE: &str = r#"def helper(x):
    return x * 2

def middle(x):
    return helper(x) + 1

def top(x):
    return middle(x)
"#;

#[tokio::test]
async fn build_persists_a_sorted_sidecar() {
    let state_dir = TempDir::new().unwrap();
    let repo = TempDir::new().unwrap();
    write_fixture(repo.path(), &[("app.py", PY_FIXTURE)]);

    let state = test_state(&state_dir).await;
    let canonical = canonical_of(&repo);
    let matcher = state.context.matcher_handle(&canonical).await.unwrap();
    let sidecar = state.callgraph.build(&canonical, matcher).await.unwrap();

    assert_eq!(sidecar.format_version, "v3");
    assert_eq!(sidecar.nodes.len(), 3);
    assert!(sidecar.edges.len() >= 2);

    // Load round-trips with matching schema version
    let loaded = state.callgraph.load(&canonical).unwrap().unwrap();
    assert_eq!(loaded, sidecar);
}

#[tokio::test]
async fn callees_walk_downward_to_the_depth_bound() {
    let state_dir = TempDir::new().unwrap();
    let repo = TempDir::new().unwrap();
    write_fixture(repo.path(), &[("app.py", PY_FIXTURE)]);

    let state = test_state(&state_dir).await;
    let canonical = canonical_of(&repo);
    let matcher = state.context.matcher_handle(&canonical).await.unwrap();
    let sidecar = state.callgraph.build(&canonical, matcher).await.unwrap();

    let shallow = run_query(
        &sidecar,
        &CallGraphQuery {
            symbol_ref: "top".into(),
            direction: Direction::Callees,
            depth: 1,
            limit: 50,
        },
    );
    let shallow_graph = shallow.graph.unwrap();
    assert_eq!(shallow_graph.edges.len(), 1);

    let deep = run_query(
        &sidecar,
        &CallGraphQuery {
            symbol_ref: "top".into(),
            direction: Direction::Callees,
            depth: 3,
            limit: 50,
        },
    );
    let deep_graph = deep.graph.unwrap();
    assert!(deep_graph.edges.len() >= 2);
    assert_eq!(deep_graph.nodes.len(), 3);
}

#[tokio::test]
async fn depth_three_limit_one_returns_one_edge() {
    let state_dir = TempDir::new().unwrap();
    let repo = TempDir::new().unwrap();
    write_fixture(repo.path(), &[("app.py", PY_FIXTURE)]);

    let state = test_state(&state_dir).await;
    let canonical = canonical_of(&repo);
    let matcher = state.context.matcher_handle(&canonical).await.unwrap();
    let sidecar = state.callgraph.build(&canonical, matcher).await.unwrap();

    let response = run_query(
        &sidecar,
        &CallGraphQuery {
            symbol_ref: "top".into(),
            direction: Direction::Both,
            depth: 3,
            limit: 1,
        },
    );
    let graph = response.graph.unwrap();
    assert_eq!(graph.edges.len(), 1);
    assert_eq!(graph.nodes.len(), 2);
}

#[tokio::test]
async fn missing_sidecar_yields_a_reindex_hint() {
    let state_dir = TempDir::new().unwrap();
    let repo = TempDir::new().unwrap();
    let state = test_state(&state_dir).await;
    let canonical = canonical_of(&repo);

    assert!(state.callgraph.load(&canonical).unwrap().is_none());
    let response = satori::callgraph::query::QueryResponse::missing_sidecar(&canonical);
    assert!(!response.supported);
    assert_eq!(response.reason.as_deref(), Some("missing_sidecar"));
    let hints = response.hints.unwrap();
    assert_eq!(hints["reindex"]["tool"], "manage_index");
    assert_eq!(hints["reindex"]["args"]["action"], "reindex");
}

#[tokio::test]
async fn outline_lists_symbols_and_resolves_exact_selectors() {
    let state_dir = TempDir::new().unwrap();
    let repo = TempDir::new().unwrap();
    write_fixture(repo.path(), &[("app.py", PY_FIXTURE)]);

    let state = test_state(&state_dir).await;
    let canonical = canonical_of(&repo);
    let matcher = state.context.matcher_handle(&canonical).await.unwrap();
    let sidecar = state.callgraph.build(&canonical, matcher).await.unwrap();

    let outline = state
        .callgraph
        .outline(&canonical, "app.py", None, 500, OutlineSelector::All)
        .unwrap();
    assert_eq!(outline.status, OutlineStatus::Ok);
    assert_eq!(outline.entries.len(), 3);
    // Entries are sorted by span
    assert!(outline
        .entries
        .windows(2)
        .all(|w| w[0].span.start <= w[1].span.start));

    let helper_id = &sidecar
        .nodes
        .iter()
        .find(|node| node.symbol_label.as_deref() == Some("def helper(x)"))
        .unwrap()
        .symbol_id;
    let exact = state
        .callgraph
        .outline(
            &canonical,
            "app.py",
            None,
            500,
            OutlineSelector::SymbolId(helper_id),
        )
        .unwrap();
    assert_eq!(exact.status, OutlineStatus::Ok);
    assert_eq!(exact.entries.len(), 1);

    let missing = state
        .callgraph
        .outline(
            &canonical,
            "app.py",
            None,
            500,
            OutlineSelector::SymbolId("sym_does_not_exist"),
        )
        .unwrap();
    assert_eq!(missing.status, OutlineStatus::NotFound);
}

#[tokio::test]
async fn outline_reports_unsupported_and_missing_sidecar() {
    let state_dir = TempDir::new().unwrap();
    let repo = TempDir::new().unwrap();
    let state = test_state(&state_dir).await;
    let canonical = canonical_of(&repo);

    let unsupported = state
        .callgraph
        .outline(&canonical, "main.rs", None, 500, OutlineSelector::All)
        .unwrap();
    assert_eq!(unsupported.status, OutlineStatus::Unsupported);

    let missing = state
        .callgraph
        .outline(&canonical, "app.py", None, 500, OutlineSelector::All)
        .unwrap();
    assert_eq!(missing.status, OutlineStatus::RequiresReindex);
}
