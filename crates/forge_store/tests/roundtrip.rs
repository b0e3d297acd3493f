//! Save/load round trips for both backends.

use forge_core::{
    ActionGraph, ActionNode, Event, EventType, FlowManager, FnAction, ForgeConfig, IntentMode, NodeStatus, Platform,
    RuntimeConfig, Snapshot, StepRef, StoreBackend,
};
use forge_store::{open_store, JsonFileStore, PersistedState, SqliteStore, StateStore};
use serde_json::json;
use tempfile::TempDir;

async fn sample_state(session: &str, events: usize) -> PersistedState {
    let config = ForgeConfig::default();
    let mut flow = FlowManager::new();
    flow.start(IntentMode::Platform(Platform::Flutter), Some("flutter_todo_app".into()))
        .unwrap();
    flow.next_step(StepRef::new(2, 3, "lib/main.dart"));
    flow.add_todo("lib/app.dart");

    let mut graph = ActionGraph::new();
    graph
        .add(ActionNode::new("file:pubspec.yaml", FnAction::ok("done")).reversible(true))
        .unwrap();
    graph
        .add(ActionNode::new("file:lib/main.dart", FnAction::ok("done")).requires("file:pubspec.yaml"))
        .unwrap();
    graph
        .add(ActionNode::new("file:lib/app.dart", FnAction::ok("done")).requires("file:lib/main.dart"))
        .unwrap();
    graph.execute_all(false).await.unwrap();
    graph.reset("file:lib/app.dart").unwrap();

    let events = (0..events)
        .map(|i| Event::new(EventType::Thought, format!("event {}", i)).with("n", i))
        .collect();
    let snapshot = Snapshot::new("after main", flow.state().clone(), graph.metadata());

    PersistedState::new(
        RuntimeConfig::with_session(session, &config),
        flow.state().clone(),
        graph.metadata(),
    )
    .with_events(events)
    .with_snapshot(Some(snapshot))
    .with_context(json!({ "platform": "flutter" }))
}

async fn assert_round_trip(store: &dyn StateStore) {
    assert!(store.load().unwrap().is_none());

    let state = sample_state("session-1", 10).await;
    store.save(&state).unwrap();
    let loaded = store.load().unwrap().unwrap();

    assert_eq!(loaded.flow, state.flow);
    assert_eq!(loaded.graph, state.graph);
    assert_eq!(loaded.runtime, state.runtime);
    assert_eq!(loaded.events, state.events);
    assert_eq!(loaded.last_snapshot, state.last_snapshot);
    assert_eq!(loaded.context, state.context);
    assert_eq!(loaded.graph.status_of("file:lib/app.dart"), Some(NodeStatus::Pending));
}

async fn assert_event_cap(store: &dyn StateStore, cap: usize) {
    let state = sample_state("session-cap", cap + 25).await;
    store.save(&state).unwrap();
    let loaded = store.load().unwrap().unwrap();
    assert_eq!(loaded.events.len(), cap);
    assert_eq!(loaded.events.last(), state.events.last());
}

async fn assert_restart_and_clear(store: &dyn StateStore) {
    let state = sample_state("session-r", 1).await;
    store.save(&state).unwrap();

    let mut resumed = store.load().unwrap().unwrap();
    resumed.runtime = resumed.runtime.restarted();
    store.save(&resumed).unwrap();
    assert_eq!(store.load().unwrap().unwrap().runtime.restart_count, 1);

    store.clear().unwrap();
    assert!(store.sessions().unwrap().iter().all(|id| id != "session-r"));
}

#[tokio::test]
async fn json_store_round_trip() {
    let temp = TempDir::new().unwrap();
    assert_round_trip(&JsonFileStore::new(temp.path())).await;
}

#[tokio::test]
async fn sqlite_store_round_trip() {
    assert_round_trip(&SqliteStore::in_memory().unwrap()).await;
}

#[tokio::test]
async fn events_are_capped_at_the_tail() {
    let temp = TempDir::new().unwrap();
    assert_event_cap(&JsonFileStore::new(temp.path()).with_events_tail(20), 20).await;
    assert_event_cap(&SqliteStore::in_memory().unwrap().with_events_tail(20), 20).await;
}

#[tokio::test]
async fn restart_count_survives_and_clear_removes_session() {
    let temp = TempDir::new().unwrap();
    assert_restart_and_clear(&JsonFileStore::new(temp.path())).await;
    assert_restart_and_clear(&SqliteStore::in_memory().unwrap()).await;
}

#[tokio::test]
async fn open_store_follows_config() {
    let temp = TempDir::new().unwrap();
    let mut config = ForgeConfig::default();
    config.project_root = temp.path().to_path_buf();

    let json = open_store(&config).unwrap();
    assert_eq!(json.backend(), StoreBackend::Json);

    config.store = StoreBackend::Sqlite;
    let sqlite = open_store(&config).unwrap();
    assert_eq!(sqlite.backend(), StoreBackend::Sqlite);
    sqlite.save(&sample_state("s", 3).await).unwrap();
    assert!(config.sessions_dir().join(forge_store::DB_FILE).exists());
}
