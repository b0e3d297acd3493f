//! End-to-end scenarios through `Orchestrator::run` with instant pacing and
//! a scripted tool runner. The model router is offline unless a scenario
//! scripts the model with `ScriptedProvider`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use forge_core::{
    ActionGraph, ActionNode, CancellationToken, ControlMode, CoreError, Event, EventScope, EventType, FnAction,
    ForgeConfig, NodeStatus, Pacer, SecurityLevel,
};
use forge_kernel::{KernelError, Orchestrator, RunOutcome, Runtime, OFFLINE_REPLY};
use forge_llm::{ModelRouter, ProviderRegistry, ScriptedProvider};
use forge_runner::{CommandSpec, ExecOutput, LineStream, MockResponse, MockToolRunner, RunnerResult, StreamLine, ToolRunner};
use tempfile::TempDir;

const TODO_TURN: &str = "create flutter todo app";
const FLUTTER_FILES: [&str; 3] = ["pubspec.yaml", "lib/main.dart", "lib/app.dart"];

fn config(root: &Path) -> ForgeConfig {
    let mut config = ForgeConfig::new(root);
    config.typing_speed = 0.0;
    config
}

fn runtime(config: ForgeConfig, runner: Arc<dyn ToolRunner>) -> Runtime {
    Runtime::builder(config)
        .with_router(ModelRouter::new(ProviderRegistry::with_default_catalog()))
        .with_runner(runner)
        .build()
        .unwrap()
}

fn orchestrator(root: &Path, runner: &MockToolRunner) -> Orchestrator {
    Orchestrator::new(runtime(config(root), Arc::new(runner.clone())))
}

fn scripted_runtime(config: ForgeConfig, provider: &ScriptedProvider, runner: &MockToolRunner) -> Runtime {
    Runtime::builder(config)
        .with_router(ModelRouter::new(ProviderRegistry::scripted(Arc::new(provider.clone()))))
        .with_runner(Arc::new(runner.clone()))
        .build()
        .unwrap()
}

const MAIN_DART: &str = "void main() {\n  final counts = {'done': 1};\n  print('done: ${counts['done']}');\n}\n";
const BROKEN_DART: &str = "void main() {\n  print('unclosed';\n";

/// Answers the planning, file and fix prompts of a two-file Flutter app.
fn flutter_model(main_dart: &'static str, fixed_dart: &'static str) -> ScriptedProvider {
    ScriptedProvider::new(move |req| {
        let system = req.system();
        if system.contains("plan the files") {
            return r#"["lib/main.dart", "pubspec.yaml"]"#.to_string();
        }
        // File and fix prompts quote the path first.
        let path = req.last_user().split('`').nth(1).unwrap_or_default();
        let (language, body) = match path {
            "pubspec.yaml" => ("yaml", "name: flutter_todo_app\n"),
            _ if system.contains("fixing") => ("dart", fixed_dart),
            _ => ("dart", main_dart),
        };
        format!("```{} {}\n{}```", language, path, body)
    })
}

fn main_dart_on_disk(root: &Path) -> String {
    std::fs::read_to_string(root.join("flutter_todo_app/lib/main.dart")).unwrap()
}

/// Index of the first `event_type` event about `lib/main.dart` at or after `from`.
fn main_dart_event(history: &[Event], event_type: EventType, from: usize) -> usize {
    history
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, e)| {
            e.event_type == event_type
                && e.path().or_else(|| e.get("file").and_then(|v| v.as_str())) == Some("lib/main.dart")
        })
        .map(|(i, _)| i)
        .unwrap_or_else(|| panic!("no {:?} for lib/main.dart after {}", event_type, from))
}

fn public_events(orchestrator: &Orchestrator) -> Vec<Event> {
    orchestrator
        .runtime()
        .bus()
        .history()
        .into_iter()
        .filter(|e| e.scope == EventScope::Public)
        .collect()
}

fn events_since(orchestrator: &Orchestrator, seq: u64) -> Vec<Event> {
    orchestrator
        .runtime()
        .bus()
        .history()
        .into_iter()
        .filter(|e| e.seq > seq)
        .collect()
}

fn last_public(orchestrator: &Orchestrator) -> Event {
    public_events(orchestrator).pop().unwrap()
}

/// Cancels the run as soon as the first character has been written.
struct CancellingPacer(CancellationToken);

impl Pacer for CancellingPacer {
    fn delay_for(&self, _c: char) -> Duration {
        self.0.cancel();
        Duration::ZERO
    }
}

#[tokio::test]
async fn dialog_turn_streams_thoughts_then_done() {
    let temp = TempDir::new().unwrap();
    let mut orchestrator = orchestrator(temp.path(), &MockToolRunner::new());

    let outcome = orchestrator.run("hello", None, &CancellationToken::new()).await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Dialog {
            reply: OFFLINE_REPLY.to_string()
        }
    );
    let events = public_events(&orchestrator);
    let thoughts: Vec<&Event> = events.iter().filter(|e| e.event_type == EventType::Thought).collect();
    assert!(!thoughts.is_empty());
    assert!(thoughts.iter().all(|e| !e.message.is_empty()));
    assert!(events.iter().all(|e| e.path().is_none()));
    assert_eq!(last_public(&orchestrator).event_type, EventType::Done);
    assert!(orchestrator.graph().is_empty());
}

#[tokio::test]
async fn flutter_project_falls_back_to_the_default_plan() {
    let temp = TempDir::new().unwrap();
    let runner = MockToolRunner::new();
    let provider = ScriptedProvider::unreachable();
    let mut orchestrator = Orchestrator::new(scripted_runtime(config(temp.path()), &provider, &runner));

    let outcome = orchestrator.run(TODO_TURN, None, &CancellationToken::new()).await.unwrap();

    // The planner asked the model and fell back when it could not be reached.
    assert!(provider.requests().iter().any(|r| !r.streaming));
    let plan = orchestrator.runtime().bus().events_of(EventType::Plan);
    assert_eq!(plan[0].get("source").unwrap(), "fallback");

    let RunOutcome::Completed { project, files } = outcome else {
        panic!("unexpected outcome: {:?}", outcome);
    };
    assert_eq!(project, "flutter_todo_app");
    assert!(files >= FLUTTER_FILES.len());

    let bus = orchestrator.runtime().bus();
    let announced: Vec<String> = bus
        .events_of(EventType::FileAnnounced)
        .iter()
        .filter_map(|e| e.path().map(String::from))
        .collect();
    assert_eq!(&announced[..3], &FLUTTER_FILES);
    let created = bus.events_of(EventType::FileCreated);
    assert_eq!(created.len(), announced.len());

    let project_dir = temp.path().join("flutter_todo_app");
    for file in FLUTTER_FILES {
        assert!(project_dir.join(file).exists(), "{} missing", file);
    }
    assert_eq!(runner.count_matching("flutter pub get"), 1);
    assert_eq!(runner.count_matching("flutter build web"), 1);
    assert_eq!(last_public(&orchestrator).event_type, EventType::Done);
    assert!(!orchestrator.flow().active);
}

#[tokio::test]
async fn second_run_preserves_existing_files() {
    let temp = TempDir::new().unwrap();
    let mut orchestrator = orchestrator(temp.path(), &MockToolRunner::new());
    orchestrator.run(TODO_TURN, None, &CancellationToken::new()).await.unwrap();

    let project_dir = temp.path().join("flutter_todo_app");
    let long_files: Vec<String> = orchestrator
        .plan()
        .unwrap()
        .paths()
        .into_iter()
        .filter(|p| std::fs::read_to_string(project_dir.join(p)).map_or(false, |c| c.chars().count() > 100))
        .map(String::from)
        .collect();
    assert!(!long_files.is_empty());

    let mark = orchestrator.runtime().bus().last_seq();
    orchestrator.run(TODO_TURN, None, &CancellationToken::new()).await.unwrap();
    let second = events_since(&orchestrator, mark);

    for file in &long_files {
        let for_file: Vec<&Event> = second.iter().filter(|e| e.path() == Some(file.as_str())).collect();
        assert!(for_file
            .iter()
            .all(|e| e.event_type != EventType::CodeStreamingStarted && e.event_type != EventType::FileCreated));
        assert_eq!(
            for_file
                .iter()
                .filter(|e| e.scope == EventScope::Internal && e.flag("preserved"))
                .count(),
            1,
            "{} should be skipped once",
            file
        );
    }
    assert_eq!(second.iter().filter(|e| e.scope == EventScope::Public).last().unwrap().event_type, EventType::Done);
}

#[tokio::test]
async fn cancel_mid_stream_aborts_and_persists() {
    let temp = TempDir::new().unwrap();
    let cancel = CancellationToken::new();
    let runtime = Runtime::builder(config(temp.path()))
        .with_router(ModelRouter::new(ProviderRegistry::with_default_catalog()))
        .with_runner(Arc::new(MockToolRunner::new()))
        .with_pacer(Arc::new(CancellingPacer(cancel.clone())))
        .build()
        .unwrap();
    let mut orchestrator = Orchestrator::new(runtime);

    let outcome = orchestrator.run(TODO_TURN, None, &cancel).await.unwrap();
    assert_eq!(outcome, RunOutcome::Cancelled);

    let events = public_events(&orchestrator);
    let completes: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.event_type == EventType::CodeStreamingComplete)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(completes.len(), 1);
    assert!(events[completes[0]].flag("cancelled"));

    let last = events.last().unwrap();
    assert_eq!(last.event_type, EventType::Error);
    assert!(last.flag("cancelled"));
    assert_eq!(completes[0], events.len() - 2);
    assert!(!orchestrator.flow().active);
    assert!(orchestrator.runtime().bus().events_of(EventType::FileCreated).is_empty());

    let saved = orchestrator.runtime().store().load().unwrap().unwrap();
    let snapshot = saved.last_snapshot.unwrap();
    assert_eq!(snapshot.description, "cancelled");
    assert!(snapshot.flow_state.active);
    assert_eq!(
        snapshot.graph_metadata.status_of("file:pubspec.yaml"),
        Some(NodeStatus::Failed)
    );
    assert_eq!(saved.graph.status_of("file:lib/main.dart"), Some(NodeStatus::Pending));
}

#[tokio::test]
async fn build_error_is_fixed_by_regenerating_the_file() {
    let temp = TempDir::new().unwrap();
    let runner = MockToolRunner::new()
        .respond(
            "flutter build",
            MockResponse::failure(1, "lib/main.dart:10:5: missing semicolon"),
        )
        .respond("flutter build", MockResponse::success("Built build/web"));
    let mut orchestrator = orchestrator(temp.path(), &runner);

    let outcome = orchestrator.run(TODO_TURN, None, &CancellationToken::new()).await.unwrap();
    assert!(matches!(outcome, RunOutcome::Completed { .. }));

    let bus = orchestrator.runtime().bus();
    let detected = bus
        .events_of(EventType::ErrorDetected)
        .into_iter()
        .find(|e| e.scope == EventScope::Public)
        .unwrap();
    assert_eq!(detected.get("type").unwrap(), "syntax");
    assert!(detected.flag("auto_fixable"));
    assert_eq!(detected.get("file").unwrap(), "lib/main.dart");
    assert_eq!(detected.get("line").unwrap(), 10);

    let history = bus.history();
    let position = |t: EventType| history.iter().position(|e| e.event_type == t).unwrap();
    assert!(position(EventType::ErrorDetected) < position(EventType::ErrorFixStarted));
    assert!(position(EventType::ErrorFixStarted) < position(EventType::FileModified));
    assert!(position(EventType::FileModified) < position(EventType::ErrorFixed));
    assert_eq!(
        bus.events_of(EventType::FileModified)[0].path(),
        Some("lib/main.dart")
    );
    assert_eq!(runner.count_matching("flutter build"), 2);
    assert_eq!(last_public(&orchestrator).event_type, EventType::Done);
    assert!(bus.events_of(EventType::Error).is_empty());
}

#[tokio::test]
async fn online_run_writes_the_model_plan_and_code() {
    let temp = TempDir::new().unwrap();
    let runner = MockToolRunner::new();
    let provider = flutter_model(MAIN_DART, MAIN_DART);
    let mut orchestrator = Orchestrator::new(scripted_runtime(config(temp.path()), &provider, &runner));

    let outcome = orchestrator.run(TODO_TURN, None, &CancellationToken::new()).await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Completed {
            project: "flutter_todo_app".into(),
            files: 2
        }
    );
    let bus = orchestrator.runtime().bus();
    assert_eq!(bus.events_of(EventType::Plan)[0].get("source").unwrap(), "model");
    assert_eq!(main_dart_on_disk(temp.path()).trim_end(), MAIN_DART.trim_end());
    assert!(bus.events_of(EventType::ErrorDetected).is_empty());

    // One planning call, then one streamed call per file.
    let requests = provider.requests();
    assert!(!requests[0].streaming);
    assert_eq!(requests.iter().filter(|r| r.streaming).count(), 2);
    assert_eq!(runner.count_matching("flutter build web"), 1);
    assert_eq!(last_public(&orchestrator).event_type, EventType::Done);
}

#[tokio::test]
async fn cancel_while_the_model_streams_stops_promptly() {
    let temp = TempDir::new().unwrap();
    let provider = flutter_model(MAIN_DART, MAIN_DART)
        .with_chunk_size(1)
        .with_chunk_delay(Duration::from_millis(100));
    let mut orchestrator = Orchestrator::new(scripted_runtime(config(temp.path()), &provider, &MockToolRunner::new()));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    // Draining the first reply alone would take several seconds.
    let outcome = tokio::time::timeout(Duration::from_secs(2), orchestrator.run(TODO_TURN, None, &cancel))
        .await
        .expect("run should stop soon after cancel")
        .unwrap();

    assert_eq!(outcome, RunOutcome::Cancelled);
    let bus = orchestrator.runtime().bus();
    assert!(bus.events_of(EventType::CodeStreamingStarted).is_empty());
    assert!(bus.events_of(EventType::FileCreated).is_empty());
    assert!(last_public(&orchestrator).flag("cancelled"));
    assert!(!temp.path().join("flutter_todo_app/pubspec.yaml").exists());
}

#[tokio::test]
async fn invalid_model_output_is_repaired_in_order() {
    let temp = TempDir::new().unwrap();
    let runner = MockToolRunner::new();
    let provider = flutter_model(BROKEN_DART, MAIN_DART);
    let mut orchestrator = Orchestrator::new(scripted_runtime(config(temp.path()), &provider, &runner));

    let outcome = orchestrator.run(TODO_TURN, None, &CancellationToken::new()).await.unwrap();

    assert!(matches!(outcome, RunOutcome::Completed { files: 2, .. }));
    let history = orchestrator.runtime().bus().history();
    let created = main_dart_event(&history, EventType::FileCreated, 0);
    let detected = main_dart_event(&history, EventType::ErrorDetected, created);
    let started = main_dart_event(&history, EventType::ErrorFixStarted, detected);
    let modified = main_dart_event(&history, EventType::FileModified, started);
    main_dart_event(&history, EventType::ErrorFixed, modified);
    assert_eq!(orchestrator.runtime().bus().events_of(EventType::ErrorFixStarted).len(), 1);
    assert_eq!(main_dart_on_disk(temp.path()).trim_end(), MAIN_DART.trim_end());
    assert_eq!(runner.count_matching("flutter build web"), 1);
}

#[tokio::test]
async fn unrepairable_model_output_fails_the_flow() {
    let temp = TempDir::new().unwrap();
    let runner = MockToolRunner::new();
    let mut config = config(temp.path());
    config.max_retries = 2;
    let provider = flutter_model(BROKEN_DART, BROKEN_DART);
    let mut orchestrator = Orchestrator::new(scripted_runtime(config, &provider, &runner));

    let err = orchestrator.run(TODO_TURN, None, &CancellationToken::new()).await.unwrap_err();

    let KernelError::FlowFailed { node, .. } = err else {
        panic!("unexpected error: {:?}", err);
    };
    assert_eq!(node, "file:lib/main.dart");
    let bus = orchestrator.runtime().bus();
    assert_eq!(bus.events_of(EventType::ErrorFixStarted).len(), 2);
    assert!(bus.events_of(EventType::ErrorFixed).is_empty());
    assert_eq!(runner.count_matching("flutter build"), 0);
    let last = last_public(&orchestrator);
    assert_eq!(last.event_type, EventType::Error);
    assert!(!last.flag("cancelled"));
}

#[tokio::test]
async fn rewrite_that_is_still_broken_is_not_reported_fixed() {
    let temp = TempDir::new().unwrap();
    let runner = MockToolRunner::new()
        .respond(
            "flutter build",
            MockResponse::failure(1, "lib/main.dart:2:3: missing semicolon"),
        )
        .respond("flutter build", MockResponse::success("Built build/web"));
    let provider = flutter_model(MAIN_DART, BROKEN_DART);
    let mut orchestrator = Orchestrator::new(scripted_runtime(config(temp.path()), &provider, &runner));

    let err = orchestrator.run(TODO_TURN, None, &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, KernelError::FlowFailed { .. }));
    let bus = orchestrator.runtime().bus();
    assert_eq!(bus.events_of(EventType::ErrorFixStarted).len(), 1);
    assert!(bus.events_of(EventType::ErrorFixed).is_empty());

    // What the rewrite left behind is reported after it lands.
    let history = bus.history();
    let modified = main_dart_event(&history, EventType::FileModified, 0);
    main_dart_event(&history, EventType::ErrorDetected, modified);
    assert_eq!(runner.count_matching("flutter build"), 1);
}

#[tokio::test]
async fn cyclic_graph_is_rejected_before_running() {
    let temp = TempDir::new().unwrap();
    let orchestrator = orchestrator(temp.path(), &MockToolRunner::new());
    let mut graph = ActionGraph::new();
    graph.add(ActionNode::new("A", FnAction::ok("a")).requires("B")).unwrap();
    graph.add(ActionNode::new("B", FnAction::ok("b")).requires("A")).unwrap();

    let err = graph.execute_all(false).await.unwrap_err();

    assert!(matches!(err, CoreError::CycleDetected { .. }));
    assert_eq!(graph.count(NodeStatus::Pending), 2);
    assert!(orchestrator.runtime().bus().history().is_empty());
}

#[tokio::test]
async fn resume_runs_what_the_cancelled_session_left() {
    let temp = TempDir::new().unwrap();
    let cancel = CancellationToken::new();
    let first = Runtime::builder(config(temp.path()))
        .with_router(ModelRouter::new(ProviderRegistry::with_default_catalog()))
        .with_runner(Arc::new(MockToolRunner::new()))
        .with_pacer(Arc::new(CancellingPacer(cancel.clone())))
        .build()
        .unwrap();
    let mut orchestrator = Orchestrator::new(first);
    orchestrator.run(TODO_TURN, None, &cancel).await.unwrap();
    let session_id = orchestrator.session().session_id.clone();
    drop(orchestrator);

    let runner = MockToolRunner::new();
    let mut resumed = Orchestrator::resume(runtime(config(temp.path()), Arc::new(runner.clone())))
        .unwrap()
        .unwrap();
    assert_eq!(resumed.session().session_id, session_id);
    assert_eq!(resumed.session().restart_count, 1);
    assert_eq!(resumed.plan().unwrap().project_name, "flutter_todo_app");

    let outcome = resumed.run_remaining(&CancellationToken::new()).await.unwrap();
    assert!(matches!(outcome, RunOutcome::Completed { .. }));
    assert_eq!(resumed.graph().count(NodeStatus::Pending), 0);
    assert!(temp.path().join("flutter_todo_app/pubspec.yaml").exists());
    assert_eq!(runner.count_matching("flutter build web"), 1);
}

#[tokio::test]
async fn resume_without_saved_state_returns_none() {
    let temp = TempDir::new().unwrap();
    let resumed = Orchestrator::resume(runtime(config(temp.path()), Arc::new(MockToolRunner::new()))).unwrap();
    assert!(resumed.is_none());
}

#[tokio::test]
async fn fix_mode_applies_the_arbitrated_agent() {
    let temp = TempDir::new().unwrap();
    let runner = MockToolRunner::new()
        .respond("flutter build", MockResponse::success("Built"))
        .respond(
            "flutter build",
            MockResponse::failure(1, "lib/main.dart:3:1: Expected ';' after this."),
        )
        .respond("flutter build", MockResponse::success("Built"));
    let mut orchestrator = orchestrator(temp.path(), &runner);
    orchestrator.run(TODO_TURN, None, &CancellationToken::new()).await.unwrap();

    let outcome = orchestrator
        .run("fix the build errors", None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Fixed {
            agent: "file_regenerator".into(),
            attempts: 1
        }
    );
    let decisions = orchestrator.runtime().bus().events_of(EventType::Decision);
    let decision = decisions.iter().find(|e| e.scope == EventScope::Public).unwrap();
    assert_eq!(decision.get("agent").unwrap(), "file_regenerator");
    assert_eq!(runner.count_matching("flutter build"), 3);
}

#[tokio::test]
async fn supervised_fix_waits_for_a_human() {
    let temp = TempDir::new().unwrap();
    let runner = MockToolRunner::new()
        .respond("flutter build", MockResponse::success("Built"))
        .respond(
            "flutter build",
            MockResponse::failure(1, "lib/main.dart:3:1: Expected ';' after this."),
        );
    let mut config = config(temp.path());
    config.control_mode = ControlMode::Supervised;
    let mut orchestrator = Orchestrator::new(runtime(config, Arc::new(runner.clone())));
    orchestrator.run(TODO_TURN, None, &CancellationToken::new()).await.unwrap();

    let outcome = orchestrator.run("fix it", None, &CancellationToken::new()).await.unwrap();

    let RunOutcome::AwaitingHuman { decision } = outcome else {
        panic!("unexpected outcome: {:?}", outcome);
    };
    assert_eq!(decision.agent, "file_regenerator");
    assert_eq!(runner.count_matching("flutter build"), 2);
    assert!(!orchestrator.flow().active);
}

#[tokio::test]
async fn fix_without_a_project_is_an_intent_error() {
    let temp = TempDir::new().unwrap();
    let mut orchestrator = orchestrator(temp.path(), &MockToolRunner::new());

    let err = orchestrator.run("fix the bug", None, &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, KernelError::NoProject));
    let last = last_public(&orchestrator);
    assert_eq!(last.event_type, EventType::Error);
    assert!(!last.flag("cancelled"));
}

#[tokio::test]
async fn strict_terminal_blocks_unknown_programs() {
    let temp = TempDir::new().unwrap();
    let runner = MockToolRunner::new();
    let mut config = config(temp.path());
    config.security_level = SecurityLevel::Strict;
    let mut orchestrator = Orchestrator::new(runtime(config, Arc::new(runner.clone())));

    let err = orchestrator
        .run("run curl https://example.com", None, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, KernelError::Security { .. }));
    assert_eq!(runner.call_count(), 0);
    assert_eq!(last_public(&orchestrator).event_type, EventType::Error);
}

#[tokio::test]
async fn terminal_turn_streams_output() {
    let temp = TempDir::new().unwrap();
    let runner = MockToolRunner::new().respond("ls -la", MockResponse::success("README.md\nlib"));
    let mut orchestrator = orchestrator(temp.path(), &runner);

    let outcome = orchestrator.run("run ls -la", None, &CancellationToken::new()).await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Executed {
            command: "ls -la".into(),
            exit_code: 0
        }
    );
    let lines: Vec<String> = orchestrator
        .runtime()
        .bus()
        .events_of(EventType::TerminalOutput)
        .iter()
        .map(|e| e.message.clone())
        .collect();
    assert_eq!(lines, vec!["README.md", "lib"]);
    assert_eq!(last_public(&orchestrator).event_type, EventType::Done);
}

mockall::mock! {
    pub Runner {}

    #[async_trait]
    impl ToolRunner for Runner {
        async fn exec(&self, spec: &CommandSpec) -> RunnerResult<ExecOutput>;
        async fn exec_stream(&self, spec: &CommandSpec) -> RunnerResult<LineStream>;
    }
}

#[tokio::test]
async fn git_status_goes_through_the_tool_runner() {
    let temp = TempDir::new().unwrap();
    let mut runner = MockRunner::new();
    runner
        .expect_exec_stream()
        .withf(|spec| spec.command == "git status --short")
        .times(1)
        .returning(|_| {
            let lines: LineStream = Box::pin(futures::stream::iter(vec![
                StreamLine::Stdout(" M lib/main.dart".into()),
                StreamLine::Exit(0),
            ]));
            Ok(lines)
        });
    runner.expect_exec().never();
    let mut orchestrator = Orchestrator::new(runtime(config(temp.path()), Arc::new(runner)));

    let outcome = orchestrator.run("git status", None, &CancellationToken::new()).await.unwrap();

    assert!(matches!(outcome, RunOutcome::Executed { exit_code: 0, .. }));
    let git = orchestrator.runtime().bus().events_of(EventType::Git);
    assert_eq!(git.len(), 1);
    assert_eq!(git[0].message, " M lib/main.dart");
}
