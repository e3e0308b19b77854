//! Integration tests for the clawscope telemetry pipeline
//!
//! These tests build a throwaway OpenClaw root in a temp directory and drive
//! the public API end to end: session log parsing, status, task history,
//! snapshot assembly and the watcher → hand-off → hub delivery path.

use clawscope_core::config::Config;
use clawscope_core::format::now_ms;
use clawscope_core::ingest::{self, SessionLog};
use clawscope_core::sources::OpenClawPaths;
use clawscope_core::types::{AgentStatus, TaskStatus, TriggerKind};
use clawscope_core::watcher::{watch_dirs, FileWatcher, LoopHandoff};
use clawscope_core::{BroadcastHub, SnapshotAssembler, SnapshotSource, StatusCalculator};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Get the path to a fixture file
fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/sessions")
        .join(name)
}

fn config(root: &Path) -> Config {
    let mut config = Config::default();
    config.openclaw.root = root.to_path_buf();
    config
}

/// OpenClaw root with a coordinator and a devops agent
fn openclaw_root() -> (TempDir, OpenClawPaths) {
    let dir = TempDir::new().unwrap();
    let paths = OpenClawPaths::new(dir.path());
    fs::write(
        paths.config_file(),
        r#"{"agents":{"defaults":{"model":"glm-4.7"},"list":[
            {"id":"main","name":"Coordinator"},
            {"id":"devops","name":"DevOps","model":"qwen3-coder"}]}}"#,
    )
    .unwrap();
    fs::create_dir_all(paths.subagents_dir()).unwrap();
    fs::create_dir_all(paths.sessions_dir("devops")).unwrap();
    (dir, paths)
}

fn write_runs(paths: &OpenClawPaths, runs: &str) {
    fs::write(paths.runs_file(), format!(r#"{{"version":2,"runs":{{{runs}}}}}"#)).unwrap();
}

const R1_ACTIVE: &str = r#""r1":{"runId":"r1","childSessionKey":"agent:devops:subagent:u1",
    "task":"deploy build 412 to staging","startedAt":1000,"endedAt":null}"#;
const R1_DONE: &str = r#""r1":{"runId":"r1","childSessionKey":"agent:devops:subagent:u1",
    "task":"deploy build 412 to staging","startedAt":1000,"endedAt":2000,"outcome":"ok"}"#;

// ============================================
// Log Parser
// ============================================

#[test]
fn test_fixture_usage_events_and_triggers() {
    let log = SessionLog::new(fixture_path("mixed.jsonl")).with_agent_id("devops");
    let events: Vec<_> = log.usage_events().collect();

    let ids: Vec<_> = events.iter().map(|e| e.message_id.as_deref().unwrap()).collect();
    assert_eq!(ids, vec!["a1", "a2", "a4"]);
    assert!(events.iter().all(|e| e.session_id == "sess-mixed"));
    assert!(events.iter().all(|e| e.agent_id == "devops"));

    // Missing totalTokens is derived from the parts
    assert_eq!(events[2].tokens_total, 1112);

    let trigger = events[0].trigger.as_ref().unwrap();
    assert_eq!(trigger.kind, TriggerKind::UserMessage);
    assert!(trigger.description.starts_with("user: check the staging"));

    let trigger = events[2].trigger.as_ref().unwrap();
    assert!(matches!(
        &trigger.kind,
        TriggerKind::ToolResult { tool_name, call_message_id }
            if tool_name == "write" && call_message_id.as_deref() == Some("a2")
    ));
    assert!(trigger.description.starts_with("tool: write"));
}

#[test]
fn test_malformed_lines_do_not_disturb_valid_ones() {
    let mixed = fs::read_to_string(fixture_path("mixed.jsonl")).unwrap();
    let clean: String = mixed
        .lines()
        .filter(|line| {
            serde_json::from_str::<serde_json::Value>(line).is_ok_and(|v| v.is_object())
        })
        .map(|line| format!("{line}\n"))
        .collect();

    let dir = TempDir::new().unwrap();
    let sessions = dir.path().join("agents/devops/sessions");
    fs::create_dir_all(&sessions).unwrap();
    fs::write(sessions.join("mixed.jsonl"), &mixed).unwrap();
    fs::write(sessions.join("clean.jsonl"), &clean).unwrap();

    let from_mixed: Vec<_> = SessionLog::new(sessions.join("mixed.jsonl"))
        .usage_events()
        .collect();
    let from_clean: Vec<_> = SessionLog::new(sessions.join("clean.jsonl"))
        .usage_events()
        .collect();

    assert_eq!(from_mixed.len(), 3);
    assert_eq!(from_mixed, from_clean);
}

#[test]
fn test_usage_event_count_matches_assistant_usage_lines() {
    let dir = TempDir::new().unwrap();

    for (turns, with_usage_every) in [(0, 1), (1, 1), (7, 2), (25, 3)] {
        let mut lines = vec![r#"{"type":"session","id":"s"}"#.to_string()];
        let mut expected = 0;
        let mut parent = "null".to_string();
        for i in 0..turns {
            lines.push(format!(
                r#"{{"type":"message","id":"u{i}","parentId":{parent},"timestamp":"2026-03-01T10:00:00Z","message":{{"role":"user","content":"step {i}"}}}}"#
            ));
            let usage = if i % with_usage_every == 0 {
                expected += 1;
                r#","usage":{"input":10,"output":2,"totalTokens":12}"#
            } else {
                ""
            };
            lines.push(format!(
                r#"{{"type":"message","id":"a{i}","parentId":"u{i}","timestamp":"2026-03-01T10:00:01Z","message":{{"role":"assistant","content":"ok"{usage}}}}}"#
            ));
            parent = format!(r#""a{i}""#);
        }

        let path = dir.path().join(format!("turns-{turns}.jsonl"));
        fs::write(&path, lines.join("\n")).unwrap();
        let events: Vec<_> = SessionLog::new(&path).usage_events().collect();
        assert_eq!(events.len(), expected, "{turns} turns");
        assert!(events.iter().all(|e| e.tokens_total == 12));
    }
}

#[test]
fn test_fixture_generated_files() {
    assert_eq!(
        ingest::generated_files(&fixture_path("mixed.jsonl")),
        vec!["reports/staging.md".to_string()]
    );
}

// ============================================
// Status, history and snapshot end to end
// ============================================

#[test]
fn test_run_lifecycle_end_to_end() {
    let (dir, paths) = openclaw_root();
    let config = config(dir.path());
    let status = StatusCalculator::new(paths.clone(), config.status.clone());
    let assembler = SnapshotAssembler::new(&config);

    // Active run: devops is working, the task is running at 50%
    write_runs(&paths, R1_ACTIVE);
    assert_eq!(status.status("devops"), AgentStatus::Working);
    let tasks = assembler.assemble().tasks.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, TaskStatus::Running);
    assert_eq!(tasks[0].progress, 50);
    assert!(!paths.history_file().exists());

    // Completed: the task is done and journaled
    write_runs(&paths, R1_DONE);
    assert_eq!(status.status("devops"), AgentStatus::Idle);
    let tasks = assembler.assemble().tasks.unwrap();
    assert_eq!(tasks[0].status, TaskStatus::Completed);
    assert_eq!(tasks[0].progress, 100);
    assert!(paths.history_file().exists());

    // Registry emptied upstream: the journal still has it
    write_runs(&paths, "");
    let tasks = assembler.assemble().tasks.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, "r1");
    assert_eq!(tasks[0].status, TaskStatus::Completed);
    assert_eq!(tasks[0].end_time, Some(2000));
    assert_eq!(tasks[0].agent_name, "DevOps");
}

#[test]
fn test_repeated_assembly_keeps_history_stable() {
    let (dir, paths) = openclaw_root();
    let assembler = SnapshotAssembler::new(&config(dir.path()));
    write_runs(&paths, R1_DONE);

    for _ in 0..3 {
        assert_eq!(assembler.assemble().tasks.unwrap().len(), 1);
    }
    let journal: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(paths.history_file()).unwrap()).unwrap();
    assert_eq!(journal["tasks"].as_array().unwrap().len(), 1);
}

#[test]
fn test_recent_error_overrides_active_run() {
    let (dir, paths) = openclaw_root();
    let config = config(dir.path());
    write_runs(&paths, R1_ACTIVE);
    fs::write(
        paths.sessions_dir("devops").join("s1.jsonl"),
        format!(
            r#"{{"type":"message","id":"a1","timestamp":"2026-03-01T10:00:00Z","message":{{"role":"assistant","content":"","stopReason":"error","errorMessage":"429 rate limit exceeded","timestamp":{}}}}}"#,
            now_ms() - 1000
        ),
    )
    .unwrap();

    let status = StatusCalculator::new(paths.clone(), config.status.clone());
    assert_eq!(status.status("devops"), AgentStatus::Down);

    let agents = SnapshotAssembler::new(&config).assemble().agents.unwrap();
    let devops = agents.iter().find(|a| a.id == "devops").unwrap();
    assert_eq!(devops.status, AgentStatus::Down);
    assert!(devops.error.is_some());
    assert!(agents.iter().all(|a| a.id != "unknown"));
}

#[test]
fn test_snapshot_failure_log_and_graph() {
    let (dir, paths) = openclaw_root();
    let workspace = dir.path().join("workspace-devops");
    fs::create_dir_all(workspace.join("memory")).unwrap();
    fs::write(
        paths.config_file(),
        format!(
            r#"{{"agents":{{"list":[{{"id":"main"}},{{"id":"devops","workspace":"{}","model":"glm-4.7"}}]}}}}"#,
            workspace.display()
        ),
    )
    .unwrap();
    fs::write(
        workspace.join("memory/model-failures.log"),
        "## 2026-03-01 10:00:00\nmodel: glm-4.7\nerror: 429 rate limit\n",
    )
    .unwrap();
    write_runs(&paths, R1_ACTIVE);

    let snapshot = SnapshotAssembler::new(&config(dir.path())).assemble();
    let api = snapshot.api_status.unwrap();
    assert_eq!(api.len(), 1);
    assert_eq!(api[0].model, "glm-4.7");
    assert_eq!(api[0].provider, "zhipu");

    let graph = snapshot.collaboration.unwrap();
    assert_eq!(graph.active_path, vec!["main", "devops", "task-r1"]);
}

// ============================================
// Watcher → hand-off → hub
// ============================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_file_change_reaches_subscriber() {
    clawscope_core::logging::init_test();
    let (dir, paths) = openclaw_root();
    let config = config(dir.path());
    let assembler = Arc::new(SnapshotAssembler::new(&config));
    let hub = BroadcastHub::with_intervals(
        assembler.clone(),
        Duration::from_secs(3600),
        Duration::from_secs(1),
    );

    let (handoff, receiver) = LoopHandoff::channel(Duration::from_secs(10));
    let refresh_hub = Arc::clone(&hub);
    tokio::spawn(receiver.serve(move || {
        let hub = Arc::clone(&refresh_hub);
        async move {
            hub.broadcast_full_state().await;
        }
    }));

    let dirs = watch_dirs(&paths, &assembler.roster());
    assert!(!dirs.is_empty());
    let mut watcher_config = config.watcher.clone();
    watcher_config.debounce_ms = 50;
    let watcher = FileWatcher::start(&dirs, &watcher_config, move || {
        let _ = handoff.submit();
    })
    .unwrap()
    .unwrap();

    let (tx, mut rx) = tokio::sync::mpsc::channel(16);
    let _sub = hub.register(tx).await.unwrap();
    let initial: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
    assert_eq!(initial["type"], "full_state");
    assert_eq!(initial["data"]["tasks"], serde_json::json!([]));

    write_runs(&paths, R1_ACTIVE);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    let mut saw_run = false;
    while !saw_run {
        let text = tokio::time::timeout_at(deadline, rx.recv())
            .await
            .expect("no refresh after file change")
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        saw_run = value["data"]["tasks"][0]["id"] == "r1";
    }

    hub.shutdown();
    tokio::task::spawn_blocking(move || watcher.stop()).await.unwrap();
}
