use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    openclaw: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let openclaw = home.join(".openclaw");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        seed_openclaw_fixture(&openclaw);

        Self {
            _temp_dir: temp_dir,
            home,
            openclaw,
            xdg_config,
            xdg_state,
        }
    }
}

fn seed_openclaw_fixture(root: &Path) {
    let sessions = root.join("agents/devops/sessions");
    fs::create_dir_all(&sessions).expect("failed to create session directory");
    fs::create_dir_all(root.join("subagents")).expect("failed to create subagents directory");

    fs::write(
        root.join("openclaw.json"),
        r#"{"agents":{"list":[{"id":"main","name":"Coordinator"},{"id":"devops","name":"DevOps"}]}}"#,
    )
    .expect("failed to write roster");
    fs::write(
        root.join("subagents/runs.json"),
        r#"{"version":2,"runs":{"r1":{"runId":"r1","childSessionKey":"agent:devops:subagent:u1",
            "task":"rotate certificates","startedAt":1000,"endedAt":null}}}"#,
    )
    .expect("failed to write run registry");

    let source = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../clawscope-core/tests/fixtures/sessions/mixed.jsonl");
    fs::copy(source, sessions.join("mixed.jsonl")).expect("failed to copy session fixture");
}

fn run_bin(env: &CliTestEnv, args: &[&str]) -> Output {
    let mut command = Command::new(PathBuf::from(assert_cmd::cargo::cargo_bin!("clawscope")));

    command
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .output()
        .unwrap_or_else(|e| panic!("failed to execute clawscope: {e}"))
}

fn assert_success(args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    panic!(
        "clawscope {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

#[test]
fn snapshot_reads_default_openclaw_root() {
    let env = CliTestEnv::new();

    let output = run_bin(&env, &["--snapshot"]);
    assert_success(&["--snapshot"], &output);

    let snapshot: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("snapshot should be JSON");

    let agents = snapshot["agents"].as_array().expect("agents array");
    assert_eq!(agents.len(), 2);
    let devops = agents
        .iter()
        .find(|a| a["id"] == "devops")
        .expect("devops agent");
    assert_eq!(devops["status"], "working");

    assert_eq!(snapshot["tasks"][0]["id"], "r1");
    assert_eq!(snapshot["tasks"][0]["status"], "running");
    assert_eq!(snapshot["collaboration"]["mainAgentId"], "main");
    assert!(
        env.xdg_state.join("clawscope").is_dir(),
        "log directory should be created under XDG_STATE_HOME"
    );
}

#[test]
fn snapshot_honours_root_override_and_config_file() {
    let env = CliTestEnv::new();
    let moved = env.home.join("elsewhere");
    fs::rename(&env.openclaw, &moved).expect("failed to move fixture");

    let config_path = env.xdg_config.join("custom.toml");
    fs::write(&config_path, "[history]\nresult_cap = 5\njournal_cap = 10\n")
        .expect("failed to write config");

    let root = moved.to_string_lossy().into_owned();
    let config = config_path.to_string_lossy().into_owned();
    let args = ["--config", config.as_str(), "--root", root.as_str(), "--snapshot"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let snapshot: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("snapshot should be JSON");
    assert_eq!(snapshot["agents"].as_array().map(Vec::len), Some(2));
}

#[test]
fn invalid_config_is_rejected() {
    let env = CliTestEnv::new();
    let config_path = env.xdg_config.join("bad.toml");
    fs::write(&config_path, "[watcher]\ndebounce_ms = 0\n").expect("failed to write config");

    let config = config_path.to_string_lossy().into_owned();
    let output = run_bin(&env, &["--config", config.as_str(), "--snapshot"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("failed to load configuration"),
        "expected a configuration error, got:\n{stderr}"
    );
}
