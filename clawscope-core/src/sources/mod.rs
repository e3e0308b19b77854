//! Read-only views of files owned by the OpenClaw runtime
//!
//! Nothing in this module writes under the OpenClaw root. Every reader
//! treats a missing file as "no data yet" and a malformed file as empty
//! plus a warning, so a fresh installation observes cleanly.

pub mod failure_log;
pub mod registry;
pub mod roster;
pub mod session_index;

pub use failure_log::{parse_failure_log, read_failure_logs, FailureEntry, FAILURE_LOG_NAME};
pub use registry::{parse_runs, RunRegistry};
pub use roster::{AgentDescriptor, ModelConfig, Roster};
pub use session_index::SessionIndex;

use std::path::{Path, PathBuf};

/// Well-known locations relative to the OpenClaw root
#[derive(Debug, Clone)]
pub struct OpenClawPaths {
    root: PathBuf,
}

impl OpenClawPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Agent roster (`openclaw.json`)
    pub fn config_file(&self) -> PathBuf {
        self.root.join("openclaw.json")
    }

    pub fn subagents_dir(&self) -> PathBuf {
        self.root.join("subagents")
    }

    /// Run registry (`subagents/runs.json`)
    pub fn runs_file(&self) -> PathBuf {
        self.subagents_dir().join("runs.json")
    }

    pub fn agents_dir(&self) -> PathBuf {
        self.root.join("agents")
    }

    pub fn sessions_dir(&self, agent_id: &str) -> PathBuf {
        self.agents_dir().join(agent_id).join("sessions")
    }

    pub fn dashboard_dir(&self) -> PathBuf {
        self.root.join("dashboard")
    }

    /// Task History journal (`dashboard/task_history.json`)
    pub fn history_file(&self) -> PathBuf {
        self.dashboard_dir().join("task_history.json")
    }

    /// Workspace a stock installation creates for the main agent
    pub fn default_workspace(&self) -> PathBuf {
        self.root.join("workspace-main")
    }

    /// Workspaces named by the roster, or the default workspace when it
    /// names none.
    pub fn workspaces(&self, roster: &Roster) -> Vec<PathBuf> {
        let workspaces = roster.workspaces();
        if workspaces.is_empty() {
            vec![self.default_workspace()]
        } else {
            workspaces
        }
    }
}

/// Expand a leading `~` in a configured path
pub(crate) fn expand_home(raw: &str) -> PathBuf {
    match raw.strip_prefix("~") {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => {
            let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
            home.join(rest.trim_start_matches('/'))
        }
        _ => PathBuf::from(raw),
    }
}
