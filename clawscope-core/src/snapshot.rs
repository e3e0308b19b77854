//! Snapshot assembly: one aggregate view of everything the dashboard shows
//!
//! Assembly reads the roster and the run registry once, then derives every
//! section from those two reads plus the session and failure logs. Each
//! section is computed independently; a section that fails is left out of
//! the snapshot and the others are still delivered.

use crate::analytics::{
    api_statuses, collaboration_graph, performance_stats, ApiStatus, CollaborationGraph,
    PerformanceStats,
};
use crate::config::Config;
use crate::history::TaskHistory;
use crate::projection::{subagent_view, SubagentRun, TaskProjector};
use crate::sources::{read_failure_logs, OpenClawPaths, Roster, RunRegistry};
use crate::status::StatusCalculator;
use crate::types::{AgentStatusRecord, TaskRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// One fully assembled telemetry view
///
/// Missing sections (`None`) failed to assemble; consumers treat every
/// field as optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agents: Option<Vec<AgentStatusRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subagents: Option<Vec<SubagentRun>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_status: Option<Vec<ApiStatus>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collaboration: Option<CollaborationGraph>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<TaskRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance: Option<PerformanceStats>,
    /// Assembly time, epoch milliseconds
    pub timestamp: i64,
}

/// Anything that can produce a snapshot on demand.
///
/// Implementations do blocking file I/O; async callers run them on a
/// blocking thread.
pub trait SnapshotSource: Send + Sync {
    fn assemble(&self) -> TelemetrySnapshot;
}

/// Assembles snapshots from one OpenClaw root
#[derive(Debug, Clone)]
pub struct SnapshotAssembler {
    paths: OpenClawPaths,
    status: StatusCalculator,
    history: TaskHistory,
    range_minutes: u32,
}

impl SnapshotAssembler {
    pub fn new(config: &Config) -> Self {
        let paths = OpenClawPaths::new(config.openclaw.root.clone());
        Self {
            status: StatusCalculator::new(paths.clone(), config.status.clone()),
            history: TaskHistory::new(paths.history_file(), &config.history),
            range_minutes: config.performance.range_minutes,
            paths,
        }
    }

    pub fn paths(&self) -> &OpenClawPaths {
        &self.paths
    }

    /// Current agent roster
    pub fn roster(&self) -> Roster {
        Roster::load(&self.paths.config_file())
    }

    /// Assemble a snapshot as of `now`.
    pub fn assemble_at(&self, now: DateTime<Utc>) -> TelemetrySnapshot {
        let now_ms = now.timestamp_millis();
        let roster = self.roster();
        let runs = RunRegistry::new(self.paths.runs_file()).load();

        let agents = section("agents", || {
            self.status.agent_records(&roster, &runs, now_ms)
        });
        let subagents = section("subagents", || subagent_view(&runs, now_ms));
        let tasks = section("tasks", || {
            let projector = TaskProjector::new(&self.paths, &roster);
            self.history.merge(&runs, |run| projector.project(run))
        });
        let api_status = section("api_status", || {
            api_statuses(&read_failure_logs(&self.paths.workspaces(&roster)), now_ms)
        });
        let collaboration = section("collaboration", || {
            collaboration_graph(&roster, &runs, agents.as_deref().unwrap_or(&[]), now_ms)
        });
        let performance = section("performance", || {
            performance_stats(&self.paths.agents_dir(), now, self.range_minutes)
        });

        let snapshot = TelemetrySnapshot {
            agents,
            subagents,
            api_status,
            collaboration,
            tasks,
            performance,
            timestamp: now_ms,
        };
        tracing::debug!(
            runs = runs.len(),
            agents = snapshot.agents.as_ref().map_or(0, Vec::len),
            tasks = snapshot.tasks.as_ref().map_or(0, Vec::len),
            "Assembled telemetry snapshot"
        );
        snapshot
    }
}

impl SnapshotSource for SnapshotAssembler {
    fn assemble(&self) -> TelemetrySnapshot {
        self.assemble_at(Utc::now())
    }
}

/// Run one snapshot section, turning a panic into a missing section.
fn section<T>(name: &'static str, build: impl FnOnce() -> T) -> Option<T> {
    match catch_unwind(AssertUnwindSafe(build)) {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::error!(section = name, "Snapshot section failed, omitting it");
            None
        }
    }
}
