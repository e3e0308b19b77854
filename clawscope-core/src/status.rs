//! Status Calculator: derive `idle`/`working`/`down` per agent
//!
//! Status is never stored. Each query re-reads the agent's newest session
//! log and, when needed, the run registry.
//!
//! ## Precedence
//!
//! ```text
//! recent error in the trailing window?  ── yes ──► down
//!         │ no
//!         ▼
//! active run for this agent?            ── yes ──► working
//!         │ no
//!         ▼
//!       idle
//! ```
//!
//! The error check short-circuits: the run registry is not consulted for an
//! agent that is down.

use crate::config::StatusConfig;
use crate::format::{now_ms, truncate_chars};
use crate::ingest;
use crate::sources::{AgentDescriptor, OpenClawPaths, Roster, RunRegistry};
use crate::types::{AgentError, AgentStatus, AgentStatusRecord, RunRecord};

/// Maximum characters of `currentTask`
pub const CURRENT_TASK_MAX: usize = 50;

/// Apply the fixed precedence to two lazily evaluated signals.
///
/// `active_run` is only invoked when `recent_error` returns false.
pub fn resolve(
    recent_error: impl FnOnce() -> bool,
    active_run: impl FnOnce() -> bool,
) -> AgentStatus {
    if recent_error() {
        AgentStatus::Down
    } else if active_run() {
        AgentStatus::Working
    } else {
        AgentStatus::Idle
    }
}

/// Computes agent status from the files of one OpenClaw root
#[derive(Debug, Clone)]
pub struct StatusCalculator {
    paths: OpenClawPaths,
    config: StatusConfig,
}

impl StatusCalculator {
    pub fn new(paths: OpenClawPaths, config: StatusConfig) -> Self {
        Self { paths, config }
    }

    /// Whether the agent's newest session log shows an error inside the
    /// trailing window ending at `now_ms`.
    pub fn has_recent_error(&self, agent_id: &str, now_ms: i64) -> bool {
        let Some(log) = ingest::latest_session_file(&self.paths.sessions_dir(agent_id)) else {
            return false;
        };
        ingest::has_recent_error(
            &log,
            self.config.recent_message_limit,
            self.config.error_window(),
            now_ms,
        )
    }

    /// Most recent classified error of the agent, if any
    pub fn last_error(&self, agent_id: &str) -> Option<AgentError> {
        let log = ingest::latest_session_file(&self.paths.sessions_dir(agent_id))?;
        ingest::last_error(&log)
    }

    /// Status of one agent, re-deriving every signal from disk.
    pub fn status(&self, agent_id: &str) -> AgentStatus {
        let registry = RunRegistry::new(self.paths.runs_file());
        resolve(
            || self.has_recent_error(agent_id, now_ms()),
            || registry.load().iter().any(|r| r.is_active() && r.belongs_to(agent_id)),
        )
    }

    /// Status of one agent against an already-loaded run list.
    ///
    /// Used during snapshot assembly so every agent sees the same registry
    /// read.
    pub fn status_with_runs(&self, agent_id: &str, runs: &[RunRecord], now_ms: i64) -> AgentStatus {
        resolve(
            || self.has_recent_error(agent_id, now_ms),
            || runs.iter().any(|r| r.is_active() && r.belongs_to(agent_id)),
        )
    }

    /// Full status record for one roster agent.
    pub fn agent_record(
        &self,
        agent: &AgentDescriptor,
        runs: &[RunRecord],
        now_ms: i64,
    ) -> AgentStatusRecord {
        let status = self.status_with_runs(&agent.id, runs, now_ms);
        let newest = runs
            .iter()
            .filter(|r| r.belongs_to(&agent.id))
            .max_by_key(|r| r.started_at);

        let error = if status == AgentStatus::Down {
            self.last_error(&agent.id)
        } else {
            None
        };

        AgentStatusRecord {
            id: agent.id.clone(),
            name: agent.name.clone(),
            role: agent.role.clone().unwrap_or_else(|| agent.name.clone()),
            status,
            current_task: newest
                .map(|r| truncate_chars(&r.task, CURRENT_TASK_MAX))
                .unwrap_or_default(),
            last_active_at: newest.map(|r| r.ended_at.unwrap_or(r.started_at)).unwrap_or(0),
            error,
        }
    }

    /// Status records for every roster agent, in roster order.
    ///
    /// Agents absent from the roster are absent from the result.
    pub fn agent_records(
        &self,
        roster: &Roster,
        runs: &[RunRecord],
        now_ms: i64,
    ) -> Vec<AgentStatusRecord> {
        let records: Vec<_> = roster
            .agents()
            .iter()
            .map(|agent| self.agent_record(agent, runs, now_ms))
            .collect();

        tracing::debug!(
            agents = records.len(),
            down = records.iter().filter(|r| r.status == AgentStatus::Down).count(),
            working = records.iter().filter(|r| r.status == AgentStatus::Working).count(),
            "Computed agent statuses"
        );
        records
    }
}
