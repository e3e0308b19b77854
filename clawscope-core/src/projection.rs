//! Display projections of run records: tasks and the subagent run view.

use crate::format::truncate_chars;
use crate::ingest;
use crate::sources::{OpenClawPaths, Roster, SessionIndex};
use crate::types::{RunOutcome, RunRecord, TaskRecord, TaskStatus};
use serde::Serialize;

/// Maximum characters of a task name
pub const TASK_NAME_MAX: usize = 100;

/// Number of runs in the subagent view
pub const SUBAGENT_VIEW_LIMIT: usize = 20;

const DEFAULT_FAILURE: &str = "task failed";

/// Task state of a run.
pub fn task_status(run: &RunRecord) -> TaskStatus {
    if run.is_active() {
        return TaskStatus::Running;
    }
    match run.outcome {
        Some(RunOutcome::Failure { .. }) => TaskStatus::Failed,
        _ => TaskStatus::Completed,
    }
}

/// Project a run without touching its session log.
pub fn project_run(run: &RunRecord, agent_name: &str) -> TaskRecord {
    let status = task_status(run);
    let error = match run.outcome {
        Some(RunOutcome::Failure { ref error }) if !run.is_active() => Some(
            error
                .clone()
                .unwrap_or_else(|| DEFAULT_FAILURE.to_string()),
        ),
        _ => None,
    };
    let name = if run.task.is_empty() {
        "Unknown Task".to_string()
    } else {
        truncate_chars(&run.task, TASK_NAME_MAX)
    };

    TaskRecord {
        id: run.run_id.clone(),
        name,
        status,
        progress: if run.is_active() { 50 } else { 100 },
        start_time: Some(run.started_at),
        end_time: run.ended_at,
        agent_id: run.agent_id().to_string(),
        agent_name: agent_name.to_string(),
        error,
        output: None,
        generated_files: None,
    }
}

/// Projects runs into tasks, enriching ended runs from their child session.
pub struct TaskProjector<'a> {
    paths: &'a OpenClawPaths,
    roster: &'a Roster,
}

impl<'a> TaskProjector<'a> {
    pub fn new(paths: &'a OpenClawPaths, roster: &'a Roster) -> Self {
        Self { paths, roster }
    }

    pub fn project(&self, run: &RunRecord) -> TaskRecord {
        let agent_id = run.agent_id();
        let agent_name = if agent_id.is_empty() {
            String::new()
        } else {
            self.roster.display_name(agent_id)
        };
        let mut task = project_run(run, &agent_name);

        if run.is_active() || agent_id.is_empty() {
            return task;
        }

        let index = SessionIndex::load(&self.paths.sessions_dir(agent_id));
        if let Some(log) = index.log_path(&run.child_session_key) {
            if log.is_file() {
                task.output = ingest::final_output(&log);
                let files = ingest::generated_files(&log);
                if !files.is_empty() {
                    task.generated_files = Some(files);
                }
            }
        }
        task
    }
}

/// One row of the subagent run view
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubagentRun {
    pub run_id: String,
    pub agent_id: String,
    pub task: String,
    pub started_at: i64,
    pub ended_at: Option<i64>,
    pub outcome: Option<String>,
    /// Wall time so far for active runs
    pub runtime_secs: i64,
    pub total_tokens: Option<u64>,
}

/// Newest runs first, capped at [`SUBAGENT_VIEW_LIMIT`].
pub fn subagent_view(runs: &[RunRecord], now_ms: i64) -> Vec<SubagentRun> {
    let mut sorted: Vec<&RunRecord> = runs.iter().collect();
    sorted.sort_by(|a, b| b.started_at.cmp(&a.started_at));

    sorted
        .into_iter()
        .take(SUBAGENT_VIEW_LIMIT)
        .map(|run| SubagentRun {
            run_id: run.run_id.clone(),
            agent_id: run.agent_id().to_string(),
            task: run.task.clone(),
            started_at: run.started_at,
            ended_at: run.ended_at,
            outcome: run.outcome.as_ref().map(|o| o.label().to_string()),
            runtime_secs: (run.ended_at.unwrap_or(now_ms) - run.started_at).max(0) / 1000,
            total_tokens: run.total_tokens,
        })
        .collect()
}
