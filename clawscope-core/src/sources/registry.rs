//! Run registry reader (`subagents/runs.json`).
//!
//! The registry is `{"version": N, "runs": {runId: record}}`; older runtimes
//! wrote a bare list. Each record is decoded on its own, so one bad entry
//! never hides the rest.

use crate::types::{RunOutcome, RunRecord};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawRun {
    run_id: Option<String>,
    child_session_key: Option<String>,
    task: Option<String>,
    started_at: Option<f64>,
    ended_at: Option<f64>,
    outcome: Option<serde_json::Value>,
    #[serde(alias = "total_tokens")]
    total_tokens: Option<f64>,
}

/// Read-only handle on the run registry file
#[derive(Debug, Clone)]
pub struct RunRegistry {
    path: PathBuf,
}

impl RunRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every run currently in the registry, in registry order.
    ///
    /// A missing file is an empty registry; a malformed file is empty plus a
    /// warning.
    pub fn load(&self) -> Vec<RunRecord> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.path.display(), error = %e, "Cannot read run registry");
                }
                return Vec::new();
            }
        };

        match serde_json::from_str::<serde_json::Value>(&content) {
            Ok(value) => parse_runs(&value),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Malformed run registry");
                Vec::new()
            }
        }
    }

    /// Runs that have not ended
    pub fn active(&self) -> Vec<RunRecord> {
        self.load().into_iter().filter(RunRecord::is_active).collect()
    }
}

/// Decode a registry document, skipping malformed records.
pub fn parse_runs(value: &serde_json::Value) -> Vec<RunRecord> {
    let runs = value.get("runs").unwrap_or(value);

    match runs {
        serde_json::Value::Object(map) => map
            .iter()
            .filter_map(|(key, record)| parse_run(record, Some(key)))
            .collect(),
        serde_json::Value::Array(list) => list.iter().filter_map(|r| parse_run(r, None)).collect(),
        _ => Vec::new(),
    }
}

fn parse_run(value: &serde_json::Value, key: Option<&str>) -> Option<RunRecord> {
    let raw: RawRun = match serde_json::from_value(value.clone()) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::debug!(run_id = ?key, error = %e, "Skipping malformed run record");
            return None;
        }
    };

    let run_id = raw
        .run_id
        .filter(|id| !id.is_empty())
        .or_else(|| key.map(str::to_string))?;

    let ended_at = raw.ended_at.map(|ms| ms as i64);
    Some(RunRecord {
        run_id,
        child_session_key: raw.child_session_key.unwrap_or_default(),
        task: raw.task.unwrap_or_default(),
        started_at: raw.started_at.map(|ms| ms as i64).unwrap_or(0),
        ended_at,
        outcome: raw.outcome.as_ref().and_then(parse_outcome),
        total_tokens: raw.total_tokens.map(|t| t as u64),
    })
}

/// Outcome is a bare string (`"ok"`) or an object (`{"status": "error", "error": ...}`).
fn parse_outcome(value: &serde_json::Value) -> Option<RunOutcome> {
    match value {
        serde_json::Value::String(status) => Some(outcome_from_status(status, None)),
        serde_json::Value::Object(obj) => {
            let error = obj
                .get("error")
                .or_else(|| obj.get("message"))
                .and_then(|v| v.as_str())
                .map(str::to_string);
            let status = obj.get("status").and_then(|v| v.as_str()).unwrap_or("");
            Some(outcome_from_status(status, error))
        }
        _ => None,
    }
}

fn outcome_from_status(status: &str, error: Option<String>) -> RunOutcome {
    match status.to_ascii_lowercase().as_str() {
        "ok" | "success" => RunOutcome::Success,
        "error" | "failed" | "failure" => RunOutcome::Failure { error },
        _ => RunOutcome::Unknown(status.to_string()),
    }
}
