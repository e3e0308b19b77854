//! Core domain types for clawscope
//!
//! These types describe what the dashboard observes of an OpenClaw runtime.
//! Everything is derived from files the runtime owns; nothing here is ever
//! written back to those files.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Agent** | A configured OpenClaw agent (roster entry in `openclaw.json`) |
//! | **Run** | One delegated subtask, recorded in the run registry (`subagents/runs.json`) |
//! | **Usage Event** | An assistant turn in a session log that reports token usage |
//! | **Trigger Chain** | The message that caused a usage event: a user prompt or a tool result |
//! | **Task** | The dashboard projection of a run, persisted once the run ends |
//!
//! Wire shapes use camelCase field names; consumers must treat added fields
//! as optional.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================
// Session log records
// ============================================

/// One assistant turn with resource usage, parsed from a session log.
///
/// Recreated on every read; session logs are append-only and never mutated
/// by this crate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageEvent {
    pub timestamp: DateTime<Utc>,
    pub tokens_total: u64,
    pub tokens_input: u64,
    pub tokens_output: u64,
    /// Model id reported by the turn (empty when the log omits it)
    pub model: String,
    pub session_id: String,
    pub agent_id: String,
    /// Id of the log record this event was parsed from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// What provoked this turn, when it can be resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<TriggerChain>,
}

/// Causal link from a usage event back to the message that provoked it.
///
/// Always references a message that appears earlier in the same file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerChain {
    pub kind: TriggerKind,
    /// Id of the message the chain ends at (the user prompt or the tool result)
    pub source_id: String,
    /// Human readable one-liner, e.g. `tool: write src/main.rs`
    pub description: String,
}

/// What kind of message triggered a usage event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerKind {
    /// A user (or calling agent) prompt
    UserMessage,
    /// Completion of a tool call issued by an earlier assistant turn
    ToolResult {
        tool_name: String,
        /// Id of the assistant message that issued the call
        #[serde(skip_serializing_if = "Option::is_none")]
        call_message_id: Option<String>,
    },
}

// ============================================
// Agent status
// ============================================

/// Three-state status derived for each observed agent.
///
/// Never stored; recomputed on every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Working,
    Down,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Working => "working",
            AgentStatus::Down => "down",
        }
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classification of an error message found in a session or failure log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    RateLimit,
    TokenLimit,
    Timeout,
    Downgrade,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::RateLimit => "rate-limit",
            ErrorKind::TokenLimit => "token-limit",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Downgrade => "downgrade",
            ErrorKind::Unknown => "unknown",
        }
    }
}

/// Most recent error reported by an agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentError {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
    /// Epoch milliseconds
    pub timestamp: i64,
}

/// Status record for one roster agent, as pushed to the dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatusRecord {
    pub id: String,
    pub name: String,
    pub role: String,
    pub status: AgentStatus,
    pub current_task: String,
    /// Epoch milliseconds of the newest run activity, 0 when never active
    pub last_active_at: i64,
    pub error: Option<AgentError>,
}

// ============================================
// Run registry
// ============================================

/// Outcome recorded on a finished run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    Failure { error: Option<String> },
    Unknown(String),
}

impl RunOutcome {
    /// Short label used by the subagent view (`ok`, `error`, or the raw value)
    pub fn label(&self) -> &str {
        match self {
            RunOutcome::Success => "ok",
            RunOutcome::Failure { .. } => "error",
            RunOutcome::Unknown(raw) => raw,
        }
    }
}

/// One delegated subtask in the run registry.
///
/// `ended_at == None` means the run is still active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    pub run_id: String,
    /// Encodes the agent id: `agent:<agentId>:subagent:<uuid>`
    pub child_session_key: String,
    pub task: String,
    /// Epoch milliseconds
    pub started_at: i64,
    /// Epoch milliseconds
    pub ended_at: Option<i64>,
    pub outcome: Option<RunOutcome>,
    pub total_tokens: Option<u64>,
}

impl RunRecord {
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Agent id encoded in the child session key, empty when the key is foreign
    pub fn agent_id(&self) -> &str {
        agent_id_from_session_key(&self.child_session_key).unwrap_or("")
    }

    /// Whether this run was delegated to `agent_id`
    pub fn belongs_to(&self, agent_id: &str) -> bool {
        !agent_id.is_empty() && self.agent_id() == agent_id
    }
}

/// Parse `agent:<agentId>:...` session keys.
pub fn agent_id_from_session_key(key: &str) -> Option<&str> {
    let mut parts = key.split(':');
    match (parts.next(), parts.next()) {
        (Some("agent"), Some(id)) if !id.is_empty() => Some(id),
        _ => None,
    }
}

// ============================================
// Tasks
// ============================================

/// Dashboard task state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

/// Display projection of a run; also the journal entry format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: String,
    pub name: String,
    pub status: TaskStatus,
    /// 0-100
    pub progress: u8,
    /// Epoch milliseconds
    #[serde(default)]
    pub start_time: Option<i64>,
    /// Epoch milliseconds
    #[serde(default)]
    pub end_time: Option<i64>,
    #[serde(default)]
    pub agent_id: String,
    #[serde(default)]
    pub agent_name: String,
    #[serde(default)]
    pub error: Option<String>,
    /// Excerpt of the run's final answer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Files written or edited during the run, first-seen order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_files: Option<Vec<String>>,
}

impl TaskRecord {
    /// Whether a display field the journal lacks is now known
    pub fn can_backfill_from(&self, newer: &TaskRecord) -> bool {
        (self.output.is_none() && newer.output.is_some())
            || (self.generated_files.is_none() && newer.generated_files.is_some())
    }

    /// Fill absent display fields from a newer projection of the same run
    pub fn backfill_from(&mut self, newer: &TaskRecord) {
        if self.output.is_none() {
            self.output = newer.output.clone();
        }
        if self.generated_files.is_none() {
            self.generated_files = newer.generated_files.clone();
        }
    }
}
