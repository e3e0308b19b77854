//! Usage event extraction from one session log.

use super::record::{read_records, RecordTime, Records};
use super::trigger::MessageIndex;
use crate::types::UsageEvent;
use std::path::{Path, PathBuf};

/// One append-only session log of one agent.
///
/// Cheap to construct; every call to [`SessionLog::usage_events`] reopens
/// the file and scans it from the top, so the sequence is restartable and
/// always reflects what has been appended so far.
#[derive(Debug, Clone)]
pub struct SessionLog {
    path: PathBuf,
    agent_id: String,
}

impl SessionLog {
    /// Open a log, deriving the agent id from an
    /// `agents/<agentId>/sessions/<file>.jsonl` layout.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let agent_id = agent_id_from_path(&path).unwrap_or_default();
        Self { path, agent_id }
    }

    /// Override the agent id derived from the path
    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = agent_id.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Lazily parse usage events in file order.
    pub fn usage_events(&self) -> UsageEvents {
        UsageEvents {
            records: read_records(&self.path),
            index: MessageIndex::new(),
            session_id: self
                .path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            agent_id: self.agent_id.clone(),
        }
    }
}

/// Iterator over the usage events of one [`SessionLog`].
///
/// Holds the per-file message index; dropping the iterator drops the index.
pub struct UsageEvents {
    records: Records,
    index: MessageIndex,
    session_id: String,
    agent_id: String,
}

impl Iterator for UsageEvents {
    type Item = UsageEvent;

    fn next(&mut self) -> Option<UsageEvent> {
        loop {
            let record = self.records.next()?;

            if record.record_type.as_deref() == Some("session") {
                if let Some(ref id) = record.id {
                    self.session_id = id.clone();
                }
                continue;
            }

            let event = self.to_event(&record);
            // Indexed after resolution so no record can be its own trigger
            self.index.insert(&record);

            if event.is_some() {
                return event;
            }
        }
    }
}

impl UsageEvents {
    fn to_event(&self, record: &super::record::RawRecord) -> Option<UsageEvent> {
        let message = record.message.as_ref()?;
        if message.role() != "assistant" {
            return None;
        }
        let usage = message.usage.as_ref()?;

        let timestamp = match record.time() {
            RecordTime::At(ts) => ts,
            RecordTime::Invalid | RecordTime::Missing => {
                tracing::debug!(
                    line = self.records.line_number(),
                    session_id = %self.session_id,
                    "Dropping usage record without a valid timestamp"
                );
                return None;
            }
        };

        let (tokens_total, tokens_input, tokens_output) = usage.totals();
        let trigger = record
            .parent_id
            .as_deref()
            .and_then(|parent| self.index.resolve(parent));

        Some(UsageEvent {
            timestamp,
            tokens_total,
            tokens_input,
            tokens_output,
            model: message.model.clone().unwrap_or_default(),
            session_id: self.session_id.clone(),
            agent_id: self.agent_id.clone(),
            message_id: record.id.clone(),
            trigger,
        })
    }
}

/// `agents/<agentId>/sessions/<file>` → `agentId`
fn agent_id_from_path(path: &Path) -> Option<String> {
    let sessions = path.parent()?;
    if sessions.file_name()? != "sessions" {
        return None;
    }
    Some(sessions.parent()?.file_name()?.to_string_lossy().into_owned())
}
