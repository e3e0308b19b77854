//! Task History Store: durable journal of completed tasks
//!
//! The upstream run registry may be truncated or cleared at any time. The
//! journal keeps a projection of every run this process has seen complete,
//! so the dashboard keeps showing finished work after its run record is gone.
//!
//! Journal format (`dashboard/task_history.json`):
//!
//! ```json
//! {"version": 1, "tasks": [ {TaskRecord}, ... ]}
//! ```
//!
//! Newest completions are at the front; the oldest fall off the tail once
//! the journal exceeds its cap. The store assumes it is the only writer.

use crate::config::HistoryConfig;
use crate::error::{Error, Result};
use crate::types::{RunRecord, TaskRecord};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

const JOURNAL_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
struct RawJournal {
    #[serde(default)]
    tasks: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct JournalOut<'a> {
    tasks: &'a [TaskRecord],
    version: u32,
}

/// Journal contents as loaded from disk
#[derive(Debug, Default)]
struct Loaded {
    tasks: Vec<TaskRecord>,
    /// File existed but could not be decoded; it is set aside before the
    /// next write instead of being overwritten.
    corrupt: bool,
}

/// Handle on the persisted task history
#[derive(Debug, Clone)]
pub struct TaskHistory {
    path: PathBuf,
    journal_cap: usize,
    result_cap: usize,
}

impl TaskHistory {
    pub fn new(path: impl Into<PathBuf>, config: &HistoryConfig) -> Self {
        Self {
            path: path.into(),
            journal_cap: config.journal_cap,
            result_cap: config.result_cap,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Journal entries, newest completion first. Missing file is empty.
    pub fn load(&self) -> Vec<TaskRecord> {
        self.load_journal().tasks
    }

    /// Merge the live registry with the journal.
    ///
    /// Every current run is projected through `projector`. Runs that have
    /// ended and are not yet journaled are prepended to the journal, which is
    /// then rewritten atomically. The result is the current projections plus
    /// journal entries for runs no longer in the registry, newest start first,
    /// capped at `result_cap`.
    pub fn merge<F>(&self, runs: &[RunRecord], projector: F) -> Vec<TaskRecord>
    where
        F: Fn(&RunRecord) -> TaskRecord,
    {
        let Loaded {
            tasks: mut journal,
            corrupt,
        } = self.load_journal();
        let mut journaled: HashSet<String> = journal.iter().map(|t| t.id.clone()).collect();

        let current: Vec<TaskRecord> = runs.iter().map(&projector).collect();

        let mut new_completed = Vec::new();
        for (run, task) in runs.iter().zip(&current) {
            if !run.is_active() && !run.run_id.is_empty() && journaled.insert(run.run_id.clone()) {
                new_completed.push(task.clone());
            }
        }

        // Display fields that became available after the entry was written
        let by_id: HashMap<&str, &TaskRecord> =
            current.iter().map(|t| (t.id.as_str(), t)).collect();
        let mut backfilled = 0;
        for entry in journal.iter_mut() {
            if let Some(newer) = by_id.get(entry.id.as_str()) {
                if entry.can_backfill_from(newer) {
                    entry.backfill_from(newer);
                    backfilled += 1;
                }
            }
        }

        if !new_completed.is_empty() || backfilled > 0 {
            let added = new_completed.len();
            new_completed.append(&mut journal);
            journal = new_completed;
            journal.truncate(self.journal_cap);

            match self.persist(&journal, corrupt) {
                Ok(()) => tracing::info!(
                    path = %self.path.display(),
                    added,
                    backfilled,
                    entries = journal.len(),
                    "Task history updated"
                ),
                Err(e) => tracing::warn!(error = %e, "Failed to persist task history"),
            }
        }

        let current_ids: HashSet<&str> = runs.iter().map(|r| r.run_id.as_str()).collect();
        let mut merged = current;
        merged.extend(
            journal
                .into_iter()
                .filter(|t| !current_ids.contains(t.id.as_str())),
        );
        merged.sort_by(|a, b| b.start_time.unwrap_or(0).cmp(&a.start_time.unwrap_or(0)));
        merged.truncate(self.result_cap);
        merged
    }

    fn load_journal(&self) -> Loaded {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.path.display(), error = %e, "Cannot read task history");
                }
                return Loaded::default();
            }
        };

        let raw: RawJournal = match serde_json::from_str(&content) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Malformed task history");
                return Loaded {
                    tasks: Vec::new(),
                    corrupt: true,
                };
            }
        };

        let total = raw.tasks.len();
        let tasks: Vec<TaskRecord> = raw
            .tasks
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();
        if tasks.len() < total {
            tracing::debug!(
                skipped = total - tasks.len(),
                "Skipped malformed task history entries"
            );
        }

        Loaded {
            tasks,
            corrupt: false,
        }
    }

    fn persist(&self, tasks: &[TaskRecord], set_aside_existing: bool) -> Result<()> {
        let journal_err = |message: String| Error::Journal {
            path: self.path.display().to_string(),
            message,
        };

        if set_aside_existing {
            let aside = sibling(&self.path, "corrupt");
            std::fs::rename(&self.path, &aside)
                .map_err(|e| journal_err(format!("failed to set aside corrupt journal: {}", e)))?;
            tracing::warn!(path = %aside.display(), "Moved unreadable task history aside");
        }

        let payload = serde_json::to_string_pretty(&JournalOut {
            tasks,
            version: JOURNAL_VERSION,
        })?;
        write_atomic(&self.path, &payload)
            .map_err(|e| journal_err(format!("failed to write journal: {}", e)))
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    match path.file_name() {
        Some(name) => path.with_file_name(format!("{}.{}", name.to_string_lossy(), suffix)),
        None => path.with_extension(suffix),
    }
}

/// Replace `path` with `payload` via a temp file and rename.
fn write_atomic(path: &Path, payload: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let temp_path = sibling(path, "tmp");
    std::fs::write(&temp_path, payload)?;
    std::fs::rename(&temp_path, path)
}
