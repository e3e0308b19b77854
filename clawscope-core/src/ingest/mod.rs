//! Log Parser: typed records from append-only session logs
//!
//! Session logs are newline-delimited JSON written by the OpenClaw runtime,
//! one file per session under `agents/<agentId>/sessions/`. This module never
//! writes to them.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐     ┌─────────────────┐
//! │  Session Log    │ ──► │  read_records    │ ──► │  UsageEvents    │
//! │  (*.jsonl)      │     │  (skip bad lines)│     │  + TriggerChain │
//! └─────────────────┘     └──────────────────┘     └─────────────────┘
//!                               │
//!                               ├──► recent_messages / last_error
//!                               └──► generated_files / final_output
//! ```
//!
//! Every reader follows the same recovery policy: a malformed line is
//! skipped, an unreadable file is an empty result plus a warning.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use clawscope_core::ingest::{latest_session_file, SessionLog};
//!
//! if let Some(path) = latest_session_file(&sessions_dir) {
//!     for event in SessionLog::new(path).usage_events() {
//!         println!("{} tokens at {}", event.tokens_total, event.timestamp);
//!     }
//! }
//! ```

mod errors;
mod generated_files;
mod record;
mod session_log;
mod trigger;

pub use errors::{classify_error, has_recent_error, last_error, recent_messages, SessionMessage};
pub use generated_files::{final_output, generated_files, OUTPUT_MAX};
pub use session_log::{SessionLog, UsageEvents};
pub use trigger::DESCRIPTION_MAX;

use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Whether a file name is a live session log.
///
/// Lock files and logs the runtime marked as deleted are ignored.
pub fn is_session_log(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.ends_with(".jsonl") && !name.contains("lock") && !name.contains("deleted")
}

/// All session logs in one agent's session directory.
pub fn session_files(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(dir = %dir.display(), error = %e, "Cannot list session directory");
            }
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_session_log(p))
        .collect();
    files.sort();
    files
}

/// Newest session log in `dir` by modification time.
pub fn latest_session_file(dir: &Path) -> Option<PathBuf> {
    session_files(dir)
        .into_iter()
        .map(|p| {
            let modified = std::fs::metadata(&p)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, p)
        })
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
        .map(|(_, p)| p)
}

/// Session logs of every agent under `agents_root`
/// (`<agents_root>/*/sessions/*.jsonl`).
pub fn all_session_files(agents_root: &Path) -> Vec<PathBuf> {
    let pattern = agents_root.join("*").join("sessions").join("*.jsonl");
    let pattern = pattern.to_string_lossy();

    match glob::glob(&pattern) {
        Ok(paths) => paths
            .filter_map(|entry| entry.ok())
            .filter(|p| is_session_log(p))
            .collect(),
        Err(e) => {
            tracing::warn!(pattern = %pattern, error = %e, "Invalid session glob");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    #[test]
    fn test_is_session_log() {
        assert!(is_session_log(Path::new("a/b.jsonl")));
        assert!(!is_session_log(Path::new("a/b.jsonl.lock")));
        assert!(!is_session_log(Path::new("a/b.deleted.jsonl")));
        assert!(!is_session_log(Path::new("a/sessions.json")));
    }

    #[test]
    fn test_latest_session_file_by_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("zzz.jsonl");
        let new = dir.path().join("aaa.jsonl");
        fs::write(&old, "{}").unwrap();
        fs::write(&new, "{}").unwrap();
        fs::write(dir.path().join("bbb.lock.jsonl"), "{}").unwrap();

        let past = SystemTime::now() - Duration::from_secs(3600);
        fs::File::options()
            .write(true)
            .open(&old)
            .unwrap()
            .set_modified(past)
            .unwrap();

        assert_eq!(latest_session_file(dir.path()), Some(new));
    }

    #[test]
    fn test_latest_session_file_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(latest_session_file(&dir.path().join("nope")), None);
    }

    #[test]
    fn test_all_session_files() {
        let dir = tempfile::tempdir().unwrap();
        for agent in ["main", "devops"] {
            let sessions = dir.path().join(agent).join("sessions");
            fs::create_dir_all(&sessions).unwrap();
            fs::write(sessions.join("s1.jsonl"), "").unwrap();
            fs::write(sessions.join("sessions.json"), "{}").unwrap();
        }
        let mut files = all_session_files(dir.path());
        files.sort();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("devops/sessions/s1.jsonl"));
    }
}
