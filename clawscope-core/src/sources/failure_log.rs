//! Model failure log (`<workspace>/memory/model-failures.log`).
//!
//! A Markdown-ish text file with one `## ` section per failure. The format
//! is written by humans and scripts alike, so every field is best effort.

use crate::types::ErrorKind;
use chrono::{Local, NaiveDateTime};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const FAILURE_LOG_NAME: &str = "model-failures.log";

/// One failure section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureEntry {
    /// Epoch milliseconds, 0 when the section carries no timestamp
    pub timestamp: i64,
    pub model: String,
    pub kind: ErrorKind,
    pub message: String,
}

fn timestamp_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2})").expect("valid regex")
    })
}

fn model_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(glm-\d+(\.\d+)?|qwen\S*)").expect("valid regex"))
}

/// Parse failure log text. Sections without a recognisable model are skipped.
pub fn parse_failure_log(content: &str) -> Vec<FailureEntry> {
    content
        .split("## ")
        .skip(1)
        .filter_map(|section| {
            let model = model_re().find(section)?.as_str().to_string();
            Some(FailureEntry {
                timestamp: section_timestamp(section),
                model,
                kind: section_kind(section),
                message: section_message(section),
            })
        })
        .collect()
}

/// Read and merge the failure logs of every workspace, newest first.
pub fn read_failure_logs(workspaces: &[PathBuf]) -> Vec<FailureEntry> {
    let mut entries: Vec<FailureEntry> = workspaces
        .iter()
        .map(|ws| ws.join("memory").join(FAILURE_LOG_NAME))
        .flat_map(|path| read_one(&path))
        .collect();
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    entries
}

fn read_one(path: &Path) -> Vec<FailureEntry> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_failure_log(&content),
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "Cannot read failure log");
            }
            Vec::new()
        }
    }
}

// Timestamps are written in the host's local time
fn section_timestamp(section: &str) -> i64 {
    timestamp_re()
        .find(section)
        .and_then(|m| NaiveDateTime::parse_from_str(m.as_str(), "%Y-%m-%d %H:%M:%S").ok())
        .and_then(|naive| naive.and_local_timezone(Local).earliest())
        .map(|dt| dt.timestamp_millis())
        .unwrap_or(0)
}

fn section_kind(section: &str) -> ErrorKind {
    let lower = section.to_lowercase();
    if section.contains("429") || lower.contains("rate limit") {
        ErrorKind::RateLimit
    } else if lower.contains("timeout") || section.contains("超时") {
        ErrorKind::Timeout
    } else if section.contains("降级") || lower.contains("downgrade") {
        ErrorKind::Downgrade
    } else {
        ErrorKind::Unknown
    }
}

fn section_message(section: &str) -> String {
    section
        .lines()
        .find(|line| line.contains("错误类型") || line.to_lowercase().contains("error"))
        .map(|line| line.trim().to_string())
        .unwrap_or_default()
}
