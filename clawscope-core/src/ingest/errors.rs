//! Error detection over the tail of a session log.

use super::record::read_records;
use crate::types::{AgentError, ErrorKind};
use std::collections::VecDeque;
use std::path::Path;

/// How many trailing messages [`last_error`] inspects
const LAST_ERROR_SCAN: usize = 100;

/// The fields of a session message that error detection needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMessage {
    pub role: String,
    pub stop_reason: Option<String>,
    pub error_message: Option<String>,
    /// Epoch milliseconds
    pub timestamp: Option<i64>,
}

impl SessionMessage {
    pub fn is_error(&self) -> bool {
        self.stop_reason.as_deref() == Some("error")
    }
}

/// Last `limit` message records of a log, in file order.
///
/// Only a ring buffer of `limit` entries is held while scanning.
pub fn recent_messages(path: &Path, limit: usize) -> Vec<SessionMessage> {
    if limit == 0 {
        return Vec::new();
    }

    let mut tail = VecDeque::with_capacity(limit);
    for record in read_records(path).filter(|r| r.is_message()) {
        let timestamp = record.message_time_ms();
        let Some(message) = record.message else {
            continue;
        };
        if tail.len() == limit {
            tail.pop_front();
        }
        tail.push_back(SessionMessage {
            role: message.role().to_string(),
            stop_reason: message.stop_reason,
            error_message: message.error_message,
            timestamp,
        });
    }
    tail.into()
}

/// Whether any of the last `limit` messages is an error newer than
/// `now_ms - window`.
pub fn has_recent_error(path: &Path, limit: usize, window: chrono::Duration, now_ms: i64) -> bool {
    let cutoff = now_ms - window.num_milliseconds();
    recent_messages(path, limit)
        .iter()
        .any(|m| m.is_error() && m.timestamp.is_some_and(|ts| ts > cutoff))
}

/// Newest error among the trailing messages, classified.
pub fn last_error(path: &Path) -> Option<AgentError> {
    recent_messages(path, LAST_ERROR_SCAN)
        .into_iter()
        .rev()
        .find(SessionMessage::is_error)
        .map(|m| {
            let message = m.error_message.unwrap_or_default();
            AgentError {
                kind: classify_error(&message),
                message,
                timestamp: m.timestamp.unwrap_or(0),
            }
        })
}

/// Classify a provider error message.
pub fn classify_error(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();
    if lower.contains("429") || lower.contains("rate limit") || lower.contains("rate_limit") {
        ErrorKind::RateLimit
    } else if lower.contains("token") || lower.contains("context") {
        ErrorKind::TokenLimit
    } else if lower.contains("timeout") || lower.contains("timed out") {
        ErrorKind::Timeout
    } else {
        ErrorKind::Unknown
    }
}
