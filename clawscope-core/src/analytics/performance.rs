//! Token and request rates from session logs.

use crate::ingest::{self, SessionLog};
use crate::types::UsageEvent;
use chrono::{DateTime, DurationRound, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Rates in the current UTC minute
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CurrentRate {
    pub tpm: u64,
    pub rpm: u64,
}

/// Per-minute history, oldest first, zero-filled
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RateHistory {
    pub tpm: Vec<u64>,
    pub rpm: Vec<u64>,
    /// `HH:MM` labels, UTC
    pub timestamps: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Totals {
    pub tokens: u64,
    pub requests: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceStats {
    pub current: CurrentRate,
    pub history: RateHistory,
    /// Sums over the whole range
    pub total: Totals,
}

#[derive(Debug, Default, Clone, Copy)]
struct Bucket {
    tokens: u64,
    requests: u64,
}

impl PerformanceStats {
    /// Bucket usage events into the `range_minutes` minutes ending at `now`.
    ///
    /// Events outside the window are ignored.
    pub fn from_events<I>(events: I, now: DateTime<Utc>, range_minutes: u32) -> Self
    where
        I: IntoIterator<Item = UsageEvent>,
    {
        let range_minutes = range_minutes.max(1);
        let Ok(current_minute) = now.duration_trunc(chrono::Duration::minutes(1)) else {
            return Self::default();
        };
        let window_start = current_minute - chrono::Duration::minutes(i64::from(range_minutes) - 1);
        let window_end = current_minute + chrono::Duration::minutes(1);

        let mut buckets: BTreeMap<DateTime<Utc>, Bucket> = BTreeMap::new();
        for event in events {
            if event.timestamp < window_start || event.timestamp >= window_end {
                continue;
            }
            let Ok(minute) = event.timestamp.duration_trunc(chrono::Duration::minutes(1)) else {
                continue;
            };
            let bucket = buckets.entry(minute).or_default();
            bucket.tokens += event.tokens_total;
            bucket.requests += 1;
        }

        let mut stats = Self::default();
        for i in 0..range_minutes {
            let minute = window_start + chrono::Duration::minutes(i64::from(i));
            let bucket = buckets.get(&minute).copied().unwrap_or_default();
            stats.history.tpm.push(bucket.tokens);
            stats.history.rpm.push(bucket.requests);
            stats.history.timestamps.push(minute.format("%H:%M").to_string());
            stats.total.tokens += bucket.tokens;
            stats.total.requests += bucket.requests;
        }

        let current = buckets.get(&current_minute).copied().unwrap_or_default();
        stats.current = CurrentRate {
            tpm: current.tokens,
            rpm: current.requests,
        };
        stats
    }
}

/// Performance statistics over every session log under `agents_dir`.
pub fn performance_stats(agents_dir: &Path, now: DateTime<Utc>, range_minutes: u32) -> PerformanceStats {
    let files = ingest::all_session_files(agents_dir);
    tracing::trace!(files = files.len(), "Scanning session logs for rates");

    let events = files
        .into_iter()
        .flat_map(|path| SessionLog::new(path).usage_events());
    PerformanceStats::from_events(events, now, range_minutes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(ts: DateTime<Utc>, tokens: u64) -> UsageEvent {
        UsageEvent {
            timestamp: ts,
            tokens_total: tokens,
            tokens_input: 0,
            tokens_output: 0,
            model: "glm-4.7".to_string(),
            session_id: "s".to_string(),
            agent_id: "a".to_string(),
            message_id: None,
            trigger: None,
        }
    }

    #[test]
    fn test_buckets_and_zero_fill() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 10, 5, 30).unwrap();
        let events = vec![
            event(Utc.with_ymd_and_hms(2026, 3, 1, 10, 5, 1).unwrap(), 100),
            event(Utc.with_ymd_and_hms(2026, 3, 1, 10, 5, 20).unwrap(), 50),
            event(Utc.with_ymd_and_hms(2026, 3, 1, 10, 3, 0).unwrap(), 7),
            // Outside the window
            event(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(), 1000),
        ];

        let stats = PerformanceStats::from_events(events, now, 5);
        assert_eq!(stats.history.timestamps, vec!["10:01", "10:02", "10:03", "10:04", "10:05"]);
        assert_eq!(stats.history.tpm, vec![0, 0, 7, 0, 150]);
        assert_eq!(stats.history.rpm, vec![0, 0, 1, 0, 2]);
        assert_eq!(stats.current, CurrentRate { tpm: 150, rpm: 2 });
        assert_eq!(stats.total, Totals { tokens: 157, requests: 3 });
    }

    #[test]
    fn test_empty_agents_dir() {
        let dir = tempfile::tempdir().unwrap();
        let stats = performance_stats(&dir.path().join("agents"), Utc::now(), 20);
        assert_eq!(stats.history.tpm.len(), 20);
        assert_eq!(stats.total.tokens, 0);
    }

    #[test]
    fn test_reads_session_logs() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = dir.path().join("agents/main/sessions");
        std::fs::create_dir_all(&sessions).unwrap();
        let now = Utc::now();
        std::fs::write(
            sessions.join("s1.jsonl"),
            format!(
                r#"{{"type":"message","id":"a1","timestamp":"{}","message":{{"role":"assistant","usage":{{"totalTokens":42}}}}}}"#,
                now.to_rfc3339()
            ),
        )
        .unwrap();

        let stats = performance_stats(&dir.path().join("agents"), now, 20);
        assert_eq!(stats.total, Totals { tokens: 42, requests: 1 });
        assert_eq!(stats.current.tpm, 42);
    }
}
