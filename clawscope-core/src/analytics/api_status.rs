//! Per-model provider health from the failure logs.

use crate::sources::FailureEntry;
use crate::types::ErrorKind;
use serde::Serialize;

/// A model whose newest failure is inside this window is degraded
pub const DEGRADED_WINDOW_MS: i64 = 5 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiStatus {
    pub provider: String,
    pub model: String,
    pub status: HealthStatus,
    /// Newest failure inside the degraded window
    pub last_error: Option<ApiError>,
    pub error_count: usize,
}

/// Provider id from a model name prefix
pub fn provider_for(model: &str) -> &'static str {
    if model.starts_with("glm") {
        "zhipu"
    } else if model.starts_with("qwen") {
        "qwen"
    } else if model.starts_with("kimi") {
        "moonshot"
    } else {
        "unknown"
    }
}

/// Aggregate failures per model, in order of first appearance.
///
/// `entries` are expected newest first, as returned by
/// [`read_failure_logs`](crate::sources::read_failure_logs).
pub fn api_statuses(entries: &[FailureEntry], now_ms: i64) -> Vec<ApiStatus> {
    let mut statuses: Vec<ApiStatus> = Vec::new();

    for entry in entries {
        let idx = match statuses.iter().position(|s| s.model == entry.model) {
            Some(idx) => idx,
            None => {
                statuses.push(ApiStatus {
                    provider: provider_for(&entry.model).to_string(),
                    model: entry.model.clone(),
                    status: HealthStatus::Healthy,
                    last_error: None,
                    error_count: 0,
                });
                statuses.len() - 1
            }
        };
        let status = &mut statuses[idx];
        status.error_count += 1;

        if entry.timestamp > now_ms - DEGRADED_WINDOW_MS {
            status.status = HealthStatus::Degraded;
            if status.last_error.is_none() {
                status.last_error = Some(ApiError {
                    kind: entry.kind,
                    message: entry.message.clone(),
                    timestamp: entry.timestamp,
                });
            }
        }
    }

    statuses
}
