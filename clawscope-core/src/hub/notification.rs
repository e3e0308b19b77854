//! Push notifications sent to subscribers.
//!
//! Every notification is a `{"type": ..., "data": ...}` envelope:
//!
//! | type                | data                          |
//! |---------------------|-------------------------------|
//! | `full_state`        | [`TelemetrySnapshot`]         |
//! | `agent_update`      | `[AgentStatusRecord]`         |
//! | `subagent_update`   | `[SubagentRun]`               |
//! | `api_status_update` | `[ApiStatus]`                 |

use crate::analytics::ApiStatus;
use crate::error::Result;
use crate::projection::SubagentRun;
use crate::snapshot::TelemetrySnapshot;
use crate::types::AgentStatusRecord;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Notification {
    FullState(TelemetrySnapshot),
    AgentUpdate(Vec<AgentStatusRecord>),
    SubagentUpdate(Vec<SubagentRun>),
    ApiStatusUpdate(Vec<ApiStatus>),
}

impl Notification {
    /// Wire name of this notification
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::FullState(_) => "full_state",
            Notification::AgentUpdate(_) => "agent_update",
            Notification::SubagentUpdate(_) => "subagent_update",
            Notification::ApiStatusUpdate(_) => "api_status_update",
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let snapshot = TelemetrySnapshot {
            timestamp: 7,
            ..TelemetrySnapshot::default()
        };
        let value: serde_json::Value =
            serde_json::from_str(&Notification::FullState(snapshot).to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "full_state");
        assert_eq!(value["data"]["timestamp"], 7);

        for notification in [
            Notification::AgentUpdate(vec![]),
            Notification::SubagentUpdate(vec![]),
            Notification::ApiStatusUpdate(vec![]),
        ] {
            let value: serde_json::Value =
                serde_json::from_str(&notification.to_json().unwrap()).unwrap();
            assert_eq!(value["type"], notification.kind());
            assert_eq!(value["data"], serde_json::json!([]));
        }
    }
}
