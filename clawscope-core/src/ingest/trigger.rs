//! Transient `messageId → message` index for trigger resolution.
//!
//! The index is filled while a single file is scanned, and a record is only
//! inserted after its own trigger has been resolved. A chain can therefore
//! only point at lines that precede the event it explains.

use super::record::RawRecord;
use crate::format::{excerpt, truncate_chars};
use crate::types::{TriggerChain, TriggerKind};
use std::collections::HashMap;

/// Maximum characters of a trigger description
pub const DESCRIPTION_MAX: usize = 80;

/// Argument keys that make a good one-line summary of a tool call, by priority
const SUMMARY_KEYS: &[&str] = &[
    "path", "file_path", "filePath", "command", "cmd", "query", "url", "pattern",
];

/// Truncate so the result, ellipsis included, fits `DESCRIPTION_MAX`
fn cap(description: &str) -> String {
    truncate_chars(description, DESCRIPTION_MAX - 3)
}

#[derive(Debug)]
struct ToolCallInfo {
    id: String,
    name: String,
    summary: String,
}

#[derive(Debug)]
struct IndexedMessage {
    role: String,
    parent_id: Option<String>,
    text: Option<String>,
    tool_calls: Vec<ToolCallInfo>,
    tool_call_id: Option<String>,
    tool_name: Option<String>,
}

#[derive(Debug, Default)]
pub(crate) struct MessageIndex {
    by_id: HashMap<String, IndexedMessage>,
}

impl MessageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Index a record so later lines can reference it.
    pub fn insert(&mut self, record: &RawRecord) {
        let (Some(id), Some(message)) = (record.id.as_ref(), record.message.as_ref()) else {
            return;
        };

        let tool_calls = message
            .content
            .as_ref()
            .map(|content| {
                content
                    .tool_calls()
                    .map(|(id, name, args)| ToolCallInfo {
                        id: id.to_string(),
                        name: name.to_string(),
                        summary: summarize_arguments(args),
                    })
                    .collect()
            })
            .unwrap_or_default();

        self.by_id.insert(
            id.clone(),
            IndexedMessage {
                role: message.role().to_string(),
                parent_id: record.parent_id.clone(),
                text: message.text(),
                tool_calls,
                tool_call_id: message.tool_call_id.clone(),
                tool_name: message.tool_name.clone(),
            },
        );
    }

    /// Resolve what provoked the message whose parent is `parent_id`.
    ///
    /// A user parent resolves directly. A tool-result parent needs a second
    /// hop to the assistant turn that issued the call, which supplies the
    /// tool name and arguments. Any other parent yields no chain.
    pub fn resolve(&self, parent_id: &str) -> Option<TriggerChain> {
        let parent = self.by_id.get(parent_id)?;

        match parent.role.as_str() {
            "user" => {
                let text = parent.text.as_deref().unwrap_or("");
                let description = format!("user: {}", excerpt(text, DESCRIPTION_MAX));
                Some(TriggerChain {
                    kind: TriggerKind::UserMessage,
                    source_id: parent_id.to_string(),
                    description: cap(&description),
                })
            }
            "toolResult" => {
                let caller_id = parent.parent_id.as_deref();
                let call = caller_id
                    .and_then(|id| self.by_id.get(id))
                    .and_then(|caller| {
                        caller.tool_calls.iter().find(|c| match parent.tool_call_id {
                            Some(ref call_id) => c.id == *call_id,
                            None => parent.tool_name.as_deref() == Some(c.name.as_str()),
                        })
                    });

                let tool_name = parent
                    .tool_name
                    .clone()
                    .or_else(|| call.map(|c| c.name.clone()))
                    .unwrap_or_else(|| "unknown".to_string());

                let description = match call {
                    Some(c) if !c.summary.is_empty() => {
                        format!("tool: {} {}", tool_name, c.summary)
                    }
                    _ => format!("tool: {}", tool_name),
                };

                Some(TriggerChain {
                    kind: TriggerKind::ToolResult {
                        tool_name,
                        call_message_id: call.and(caller_id.map(str::to_string)),
                    },
                    source_id: parent_id.to_string(),
                    description: cap(&description),
                })
            }
            _ => None,
        }
    }
}

/// One-line summary of tool call arguments
fn summarize_arguments(args: &serde_json::Value) -> String {
    let Some(obj) = args.as_object() else {
        return match args {
            serde_json::Value::String(s) => excerpt(s, DESCRIPTION_MAX),
            _ => String::new(),
        };
    };

    for key in SUMMARY_KEYS {
        if let Some(value) = obj.get(*key).and_then(|v| v.as_str()) {
            return excerpt(value, DESCRIPTION_MAX);
        }
    }

    if obj.is_empty() {
        String::new()
    } else {
        excerpt(&serde_json::Value::Object(obj.clone()).to_string(), DESCRIPTION_MAX)
    }
}
