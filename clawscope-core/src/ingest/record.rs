//! Raw JSONL record types and a lenient line reader.
//!
//! Every consumer of session logs goes through [`read_records`], so the
//! skip-don't-fail policy for malformed lines lives in exactly one place.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

/// Represents a single line from an OpenClaw session log.
///
/// Uses `#[serde(default)]` liberally to handle missing fields gracefully.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct RawRecord {
    #[serde(rename = "type")]
    pub record_type: Option<String>,
    pub id: Option<String>,
    pub parent_id: Option<String>,
    /// ISO-8601 instant the runtime wrote the record
    pub timestamp: Option<String>,
    pub message: Option<RawMessage>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct RawMessage {
    pub role: Option<String>,
    pub content: Option<RawContent>,
    pub model: Option<String>,
    pub usage: Option<RawUsage>,
    pub stop_reason: Option<String>,
    pub error_message: Option<String>,
    /// Epoch milliseconds; some writers emit floats
    pub timestamp: Option<f64>,
    pub tool_call_id: Option<String>,
    pub tool_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub(crate) enum ContentBlock {
    #[serde(rename = "text")]
    Text {
        #[serde(default)]
        text: String,
    },
    #[serde(rename = "toolCall", alias = "tool_use")]
    ToolCall {
        #[serde(default)]
        id: String,
        name: String,
        #[serde(default, alias = "input")]
        arguments: serde_json::Value,
    },
    // Catch-all for thinking, image and future block types
    #[serde(other)]
    Unknown,
}

/// Token usage; totals missing from the log count as zero.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct RawUsage {
    #[serde(alias = "input_tokens")]
    pub input: Option<u64>,
    #[serde(alias = "output_tokens")]
    pub output: Option<u64>,
    #[serde(alias = "total_tokens")]
    pub total_tokens: Option<u64>,
}

impl RawUsage {
    /// `(total, input, output)`, deriving the total when only parts are logged
    pub fn totals(&self) -> (u64, u64, u64) {
        let input = self.input.unwrap_or(0);
        let output = self.output.unwrap_or(0);
        let total = self.total_tokens.unwrap_or(input + output);
        (total, input, output)
    }
}

impl RawContent {
    /// Concatenated text blocks, or `None` when there is no text at all
    pub fn text(&self) -> Option<String> {
        match self {
            RawContent::Text(text) if !text.trim().is_empty() => Some(text.clone()),
            RawContent::Text(_) => None,
            RawContent::Blocks(blocks) => {
                let parts: Vec<&str> = blocks
                    .iter()
                    .filter_map(|b| match b {
                        ContentBlock::Text { text } if !text.trim().is_empty() => {
                            Some(text.as_str())
                        }
                        _ => None,
                    })
                    .collect();
                if parts.is_empty() {
                    None
                } else {
                    Some(parts.join("\n"))
                }
            }
        }
    }

    /// Tool calls issued by this content, in block order
    pub fn tool_calls(&self) -> impl Iterator<Item = (&str, &str, &serde_json::Value)> {
        let blocks: &[ContentBlock] = match self {
            RawContent::Blocks(blocks) => blocks,
            RawContent::Text(_) => &[],
        };
        blocks.iter().filter_map(|b| match b {
            ContentBlock::ToolCall {
                id,
                name,
                arguments,
            } => Some((id.as_str(), name.as_str(), arguments)),
            _ => None,
        })
    }
}

impl RawMessage {
    pub fn role(&self) -> &str {
        self.role.as_deref().unwrap_or("")
    }

    pub fn text(&self) -> Option<String> {
        self.content.as_ref().and_then(RawContent::text)
    }
}

/// Outcome of resolving a record's timestamp
pub(crate) enum RecordTime {
    At(DateTime<Utc>),
    /// Present but unparseable
    Invalid,
    Missing,
}

impl RawRecord {
    /// Record time: the ISO `timestamp`, else the message's epoch-ms stamp.
    pub fn time(&self) -> RecordTime {
        if let Some(ref raw) = self.timestamp {
            return match DateTime::parse_from_rfc3339(raw) {
                Ok(dt) => RecordTime::At(dt.with_timezone(&Utc)),
                Err(_) => RecordTime::Invalid,
            };
        }
        match self.message.as_ref().and_then(|m| m.timestamp) {
            Some(ms) => match crate::format::from_epoch_ms(ms as i64) {
                Some(dt) => RecordTime::At(dt),
                None => RecordTime::Invalid,
            },
            None => RecordTime::Missing,
        }
    }

    /// Epoch-ms stamp of the message, falling back to the record timestamp
    pub fn message_time_ms(&self) -> Option<i64> {
        if let Some(ms) = self.message.as_ref().and_then(|m| m.timestamp) {
            return Some(ms as i64);
        }
        match self.time() {
            RecordTime::At(dt) => Some(dt.timestamp_millis()),
            _ => None,
        }
    }

    pub fn is_message(&self) -> bool {
        self.record_type.as_deref() == Some("message")
    }
}

/// Lazily yields well-formed records of one file, skipping malformed lines.
///
/// A file that cannot be opened yields nothing; the failure is logged once.
pub(crate) struct Records {
    path: PathBuf,
    lines: Option<Lines<BufReader<File>>>,
    line_number: usize,
    skipped: usize,
}

impl Records {
    /// 1-based number of the line most recently read
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

impl Iterator for Records {
    type Item = RawRecord;

    fn next(&mut self) -> Option<RawRecord> {
        loop {
            let line = match self.lines.as_mut()?.next() {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    // Invalid UTF-8 or a read error: skip the line, keep scanning
                    self.line_number += 1;
                    self.skipped += 1;
                    tracing::debug!(
                        path = %self.path.display(),
                        line = self.line_number,
                        error = %e,
                        "Unreadable session log line"
                    );
                    continue;
                }
                None => {
                    if self.skipped > 0 {
                        tracing::debug!(
                            path = %self.path.display(),
                            skipped = self.skipped,
                            "Skipped malformed session log lines"
                        );
                    }
                    self.lines = None;
                    return None;
                }
            };
            self.line_number += 1;

            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<RawRecord>(&line) {
                Ok(record) => return Some(record),
                Err(e) => {
                    self.skipped += 1;
                    tracing::trace!(
                        path = %self.path.display(),
                        line = self.line_number,
                        error = %e,
                        "Skipping malformed session log line"
                    );
                }
            }
        }
    }
}

/// Open `path` for a lenient record scan.
pub(crate) fn read_records(path: &Path) -> Records {
    let lines = match File::open(path) {
        Ok(file) => Some(BufReader::new(file).lines()),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Cannot open session log");
            None
        }
    };
    Records {
        path: path.to_path_buf(),
        lines,
        line_number: 0,
        skipped: 0,
    }
}
