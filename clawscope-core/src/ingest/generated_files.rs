//! Recover what a run produced: written files and its final answer.

use super::record::read_records;
use crate::format::truncate_chars;
use std::collections::HashSet;
use std::path::Path;

/// Tools whose arguments name a file being created or edited
const PATH_TOOLS: &[&str] = &[
    "write",
    "edit",
    "create_file",
    "str_replace_editor",
    "apply_patch",
];

const PATH_KEYS: &[&str] = &["path", "file_path", "filePath"];

/// Maximum characters kept from a run's final answer
pub const OUTPUT_MAX: usize = 500;

/// Paths written or edited in a session log, deduplicated in first-seen order.
pub fn generated_files(path: &Path) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for record in read_records(path) {
        let Some(content) = record.message.as_ref().and_then(|m| m.content.as_ref()) else {
            continue;
        };
        for (_, name, args) in content.tool_calls() {
            if !is_path_tool(name) {
                continue;
            }
            for file in paths_in_arguments(args) {
                if seen.insert(file.clone()) {
                    files.push(file);
                }
            }
        }
    }

    files
}

/// Last non-empty assistant text of a session log, truncated.
pub fn final_output(path: &Path) -> Option<String> {
    read_records(path)
        .filter_map(|record| {
            let message = record.message?;
            if message.role() != "assistant" {
                return None;
            }
            message.text()
        })
        .last()
        .map(|text| truncate_chars(text.trim(), OUTPUT_MAX))
}

fn is_path_tool(name: &str) -> bool {
    PATH_TOOLS.iter().any(|tool| tool.eq_ignore_ascii_case(name))
}

fn paths_in_arguments(args: &serde_json::Value) -> Vec<String> {
    let mut paths = Vec::new();

    if let Some(obj) = args.as_object() {
        for key in PATH_KEYS {
            if let Some(p) = obj.get(*key).and_then(|v| v.as_str()) {
                if !p.trim().is_empty() {
                    paths.push(p.trim().to_string());
                    break;
                }
            }
        }
        // apply_patch carries the targets inside the patch body
        if let Some(patch) = obj.get("input").and_then(|v| v.as_str()) {
            paths.extend(paths_in_patch(patch));
        }
    } else if let Some(patch) = args.as_str() {
        paths.extend(paths_in_patch(patch));
    }

    paths
}

fn paths_in_patch(patch: &str) -> impl Iterator<Item = String> + '_ {
    patch.lines().filter_map(|line| {
        line.strip_prefix("*** Add File: ")
            .or_else(|| line.strip_prefix("*** Update File: "))
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
    })
}
