//! `sessions.json`: session key → session id, per agent.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawSessionEntry {
    session_id: Option<String>,
    session_file: Option<String>,
}

/// Index of one agent's sessions directory
#[derive(Debug, Default)]
pub struct SessionIndex {
    dir: PathBuf,
    entries: HashMap<String, RawSessionEntry>,
}

impl SessionIndex {
    /// Load `<sessions_dir>/sessions.json`; missing or malformed yields an
    /// empty index.
    pub fn load(sessions_dir: &Path) -> Self {
        let path = sessions_dir.join("sessions.json");
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => parse_entries(&content, &path),
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "Cannot read session index");
                }
                HashMap::new()
            }
        };
        Self {
            dir: sessions_dir.to_path_buf(),
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Session log for a session key, if the index names one
    pub fn log_path(&self, session_key: &str) -> Option<PathBuf> {
        let entry = self.entries.get(session_key)?;
        if let Some(ref file) = entry.session_file {
            let path = PathBuf::from(file);
            return Some(if path.is_absolute() {
                path
            } else {
                self.dir.join(path)
            });
        }
        let id = entry.session_id.as_deref()?;
        Some(self.dir.join(format!("{}.jsonl", id)))
    }
}

fn parse_entries(content: &str, path: &Path) -> HashMap<String, RawSessionEntry> {
    let value: serde_json::Value = match serde_json::from_str(content) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Malformed session index");
            return HashMap::new();
        }
    };
    let Some(obj) = value.as_object() else {
        return HashMap::new();
    };

    obj.iter()
        .filter_map(|(key, entry)| {
            serde_json::from_value::<RawSessionEntry>(entry.clone())
                .ok()
                .map(|e| (key.clone(), e))
        })
        .collect()
}
