//! File Watcher: turn filesystem bursts into bounded refreshes
//!
//! ```text
//! notify thread ──► is_relevant? ──► Debouncer thread ──► on_change()
//!  (OS events)      (create/modify,   (≤ 1 callback per     (typically
//!                    .json/.jsonl/     quiet period)         LoopHandoff::submit)
//!                    .log)
//! ```
//!
//! Neither thread touches the async runtime directly. The usual `on_change`
//! submits through a [`LoopHandoff`], which is the only synchronisation
//! point with the runtime.

mod debounce;
mod handoff;

pub use debounce::{DebounceHandle, Debouncer};
pub use handoff::{HandoffOutcome, LoopHandoff, RefreshReceiver, RefreshRequest};

use crate::config::WatcherConfig;
use crate::error::Result;
use crate::sources::{OpenClawPaths, Roster};
use notify::event::{CreateKind, EventKind, ModifyKind};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One directory to observe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchDir {
    pub path: PathBuf,
    pub recursive: bool,
}

/// Directories worth watching that exist right now.
///
/// The run registry directory, the dashboard (history) directory, each
/// workspace's `memory/` directory and each agent's session directory.
pub fn watch_dirs(paths: &OpenClawPaths, roster: &Roster) -> Vec<WatchDir> {
    let mut dirs = Vec::new();
    let mut push = |path: PathBuf, recursive: bool| {
        if path.is_dir() && !dirs.iter().any(|d: &WatchDir| d.path == path) {
            dirs.push(WatchDir { path, recursive });
        }
    };

    push(paths.subagents_dir(), false);
    push(paths.dashboard_dir(), false);
    for workspace in paths.workspaces(roster) {
        push(workspace.join("memory"), false);
    }

    if let Ok(entries) = std::fs::read_dir(paths.agents_dir()) {
        let mut agent_dirs: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        agent_dirs.sort();
        for agent_dir in agent_dirs {
            push(agent_dir.join("sessions"), true);
        }
    }

    dirs
}

/// Whether an event should trigger a refresh
pub fn is_relevant(event: &notify::Event, suffixes: &[String]) -> bool {
    let kind_matches = match event.kind {
        EventKind::Create(CreateKind::Folder) => false,
        EventKind::Create(_) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    };
    kind_matches
        && event
            .paths
            .iter()
            .any(|p| !p.is_dir() && has_suffix(p, suffixes))
}

fn has_suffix(path: &Path, suffixes: &[String]) -> bool {
    let name = path.to_string_lossy();
    suffixes.iter().any(|s| name.ends_with(s.as_str()))
}

/// A running watcher. Dropping it stops event delivery; prefer
/// [`FileWatcher::stop`] for a bounded, logged shutdown.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    debouncer: Debouncer,
    watched: usize,
    stop_timeout: Duration,
}

impl FileWatcher {
    /// Start watching `dirs`, calling `on_change` at most once per debounce
    /// period.
    ///
    /// Returns `Ok(None)` when there is nothing to watch, which is normal
    /// for a fresh installation.
    pub fn start<F>(dirs: &[WatchDir], config: &WatcherConfig, on_change: F) -> Result<Option<Self>>
    where
        F: FnMut() + Send + 'static,
    {
        if dirs.is_empty() {
            tracing::info!("No watchable directories, file watcher not started");
            return Ok(None);
        }

        let debouncer = Debouncer::new(config.debounce(), on_change);
        let trigger = debouncer.handle();
        let suffixes = config.suffixes.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) if is_relevant(&event, &suffixes) => {
                    tracing::trace!(paths = ?event.paths, "Relevant file change");
                    trigger.trigger();
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "File watch error"),
            }
        })?;

        let mut watched = 0;
        for dir in dirs {
            let mode = if dir.recursive {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            };
            match watcher.watch(&dir.path, mode) {
                Ok(()) => watched += 1,
                Err(e) => {
                    tracing::warn!(path = %dir.path.display(), error = %e, "Failed to watch directory")
                }
            }
        }

        if watched == 0 {
            tracing::warn!("No directory could be watched, file watcher not started");
            return Ok(None);
        }

        tracing::info!(
            directories = watched,
            debounce_ms = config.debounce_ms,
            "File watcher started"
        );

        Ok(Some(Self {
            watcher,
            debouncer,
            watched,
            stop_timeout: config.stop_timeout(),
        }))
    }

    /// Number of directories being watched
    pub fn watched(&self) -> usize {
        self.watched
    }

    /// Stop watching and wait (bounded) for an in-flight callback.
    pub fn stop(self) {
        let FileWatcher {
            watcher,
            debouncer,
            stop_timeout,
            ..
        } = self;
        drop(watcher);

        if debouncer.shutdown(stop_timeout) {
            tracing::info!("File watcher stopped");
        } else {
            tracing::warn!(
                timeout_secs = stop_timeout.as_secs_f64(),
                "File watcher did not stop in time, detaching"
            );
        }
    }
}
