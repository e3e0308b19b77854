//! # clawscope-core
//!
//! Core library for clawscope - a live telemetry view of an OpenClaw
//! multi-agent runtime.
//!
//! This library provides:
//! - Domain types for usage events, runs, tasks and agent status
//! - Readers for the runtime's on-disk artifacts (session logs, run
//!   registry, agent roster, failure logs)
//! - A durable task history journal
//! - A debounced file watcher and a broadcast hub for live subscribers
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Data flows from the filesystem to subscribers:
//! - **Sources:** files owned by the runtime, read-only (`sources`, `ingest`)
//! - **Derived:** status, task projections, analytics (recomputed per snapshot)
//! - **Durable:** the task history journal, the only file this crate writes
//! - **Delivery:** the watcher triggers a refresh, the hub fans it out
//!
//! ## Example
//!
//! ```rust,no_run
//! use clawscope_core::{Config, SnapshotAssembler, SnapshotSource};
//!
//! let config = Config::load().expect("failed to load config");
//! let snapshot = SnapshotAssembler::new(&config).assemble();
//! println!("{} agents", snapshot.agents.map_or(0, |a| a.len()));
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use error::{Error, Result};
pub use history::TaskHistory;
pub use hub::{BroadcastHub, CloseReason, Notification};
pub use snapshot::{SnapshotAssembler, SnapshotSource, TelemetrySnapshot};
pub use status::StatusCalculator;
pub use types::*;

// Public modules
pub mod analytics;
pub mod config;
pub mod error;
pub mod format;
pub mod history;
pub mod hub;
pub mod ingest;
pub mod logging;
pub mod projection;
pub mod snapshot;
pub mod sources;
pub mod status;
pub mod types;
pub mod watcher;
