//! Aggregate views assembled into each telemetry snapshot
//!
//! - [`performance`]: per-minute token and request rates from session logs
//! - [`collaboration`]: delegation / model-use / execution graph
//! - [`api_status`]: provider health from the model failure logs
//!
//! All of these are computed on demand from source files; nothing is stored
//! between snapshots.

pub mod api_status;
pub mod collaboration;
pub mod performance;

pub use api_status::{api_statuses, provider_for, ApiError, ApiStatus, HealthStatus};
pub use collaboration::{
    collaboration_graph, CollaborationEdge, CollaborationGraph, CollaborationNode, EdgeKind,
    NodeKind, NodeStatus,
};
pub use performance::{performance_stats, PerformanceStats};
