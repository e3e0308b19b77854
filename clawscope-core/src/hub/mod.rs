//! Broadcast Hub: fan snapshots out to every live subscriber
//!
//! ```text
//!                 ┌────────────── BroadcastHub ───────────────┐
//! refresh ──────► │ broadcast_full_state()                    │
//! heartbeat ────► │   SnapshotSource::assemble (blocking)     │
//!  (every 8s      │   broadcast(Notification)                 │
//!   while any     │     ├─► sub 1 ─┐                          │
//!   subscriber)   │     ├─► sub 2 ─┼─ concurrent, each bounded│
//!                 │     └─► sub 3 ─┘   by send_timeout        │
//!                 │   remove failed subscribers after the pass│
//!                 └───────────────────────────────────────────┘
//! ```
//!
//! Membership is a mutex-protected map; it is never held across an await.
//! The heartbeat task starts with the first subscriber and is aborted when
//! the last one leaves.

mod connection;
mod notification;

pub use connection::{CloseReason, ConnectionState, Subscriber};
pub use notification::Notification;

use crate::analytics::ApiStatus;
use crate::config::HubConfig;
use crate::projection::SubagentRun;
use crate::snapshot::SnapshotSource;
use crate::types::AgentStatusRecord;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct BroadcastHub {
    source: Arc<dyn SnapshotSource>,
    heartbeat_every: Duration,
    send_timeout: Duration,
    conn_counter: AtomicU64,
    subscribers: Mutex<HashMap<u64, Arc<Subscriber>>>,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl BroadcastHub {
    pub fn new(source: Arc<dyn SnapshotSource>, config: &HubConfig) -> Arc<Self> {
        Self::with_intervals(source, config.heartbeat(), config.send_timeout())
    }

    pub fn with_intervals(
        source: Arc<dyn SnapshotSource>,
        heartbeat_every: Duration,
        send_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            source,
            heartbeat_every,
            send_timeout,
            conn_counter: AtomicU64::new(0),
            subscribers: Mutex::new(HashMap::new()),
            heartbeat: Mutex::new(None),
        })
    }

    /// Per-send bound used for every subscriber
    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    pub fn connection_count(&self) -> usize {
        lock(&self.subscribers).len()
    }

    /// Whether the heartbeat task is currently scheduled
    pub fn heartbeat_running(&self) -> bool {
        lock(&self.heartbeat)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn next_conn_id(&self) -> u64 {
        self.conn_counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Register a connection whose write task drains `tx`.
    ///
    /// The connection receives one `full_state` before it joins the
    /// broadcast set. Returns `None` if that first send fails; the
    /// connection is then already closed.
    pub async fn register(self: &Arc<Self>, tx: mpsc::Sender<String>) -> Option<Arc<Subscriber>> {
        let subscriber = Arc::new(Subscriber::new(self.next_conn_id(), tx));

        if let Some(text) = self.full_state_json().await {
            if !subscriber.send(text, self.send_timeout).await {
                tracing::warn!(conn_id = subscriber.id(), "Initial state send failed");
                subscriber.close();
                return None;
            }
        }

        if !subscriber.open() {
            subscriber.close();
            return None;
        }

        let connections = {
            let mut subscribers = lock(&self.subscribers);
            subscribers.insert(subscriber.id(), Arc::clone(&subscriber));
            self.ensure_heartbeat();
            subscribers.len()
        };
        tracing::info!(conn_id = subscriber.id(), connections, "Subscriber connected");
        Some(subscriber)
    }

    /// Remove a connection. Safe to call more than once.
    pub fn unregister(&self, id: u64, reason: CloseReason) {
        let (removed, connections) = {
            let mut subscribers = lock(&self.subscribers);
            let removed = subscribers.remove(&id);
            if subscribers.is_empty() {
                self.stop_heartbeat();
            }
            (removed, subscribers.len())
        };

        if let Some(subscriber) = removed {
            subscriber.begin_close(reason);
            subscriber.close();
            tracing::info!(
                conn_id = id,
                reason = reason.as_str(),
                connections,
                "Subscriber disconnected"
            );
        }
    }

    /// Deliver one notification to every open subscriber.
    ///
    /// Sends run concurrently; a slow or broken subscriber only costs its own
    /// send. Subscribers whose send failed are removed once every send has
    /// finished. Returns the number of successful deliveries.
    pub async fn broadcast(&self, notification: &Notification) -> usize {
        let text = match notification.to_json() {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(kind = notification.kind(), error = %e, "Failed to encode notification");
                return 0;
            }
        };

        let targets: Vec<Arc<Subscriber>> = lock(&self.subscribers)
            .values()
            .filter(|s| s.is_open())
            .cloned()
            .collect();
        if targets.is_empty() {
            return 0;
        }

        let results = join_all(
            targets
                .iter()
                .map(|sub| sub.send(text.clone(), self.send_timeout)),
        )
        .await;

        let mut delivered = 0;
        for (sub, ok) in targets.iter().zip(results) {
            if ok {
                delivered += 1;
            } else {
                tracing::warn!(conn_id = sub.id(), kind = notification.kind(), "Send failed, dropping subscriber");
                self.unregister(sub.id(), CloseReason::SendFailure);
            }
        }

        tracing::debug!(
            kind = notification.kind(),
            delivered,
            failed = targets.len() - delivered,
            "Broadcast complete"
        );
        delivered
    }

    /// Re-assemble the snapshot and broadcast it as `full_state`.
    pub async fn broadcast_full_state(&self) -> usize {
        if self.connection_count() == 0 {
            return 0;
        }
        match self.assemble().await {
            Some(notification) => self.broadcast(&notification).await,
            None => 0,
        }
    }

    pub async fn broadcast_agent_update(&self, agents: Vec<AgentStatusRecord>) -> usize {
        if self.connection_count() == 0 {
            return 0;
        }
        self.broadcast(&Notification::AgentUpdate(agents)).await
    }

    pub async fn broadcast_subagent_update(&self, runs: Vec<SubagentRun>) -> usize {
        if self.connection_count() == 0 {
            return 0;
        }
        self.broadcast(&Notification::SubagentUpdate(runs)).await
    }

    pub async fn broadcast_api_status_update(&self, statuses: Vec<ApiStatus>) -> usize {
        if self.connection_count() == 0 {
            return 0;
        }
        self.broadcast(&Notification::ApiStatusUpdate(statuses)).await
    }

    /// Close every connection and stop the heartbeat.
    pub fn shutdown(&self) {
        let drained: Vec<Arc<Subscriber>> = {
            let mut subscribers = lock(&self.subscribers);
            self.stop_heartbeat();
            subscribers.drain().map(|(_, s)| s).collect()
        };
        for subscriber in &drained {
            subscriber.begin_close(CloseReason::ByClient);
            subscriber.close();
        }
        tracing::info!(closed = drained.len(), "Broadcast hub shut down");
    }

    async fn assemble(&self) -> Option<Notification> {
        let source = Arc::clone(&self.source);
        match tokio::task::spawn_blocking(move || source.assemble()).await {
            Ok(snapshot) => Some(Notification::FullState(snapshot)),
            Err(e) => {
                tracing::warn!(error = %e, "Snapshot assembly failed");
                None
            }
        }
    }

    async fn full_state_json(&self) -> Option<String> {
        let notification = self.assemble().await?;
        match notification.to_json() {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode full state");
                None
            }
        }
    }

    /// Start the heartbeat if it is not running. Caller holds the
    /// subscriber lock.
    fn ensure_heartbeat(self: &Arc<Self>) {
        let mut heartbeat = lock(&self.heartbeat);
        if heartbeat.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        let hub = Arc::downgrade(self);
        *heartbeat = Some(tokio::spawn(heartbeat_loop(hub, self.heartbeat_every)));
        tracing::debug!(
            interval_secs = self.heartbeat_every.as_secs_f64(),
            "Heartbeat started"
        );
    }

    /// Caller holds the subscriber lock.
    fn stop_heartbeat(&self) {
        if let Some(handle) = lock(&self.heartbeat).take() {
            handle.abort();
            tracing::debug!("Heartbeat stopped");
        }
    }
}

async fn heartbeat_loop(hub: Weak<BroadcastHub>, every: Duration) {
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let Some(hub) = hub.upgrade() else {
            break;
        };
        if hub.connection_count() == 0 {
            break;
        }
        hub.broadcast_full_state().await;
    }
}
