//! Cross-thread handoff from the watcher into the async runtime.
//!
//! The watcher side submits a [`RefreshRequest`] over a bounded channel and
//! waits, with a timeout, for the loop side to acknowledge completion. At
//! most one request is ever queued: a submit that finds the queue full is
//! folded into the queued request.

use crate::error::{Error, Result};
use std::future::Future;
use std::sync::mpsc as std_mpsc;
use std::time::Duration;
use tokio::sync::mpsc;

/// A pending refresh; acknowledge with [`RefreshRequest::complete`].
#[derive(Debug)]
pub struct RefreshRequest {
    ack: std_mpsc::SyncSender<()>,
}

impl RefreshRequest {
    pub fn complete(self) {
        // The submitter may have given up waiting
        let _ = self.ack.try_send(());
    }
}

/// What happened to a submitted refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffOutcome {
    /// The loop ran the refresh and acknowledged it
    Completed,
    /// A refresh was already queued and will cover this one
    Coalesced,
}

/// Watcher-side end of the handoff
#[derive(Debug, Clone)]
pub struct LoopHandoff {
    tx: mpsc::Sender<RefreshRequest>,
    timeout: Duration,
}

/// Loop-side end of the handoff
#[derive(Debug)]
pub struct RefreshReceiver {
    rx: mpsc::Receiver<RefreshRequest>,
}

impl LoopHandoff {
    /// Create a connected pair. `timeout` bounds how long [`submit`](Self::submit) blocks.
    pub fn channel(timeout: Duration) -> (LoopHandoff, RefreshReceiver) {
        let (tx, rx) = mpsc::channel(1);
        (LoopHandoff { tx, timeout }, RefreshReceiver { rx })
    }

    /// Submit a refresh and block until it completes or the timeout passes.
    ///
    /// Must be called from a plain OS thread, never from inside the runtime.
    /// On timeout the refresh is abandoned, not cancelled: the loop may
    /// still finish it later.
    pub fn submit(&self) -> Result<HandoffOutcome> {
        let (ack_tx, ack_rx) = std_mpsc::sync_channel(1);

        match self.tx.try_send(RefreshRequest { ack: ack_tx }) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => return Ok(HandoffOutcome::Coalesced),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                return Err(Error::Handoff("refresh loop has shut down".to_string()))
            }
        }

        match ack_rx.recv_timeout(self.timeout) {
            Ok(()) => Ok(HandoffOutcome::Completed),
            Err(std_mpsc::RecvTimeoutError::Timeout) => Err(Error::Handoff(format!(
                "refresh did not complete within {:?}",
                self.timeout
            ))),
            // Request dropped without an ack: the loop went away mid-refresh
            Err(std_mpsc::RecvTimeoutError::Disconnected) => Err(Error::Handoff(
                "refresh dropped before completion".to_string(),
            )),
        }
    }
}

impl RefreshReceiver {
    pub async fn recv(&mut self) -> Option<RefreshRequest> {
        self.rx.recv().await
    }

    /// Serve requests until every [`LoopHandoff`] is dropped.
    ///
    /// Refreshes run one at a time on the calling task.
    pub async fn serve<F, Fut>(mut self, mut refresh: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        while let Some(request) = self.recv().await {
            refresh().await;
            request.complete();
        }
        tracing::debug!("Refresh loop finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_submit_completes_after_refresh() {
        let (handoff, receiver) = LoopHandoff::channel(Duration::from_secs(5));
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        tokio::spawn(receiver.serve(move || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        }));

        let outcome = tokio::task::spawn_blocking(move || handoff.submit())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, HandoffOutcome::Completed);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_submit_times_out_on_slow_refresh() {
        let (handoff, receiver) = LoopHandoff::channel(Duration::from_millis(50));
        tokio::spawn(receiver.serve(|| tokio::time::sleep(Duration::from_millis(500))));

        let result = tokio::task::spawn_blocking(move || handoff.submit())
            .await
            .unwrap();
        assert!(matches!(result, Err(Error::Handoff(_))));
    }

    #[test]
    fn test_full_queue_coalesces() {
        let (handoff, _receiver) = LoopHandoff::channel(Duration::from_millis(10));
        // Nobody is serving: the first request stays queued and times out
        assert!(handoff.submit().is_err());
        assert_eq!(handoff.submit().unwrap(), HandoffOutcome::Coalesced);
    }

    #[test]
    fn test_closed_loop_is_an_error() {
        let (handoff, receiver) = LoopHandoff::channel(Duration::from_millis(10));
        drop(receiver);
        assert!(matches!(handoff.submit(), Err(Error::Handoff(_))));
    }
}
