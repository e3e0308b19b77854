//! One subscriber connection as the hub sees it.
//!
//! ```text
//! Connecting ──► Open ──┬──► Closing(ByClient)    ──► Closed
//!                       └──► Closing(SendFailure) ──► Closed
//! ```
//!
//! The socket itself belongs to the server; the hub only holds the sending
//! half of the queue that feeds the socket's write task. The server waits on
//! [`Subscriber::closed`] to learn that the hub has dropped it.

use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Why a connection is closing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The client disconnected or sent a close frame
    ByClient,
    /// A send failed or timed out
    SendFailure,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::ByClient => "by_client",
            CloseReason::SendFailure => "send_failure",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing(CloseReason),
    Closed,
}

/// A registered (or registering) subscriber
#[derive(Debug)]
pub struct Subscriber {
    id: u64,
    tx: mpsc::Sender<String>,
    state: watch::Sender<ConnectionState>,
}

impl Subscriber {
    pub(crate) fn new(id: u64, tx: mpsc::Sender<String>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Connecting);
        Self { id, tx, state }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Only open connections receive broadcasts
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// `Connecting → Open`. Returns false if the connection already started
    /// closing.
    pub(crate) fn open(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == ConnectionState::Connecting {
                *state = ConnectionState::Open;
                true
            } else {
                false
            }
        })
    }

    /// Enter `Closing`. The first reason wins; returns false if the
    /// connection was already closing or closed.
    pub(crate) fn begin_close(&self, reason: CloseReason) -> bool {
        self.state.send_if_modified(|state| match *state {
            ConnectionState::Connecting | ConnectionState::Open => {
                *state = ConnectionState::Closing(reason);
                true
            }
            ConnectionState::Closing(_) | ConnectionState::Closed => false,
        })
    }

    pub(crate) fn close(&self) {
        self.state.send_replace(ConnectionState::Closed);
    }

    /// Resolves once the connection is `Closing` or `Closed`.
    pub async fn closed(&self) {
        let mut state = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close under us
        let _ = state
            .wait_for(|s| matches!(s, ConnectionState::Closing(_) | ConnectionState::Closed))
            .await;
    }

    /// Queue one text frame, waiting at most `timeout` for queue space.
    ///
    /// A full queue that does not drain in time, or a write task that has
    /// gone away, moves the connection to `Closing(SendFailure)`.
    pub async fn send(&self, text: String, timeout: Duration) -> bool {
        let delivered = matches!(
            tokio::time::timeout(timeout, self.tx.send(text)).await,
            Ok(Ok(()))
        );
        if !delivered {
            self.begin_close(CloseReason::SendFailure);
        }
        delivered
    }
}
