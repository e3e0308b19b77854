//! Burst coalescing for change notifications.
//!
//! The timer state (last fire, pending deadline) is owned by one thread;
//! triggers reach it over a channel, so callers on any thread never touch
//! it directly.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

enum Command {
    Trigger,
    Shutdown,
}

/// Cheap, cloneable handle for sending triggers from other threads
#[derive(Clone)]
pub struct DebounceHandle {
    tx: mpsc::Sender<Command>,
}

impl DebounceHandle {
    /// Request a callback. Never blocks.
    pub fn trigger(&self) {
        // A closed channel means the debouncer is shutting down
        let _ = self.tx.send(Command::Trigger);
    }
}

/// Runs a callback at most once per quiet period.
///
/// - A trigger arriving at least `period` after the previous callback (or
///   before any callback) fires immediately.
/// - A trigger arriving sooner schedules one deferred callback at
///   `last_fire + period`; further triggers while it is pending fold into it.
pub struct Debouncer {
    handle: DebounceHandle,
    thread: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new<F>(period: Duration, callback: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let thread = std::thread::Builder::new()
            .name("clawscope-debounce".to_string())
            .spawn(move || run(rx, period, callback));

        let thread = match thread {
            Ok(thread) => Some(thread),
            Err(e) => {
                tracing::error!(error = %e, "Failed to spawn debounce thread");
                None
            }
        };

        Self {
            handle: DebounceHandle { tx },
            thread,
        }
    }

    pub fn handle(&self) -> DebounceHandle {
        self.handle.clone()
    }

    pub fn trigger(&self) {
        self.handle.trigger();
    }

    /// Stop the timer thread, waiting at most `wait` for it to exit.
    ///
    /// Returns `false` if the thread was still busy (typically inside a
    /// callback) when the wait ran out; it is then left to finish on its own.
    pub fn shutdown(mut self, wait: Duration) -> bool {
        let _ = self.handle.tx.send(Command::Shutdown);
        let Some(thread) = self.thread.take() else {
            return true;
        };

        let deadline = Instant::now() + wait;
        while !thread.is_finished() {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        let _ = thread.join();
        true
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        let _ = self.handle.tx.send(Command::Shutdown);
    }
}

fn run<F: FnMut()>(rx: mpsc::Receiver<Command>, period: Duration, mut callback: F) {
    let mut last_fire: Option<Instant> = None;
    let mut deadline: Option<Instant> = None;

    let mut fire = |last_fire: &mut Option<Instant>| {
        *last_fire = Some(Instant::now());
        if catch_unwind(AssertUnwindSafe(&mut callback)).is_err() {
            tracing::error!("Debounced callback panicked");
        }
    };

    loop {
        let command = match deadline {
            Some(at) => {
                let now = Instant::now();
                if at <= now {
                    deadline = None;
                    fire(&mut last_fire);
                    continue;
                }
                match rx.recv_timeout(at - now) {
                    Ok(command) => command,
                    Err(RecvTimeoutError::Timeout) => {
                        deadline = None;
                        fire(&mut last_fire);
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match rx.recv() {
                Ok(command) => command,
                Err(_) => break,
            },
        };

        match command {
            Command::Shutdown => break,
            Command::Trigger => {
                if deadline.is_some() {
                    tracing::trace!("Trigger coalesced into pending callback");
                    continue;
                }
                match last_fire {
                    Some(last) if last.elapsed() < period => {
                        deadline = Some(last + period);
                    }
                    _ => fire(&mut last_fire),
                }
            }
        }
    }

    tracing::debug!("Debounce thread exiting");
}
