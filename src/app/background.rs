//! Background task handling for change-triggered analysis
//!
//! # Error Handling Patterns
//!
//! Channel sends use `let _ =`: if the receiver is gone nobody is listening
//! for the result, so there is nothing useful to do with the error.
//!
//! # Debounce register
//!
//! Each document identity owns at most one pending slot. Scheduling a new
//! analysis for an identity cancels the slot's token and replaces it, so
//! only the last edit in a burst survives the quiet period. Cancellation is
//! cooperative: a task notices it at its next await point.

use super::messages::ReactiveMessage;
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct PendingSlot {
    sequence: u64,
    cancel: CancellationToken,
}

/// What became of a slot when its task finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotRelease {
    /// The task still owned the slot; its result is current
    Released,
    /// A newer request for the same identity holds the slot
    Superseded,
    /// The slot was cleared by `cancel_all`
    Cancelled,
}

/// Single-slot-per-identity register of scheduled analyses
pub struct DebounceRegister {
    window: Duration,
    next_sequence: AtomicU64,
    pending: Mutex<HashMap<String, PendingSlot>>,
}

impl DebounceRegister {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            next_sequence: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Claim the slot for `identity`, cancelling whatever held it.
    ///
    /// Returns the new sequence number and the token the new task must watch.
    pub fn supersede(&self, identity: &str) -> (u64, CancellationToken) {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let cancel = CancellationToken::new();
        let previous = self.pending.lock().insert(
            identity.to_string(),
            PendingSlot {
                sequence,
                cancel: cancel.clone(),
            },
        );
        if let Some(previous) = previous {
            previous.cancel.cancel();
        }
        (sequence, cancel)
    }

    /// Free the slot if `sequence` still owns it
    pub fn release(&self, identity: &str, sequence: u64) -> SlotRelease {
        let mut pending = self.pending.lock();
        match pending.get(identity) {
            Some(slot) if slot.sequence == sequence => {
                pending.remove(identity);
                SlotRelease::Released
            }
            Some(_) => SlotRelease::Superseded,
            None => SlotRelease::Cancelled,
        }
    }

    /// Cancel every pending or running analysis
    pub fn cancel_all(&self) {
        for (_, slot) in self.pending.lock().drain() {
            slot.cancel.cancel();
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

/// Releases a slot when dropped unless [`SlotGuard::finish`] already did.
///
/// Keeps the register clean when a task is dropped or panics before it
/// reaches its own release.
pub struct SlotGuard<'a> {
    register: &'a DebounceRegister,
    identity: &'a str,
    sequence: u64,
    armed: bool,
}

impl<'a> SlotGuard<'a> {
    pub fn new(register: &'a DebounceRegister, identity: &'a str, sequence: u64) -> Self {
        Self {
            register,
            identity,
            sequence,
            armed: true,
        }
    }

    pub fn finish(mut self) -> SlotRelease {
        self.armed = false;
        self.register.release(self.identity, self.sequence)
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.register.release(self.identity, self.sequence);
        }
    }
}

/// Spawn a task, reporting a panic on the message channel instead of losing it
pub fn spawn_background<F>(
    tx: UnboundedSender<ReactiveMessage>,
    task_name: &'static str,
    fut: F,
) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(panic) = AssertUnwindSafe(fut).catch_unwind().await {
            let detail = if let Some(s) = panic.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic payload".to_string()
            };
            tracing::error!(task = task_name, %detail, "background task panicked");
            let _ = tx.send(ReactiveMessage::Crashed(format!(
                "Background task '{}' crashed unexpectedly: {}",
                task_name, detail
            )));
        }
    })
}
