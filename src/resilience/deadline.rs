//! # Deadline Race
//!
//! Runs an operation against a timer. Both contenders are independent tasks
//! writing into one single-assignment slot: whichever settles first decides
//! the outcome and the other's write is discarded. The losing operation is
//! abandoned, not cancelled, and runs to completion on its own.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::trace;

/// Outcome of racing an operation against a deadline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled<T> {
    /// The operation finished before the deadline
    Completed(T),
    /// The deadline elapsed first
    DeadlineElapsed,
}

impl<T> Settled<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Settled::Completed(_))
    }
}

/// First writer wins; later writes are dropped
struct SettleSlot<T> {
    sender: Mutex<Option<oneshot::Sender<Settled<T>>>>,
}

impl<T> SettleSlot<T> {
    fn new() -> (Arc<Self>, oneshot::Receiver<Settled<T>>) {
        let (sender, receiver) = oneshot::channel();
        let slot = Arc::new(Self {
            sender: Mutex::new(Some(sender)),
        });
        (slot, receiver)
    }

    /// Returns false when the slot was already settled
    fn settle(&self, outcome: Settled<T>) -> bool {
        match self.sender.lock().take() {
            Some(sender) => {
                let _ = sender.send(outcome);
                true
            }
            None => false,
        }
    }
}

/// Race `operation` against `deadline`
///
/// Resolves no later than `deadline` (plus scheduling latency) regardless of
/// how long the operation takes.
pub async fn race_with_deadline<F, T>(operation: F, deadline: Duration) -> Settled<T>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let (slot, receiver) = SettleSlot::new();

    let operation_slot = Arc::clone(&slot);
    tokio::spawn(async move {
        let value = operation.await;
        if !operation_slot.settle(Settled::Completed(value)) {
            trace!("Operation settled after its deadline; result discarded");
        }
    });

    let timer_slot = slot;
    let timer = tokio::spawn(async move {
        tokio::time::sleep(deadline).await;
        if timer_slot.settle(Settled::DeadlineElapsed) {
            trace!(deadline_ms = deadline.as_millis() as u64, "Deadline elapsed first");
        }
    });

    let outcome = receiver.await.unwrap_or(Settled::DeadlineElapsed);
    if outcome.is_completed() {
        // The idle timer has nothing left to decide
        timer.abort();
    }
    outcome
}
