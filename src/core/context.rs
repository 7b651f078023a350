// Request-scoped cancellation and deadline.
//
// Purpose
// - Let a caller abort a store operation, either explicitly through a CancelHandle
//   or implicitly when a deadline passes.
//
// Responsibilities
// - Report whether the context is already done.
// - Race a storage future against cancellation and the deadline.
//
// Boundaries
// - No request values are carried here. The store does not persist ambient context.

use crate::core::errors::{CancelReason, EventStoreError};
use futures::future::select_all;
use std::future::{Future, pending};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, sleep_until};

#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    cancel: Vec<watch::Receiver<bool>>,
}

/// Cancels every context derived from the one it was created with.
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }
}

impl Context {
    pub fn background() -> Self {
        Self::default()
    }

    /// Keeps the earlier of the existing deadline and `now + timeout`.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn with_cancel(mut self) -> (Self, CancelHandle) {
        let (sender, receiver) = watch::channel(false);
        self.cancel.push(receiver);
        (self, CancelHandle { sender })
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Why the context is done, or `None` while it is still live.
    pub fn err(&self) -> Option<CancelReason> {
        if self.cancel.iter().any(|receiver| *receiver.borrow()) {
            return Some(CancelReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn check(&self) -> Result<(), EventStoreError> {
        match self.err() {
            Some(reason) => Err(EventStoreError::Cancelled { reason }),
            None => Ok(()),
        }
    }

    /// Resolves once the context is cancelled or its deadline passes. Never resolves otherwise.
    pub async fn done(&self) -> CancelReason {
        tokio::select! {
            _ = self.cancelled() => CancelReason::Cancelled,
            _ = self.expired() => CancelReason::DeadlineExceeded,
        }
    }

    /// Drive `operation` unless the context finishes first, in which case the
    /// operation is dropped and `Cancelled` is returned.
    pub async fn run<T, F>(&self, operation: F) -> Result<T, EventStoreError>
    where
        F: Future<Output = Result<T, EventStoreError>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            reason = self.done() => Err(EventStoreError::Cancelled { reason }),
            result = operation => result,
        }
    }

    async fn cancelled(&self) {
        if self.cancel.is_empty() {
            return pending().await;
        }
        let waits = self.cancel.iter().cloned().map(|mut receiver| {
            Box::pin(async move {
                let closed = receiver.wait_for(|cancelled| *cancelled).await.is_err();
                if closed {
                    // Handle dropped without cancelling: this source never fires.
                    pending::<()>().await;
                }
            })
        });
        select_all(waits).await;
    }

    async fn expired(&self) {
        match self.deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => pending().await,
        }
    }
}
