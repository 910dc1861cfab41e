// Latest-wins bookkeeping for overlapping fetches, and a cancellation flag for
// results that arrive after their consumer has gone away.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestTicket(u64);

impl RequestTicket {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Hands out monotonically increasing tickets. Only the newest ticket is current.
#[derive(Debug, Default)]
pub struct RequestSequencer {
    latest: AtomicU64,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> RequestTicket {
        RequestTicket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }

    /// Returns the result only if no newer request was issued meanwhile.
    pub fn accept<T>(&self, ticket: RequestTicket, result: T) -> Option<T> {
        if self.is_current(ticket) {
            Some(result)
        } else {
            tracing::debug!(ticket = ticket.0, latest = self.latest.load(Ordering::SeqCst), "Discarding stale result");
            None
        }
    }
}

/// Shared cancellation flag tied to the lifetime of whoever consumes a result.
#[derive(Debug, Clone, Default)]
pub struct LifecycleGuard {
    cancelled: Arc<AtomicBool>,
}

impl LifecycleGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Runs `commit` unless the guard was cancelled first.
    pub fn commit<T>(&self, value: T, commit: impl FnOnce(T)) -> bool {
        if self.is_cancelled() {
            return false;
        }
        commit(value);
        true
    }
}
