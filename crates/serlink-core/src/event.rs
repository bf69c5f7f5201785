use std::sync::atomic::{AtomicBool, Ordering};

/// Coalescing one-bit latch that moves an event out of interrupt context.
///
/// A callback running inside the dispatcher calls [`signal`](Self::signal);
/// the mainline calls [`take`](Self::take) and does the expensive work only
/// when it returns `true`. The release store in `signal` happens-before the
/// acquire swap in `take` that observes it, so anything the callback wrote
/// before signalling is visible to the mainline handler. Signalling several
/// times before a poll collapses into one event; no count is kept.
#[derive(Debug)]
pub struct DeferredEvent {
    pending: AtomicBool,
}

impl DeferredEvent {
    pub const fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
        }
    }

    pub fn signal(&self) {
        self.pending.store(true, Ordering::Release);
    }

    /// Reads and clears the latch in one step.
    pub fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

impl Default for DeferredEvent {
    fn default() -> Self {
        Self::new()
    }
}
