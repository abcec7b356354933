//! Tick scheduling
//!
//! Explicit schedule/cancel pair for the narration polling loop. At most one
//! tick is pending at any time; every schedule or cancel invalidates older
//! handles, so a tick delivered late by a host timer cannot act on a newer run.

/// Identifies one scheduled tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickHandle {
    generation: u64,
}

#[derive(Debug, Clone, Copy)]
struct PendingTick {
    handle: TickHandle,
    due_at: f64,
}

/// Single-slot tick scheduler
#[derive(Debug, Default)]
pub struct TickScheduler {
    generation: u64,
    pending: Option<PendingTick>,
}

impl TickScheduler {
    /// Create a scheduler with nothing pending
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule the next tick at clock time `due_at`, replacing any pending one.
    pub fn schedule(&mut self, due_at: f64) -> TickHandle {
        self.generation += 1;
        let handle = TickHandle {
            generation: self.generation,
        };
        self.pending = Some(PendingTick { handle, due_at });
        handle
    }

    /// Drop the pending tick. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        self.generation += 1;
        self.pending.take().is_some()
    }

    /// Pending tick handle
    pub fn pending(&self) -> Option<TickHandle> {
        self.pending.map(|p| p.handle)
    }

    /// Clock time the pending tick is due at
    pub fn due_at(&self) -> Option<f64> {
        self.pending.map(|p| p.due_at)
    }

    /// Take the pending tick if it is due at `now`.
    pub fn take_due(&mut self, now: f64) -> Option<TickHandle> {
        match self.pending {
            Some(pending) if pending.due_at <= now => {
                self.pending = None;
                Some(pending.handle)
            }
            _ => None,
        }
    }

    /// Take the pending tick if `handle` still refers to it.
    pub fn claim(&mut self, handle: TickHandle) -> bool {
        if self.pending.is_some_and(|p| p.handle == handle) {
            self.pending = None;
            true
        } else {
            false
        }
    }
}
