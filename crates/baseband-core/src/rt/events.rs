//! Event mask shared between interrupt-style producers and the dispatcher.
//!
//! Producers `signal` bits; the dispatcher blocks in `wait_any` until at least
//! one bit of interest is pending, then consumes the pending bits it asked for.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Bit mask of pending events.
pub type EventMask = u32;

/// The baseband (app → baseband) mailbox has data.
pub const EVT_MASK_BASEBAND: EventMask = 1 << 0;
/// The active processor has spectrum data ready to publish.
pub const EVT_MASK_SPECTRUM: EventMask = 1 << 1;
/// Stop was requested.
pub const EVT_MASK_STOP: EventMask = 1 << 2;

/// Every event the dispatcher waits on.
pub const ALL_EVENTS: EventMask = EVT_MASK_BASEBAND | EVT_MASK_SPECTRUM | EVT_MASK_STOP;

/// Event flags with blocking wait.
#[derive(Debug, Default)]
pub struct EventFlags {
    pending: Mutex<EventMask>,
    cond: Condvar,
}

impl EventFlags {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, EventMask> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set `mask` bits and wake the waiter.
    pub fn signal(&self, mask: EventMask) {
        let mut pending = self.lock();
        *pending |= mask;
        self.cond.notify_all();
    }

    /// Block until any bit of `mask` is pending, clear those bits and return
    /// them. The wait is unbounded.
    pub fn wait_any(&self, mask: EventMask) -> EventMask {
        let mut pending = self.lock();
        while *pending & mask == 0 {
            pending = self
                .cond
                .wait(pending)
                .unwrap_or_else(PoisonError::into_inner);
        }
        let fired = *pending & mask;
        *pending &= !fired;
        fired
    }

    /// Consume pending bits of `mask` without blocking.
    pub fn take(&self, mask: EventMask) -> EventMask {
        let mut pending = self.lock();
        let fired = *pending & mask;
        *pending &= !fired;
        fired
    }

    /// Pending bits, without consuming them.
    pub fn pending(&self) -> EventMask {
        *self.lock()
    }
}
