//! Registry of threads currently blocked on a future.
//!
//! A reader registers while it still holds the future's state lock and
//! deregisters (through [`WaiterGuard`]) once it wakes, so a reset that runs
//! [`WaiterRegistry::interrupt_all`] sees every reader that could otherwise
//! block forever. Entries hold weak references; the registry never keeps a
//! future alive.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::tracing_compat::trace;
use crate::types::{CancelReason, FutureId};

/// Something a blocked reader is waiting on.
pub(crate) trait Waiter: Send + Sync {
    /// Writes an interrupted outcome if still pending; returns true if it did.
    fn interrupt_waiter(&self, reason: &CancelReason) -> bool;

    /// Wakes blocked readers without writing an outcome.
    fn wake_waiter(&self);
}

/// Tracks futures with at least one blocked reader.
#[derive(Default)]
pub struct WaiterRegistry {
    next_slot: AtomicU64,
    entries: Mutex<HashMap<u64, (FutureId, Weak<dyn Waiter>)>>,
}

impl WaiterRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(
        self: &Arc<Self>,
        future: FutureId,
        waiter: Weak<dyn Waiter>,
    ) -> WaiterGuard {
        let slot = self.next_slot.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().insert(slot, (future, waiter));
        trace!(future = %future, slot, "waiter registered");
        WaiterGuard {
            registry: Arc::clone(self),
            slot,
        }
    }

    /// Number of readers currently blocked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nobody is blocked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Interrupts every registered future that is still pending.
    ///
    /// Returns the number of futures this call moved to `Interrupted`.
    /// Several readers of one future count once.
    pub fn interrupt_all(&self, reason: &CancelReason) -> usize {
        let snapshot: Vec<(FutureId, Weak<dyn Waiter>)> =
            self.entries.lock().values().cloned().collect();
        let mut interrupted = 0;
        for (future, weak) in snapshot {
            let Some(waiter) = weak.upgrade() else {
                continue;
            };
            if waiter.interrupt_waiter(reason) {
                trace!(future = %future, reason = %reason, "blocked waiter interrupted");
                interrupted += 1;
            }
        }
        interrupted
    }

    /// Wakes every registered reader so it re-checks its abort token.
    ///
    /// Returns the number of readers woken.
    pub(crate) fn wake_all(&self) -> usize {
        let snapshot: Vec<(FutureId, Weak<dyn Waiter>)> =
            self.entries.lock().values().cloned().collect();
        let mut woken = 0;
        for (future, weak) in snapshot {
            if let Some(waiter) = weak.upgrade() {
                trace!(future = %future, "blocked waiter woken");
                waiter.wake_waiter();
                woken += 1;
            }
        }
        woken
    }

    fn remove(&self, slot: u64) {
        self.entries.lock().remove(&slot);
    }
}

impl std::fmt::Debug for WaiterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaiterRegistry")
            .field("blocked", &self.len())
            .finish_non_exhaustive()
    }
}

/// Removes a registry entry when the reader stops waiting.
pub(crate) struct WaiterGuard {
    registry: Arc<WaiterRegistry>,
    slot: u64,
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        self.registry.remove(self.slot);
    }
}
