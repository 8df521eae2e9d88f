//! Write-Once Rendezvous
//!
//! A single-producer/single-consumer hand-off of one value. The producer
//! publishes exactly once; a consumer either finds the value already there
//! or yields the CPU until it appears. Value and "signalled" are the same
//! atomic state, so a waiter can never see the signal without the value.

use spin::Once;

use crate::kernel::Scheduler;

/// One-shot value cell with a blocking wait.
pub struct Rendezvous<T> {
    slot: Once<T>,
}

impl<T: Copy> Rendezvous<T> {
    /// Create an empty cell.
    pub const fn new() -> Self {
        Self { slot: Once::new() }
    }

    /// Publish the value.
    ///
    /// Returns `false` and leaves the cell untouched if a value was
    /// already published.
    pub fn publish(&self, value: T) -> bool {
        let mut first = false;
        self.slot.call_once(|| {
            first = true;
            value
        });
        first
    }

    /// The published value, if any.
    pub fn get(&self) -> Option<T> {
        self.slot.poll().copied()
    }

    /// Check whether a value was published.
    pub fn is_set(&self) -> bool {
        self.slot.is_completed()
    }

    /// Block until a value is published and return it.
    pub fn wait(&self, scheduler: &dyn Scheduler) -> T {
        loop {
            if let Some(value) = self.get() {
                return value;
            }
            scheduler.yield_now();
        }
    }
}

impl<T: Copy> Default for Rendezvous<T> {
    fn default() -> Self {
        Self::new()
    }
}
