//! DataCondition - wakes threads waiting for the next sensor event
//!
//! Used by synchronous dump/wait paths outside the connection manager.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::lock;

/// Condition variable paired with an event sequence number
#[derive(Debug, Default)]
pub struct DataCondition {
    sequence: Mutex<u64>,
    condvar: Condvar,
}

impl DataCondition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one delivered event and wake a single waiter
    pub fn notify_one(&self) {
        *lock(&self.sequence) += 1;
        self.condvar.notify_one();
    }

    /// Number of notifications so far
    pub fn sequence(&self) -> u64 {
        *lock(&self.sequence)
    }

    /// Block until an event newer than `seen` is delivered or `timeout` elapses
    ///
    /// Returns the current sequence number, or `None` on timeout.
    pub fn wait_after(&self, seen: u64, timeout: Duration) -> Option<u64> {
        let guard = lock(&self.sequence);
        let (guard, result) = self
            .condvar
            .wait_timeout_while(guard, timeout, |seq| *seq <= seen)
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if result.timed_out() {
            None
        } else {
            Some(*guard)
        }
    }

    /// Block until the next event is delivered or `timeout` elapses
    pub fn wait_for_event(&self, timeout: Duration) -> bool {
        let seen = self.sequence();
        self.wait_after(seen, timeout).is_some()
    }
}
