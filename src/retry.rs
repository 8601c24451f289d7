//! Bounded retry counter shared by baseline retries and reconnects

use std::sync::atomic::{AtomicU32, Ordering};

/// Counts retry attempts for one operation class.
///
/// The count never exceeds `max` and never goes below zero. It is reset on
/// success by the owner.
#[derive(Debug)]
pub struct RetryCounter {
    count: AtomicU32,
    max: u32,
}

impl RetryCounter {
    /// Create a counter capped at `max` attempts
    pub fn new(max: u32) -> Self {
        Self {
            count: AtomicU32::new(0),
            max,
        }
    }

    /// Claim the next attempt.
    ///
    /// Returns the 1-based attempt number, or `None` once the cap is reached.
    pub fn try_increment(&self) -> Option<u32> {
        self.count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max).then_some(n + 1)
            })
            .ok()
            .map(|prev| prev + 1)
    }

    /// Reset after a successful operation
    pub fn reset(&self) {
        self.count.store(0, Ordering::Release);
    }

    /// Attempts used so far
    pub fn get(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    /// Configured cap
    pub fn max(&self) -> u32 {
        self.max
    }

    /// Whether no further attempt can be claimed
    pub fn is_exhausted(&self) -> bool {
        self.get() >= self.max
    }
}
