//! Bounded ingress buffer
//!
//! FIFO between the socket reader and the dispatcher. When full, the oldest
//! tick is evicted to admit the new one; the producer never blocks.

use super::IngressMessage;
use crate::telemetry::{self, CounterMetric, GaugeMetric};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Default number of buffered ticks
pub const DEFAULT_CAPACITY: usize = 100;

/// Drop-oldest bounded FIFO, safe to share between producer and consumer
#[derive(Debug)]
pub struct IngressBuffer {
    queue: Mutex<VecDeque<IngressMessage>>,
    capacity: usize,
}

impl IngressBuffer {
    /// Create a buffer holding at most `capacity` ticks (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Enqueue a tick, evicting the oldest one when full.
    ///
    /// Returns the evicted tick, if any.
    pub fn push(&self, msg: IngressMessage) -> Option<IngressMessage> {
        let mut queue = self.queue.lock();
        let evicted = if queue.len() >= self.capacity {
            queue.pop_front()
        } else {
            None
        };
        queue.push_back(msg);
        let depth = queue.len();
        drop(queue);

        if evicted.is_some() {
            telemetry::increment(CounterMetric::TicksEvicted);
        }
        telemetry::set_gauge(GaugeMetric::BufferDepth, depth as f64);
        evicted
    }

    /// Dequeue the oldest tick without waiting
    pub fn pop(&self) -> Option<IngressMessage> {
        self.queue.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Discard everything buffered
    pub fn clear(&self) {
        self.queue.lock().clear();
    }
}

impl Default for IngressBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
