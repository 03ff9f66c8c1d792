// src/SPSC/consumer.rs

use crate::error::{QueueError, Result};
use crate::SPSC::Buffer::RingBuffer;
use crate::SPSC::Structs::Element;
use std::fmt;
use std::sync::Arc;

/// The read half of a ring buffer.
///
/// Never blocks: an empty ring is reported as `None`, and callers that want to
/// wait spin or yield around [`Consumer::try_dequeue`] themselves.
pub struct Consumer<T: Element> {
    ring: Arc<RingBuffer<T>>,
}

impl<T: Element> Consumer<T> {
    pub(crate) fn new(ring: Arc<RingBuffer<T>>) -> Self {
        Self { ring }
    }

    /// Dequeue the oldest element, or `None` if the ring is empty.
    #[inline]
    pub fn try_dequeue(&mut self) -> Option<T> {
        // Safety: `&mut self` on the only Consumer makes this the single consumer
        unsafe { self.ring.poll() }
    }

    /// Dequeue, failing with [`QueueError::Empty`] if the ring is empty.
    pub fn remove(&mut self) -> Result<T> {
        self.try_dequeue().ok_or(QueueError::Empty)
    }

    /// The oldest element without consuming it.
    pub fn peek(&mut self) -> Option<T> {
        unsafe { self.ring.peek_head() }
    }

    pub fn element(&mut self) -> Result<T> {
        self.peek().ok_or(QueueError::Empty)
    }

    /// Dequeue until empty, returning how many elements were dropped.
    pub fn clear(&mut self) -> usize {
        unsafe { self.ring.drain() }
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Diagnostic snapshot of the number of queued elements.
    pub fn size(&self) -> usize {
        self.ring.size()
    }

    pub fn ring(&self) -> &RingBuffer<T> {
        &self.ring
    }
}

impl<T: Element> fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer").field("ring", &self.ring).finish()
    }
}
