// In src/SPSC/producer.rs
use crate::error::{QueueError, Result};
use crate::SPSC::Buffer::RingBuffer;
use crate::SPSC::Structs::Element;
use std::fmt;
use std::sync::Arc;

/// The write half of a ring buffer.
///
/// There is exactly one per ring. It may live in another thread, or in
/// another process when the ring sits in a mapped file, than its [`Consumer`](super::Consumer).
pub struct Producer<T: Element> {
    ring: Arc<RingBuffer<T>>,
}

impl<T: Element> Producer<T> {
    pub(crate) fn new(ring: Arc<RingBuffer<T>>) -> Self {
        Self { ring }
    }

    /// Enqueue `value` without blocking.
    ///
    /// # Returns
    /// * `Ok(true)` if the value was published
    /// * `Ok(false)` if the ring is full
    /// * `Err(QueueError::ReservedValue)` if `value` is the element's empty marker
    #[inline]
    pub fn try_enqueue(&mut self, value: T) -> Result<bool> {
        // Safety: `&mut self` on the only Producer makes this the single producer
        unsafe { self.ring.offer(value) }
    }

    /// Enqueue `value`, failing with [`QueueError::Full`] if there is no room.
    pub fn add(&mut self, value: T) -> Result<()> {
        if self.try_enqueue(value)? {
            Ok(())
        } else {
            Err(QueueError::Full)
        }
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

impl<T: Element> fmt::Debug for Producer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer").field("ring", &self.ring).finish()
    }
}
