use std::fmt;
use std::marker::PhantomData;
use std::mem::size_of;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use super::layout::{RingBufferLayout, CACHE_LINE_SIZE};
use super::Buffer::{RingBuffer, Role};
use crate::error::{QueueError, Result};
use crate::Core::aligned::{is_aligned, AlignedStorage};
use crate::Core::region::RegionView;
use crate::Core::SharedMemory::SharedMemoryBackend;
use crate::SPSC::Structs::Element;
use crate::SPSC::{Consumer, Producer};

impl<T: Element> RingBuffer<T> {
    /// Heap-backed ring holding at least `requested_capacity` elements.
    pub fn new(requested_capacity: usize) -> Result<Self> {
        Self::with_cache_line(requested_capacity, CACHE_LINE_SIZE)
    }

    pub fn with_cache_line(requested_capacity: usize, cache_line: usize) -> Result<Self> {
        let layout = RingBufferLayout::for_element::<T>(requested_capacity, cache_line)?;
        let storage = AlignedStorage::allocate(layout.total_size, cache_line)?;
        // Safety: the storage is fresh and private to this ring
        unsafe { Self::over(Arc::new(storage), 0, layout, Role::Both) }
    }

    /// Create a ring view inside `backing`, starting `offset` bytes in.
    ///
    /// Only the control fields owned by `role` are zeroed; the other side's
    /// pair is left exactly as found.
    ///
    /// # Safety
    /// Across every view of the same memory, in any process, at most one may
    /// act as producer and at most one as consumer.
    pub unsafe fn over(
        backing: Arc<dyn SharedMemoryBackend>,
        offset: usize,
        layout: RingBufferLayout,
        role: Role,
    ) -> Result<Self> {
        if layout.element_size != size_of::<T>() {
            return Err(QueueError::LayoutMismatch {
                field: "element_size",
                expected: size_of::<T>() as u64,
                found: layout.element_size as u64,
            });
        }

        let region = RegionView::of(&*backing)?.sub(offset, layout.total_size)?;
        if !is_aligned(region.address(), layout.cache_line)? {
            return Err(QueueError::InvalidAlignment(layout.cache_line));
        }
        region.check::<AtomicU64>(layout.head_cache)?;
        region.check::<T>(layout.slot_offset(layout.mask))?;

        let ring = Self {
            region,
            layout,
            clear_on_read: false,
            _backing: backing,
            _marker: PhantomData,
        };
        ring.init(role);
        Ok(ring)
    }

    fn init(&self, role: Role) {
        let l = &self.layout;
        if role.produces() {
            self.region.store_plain(l.head_cache, 0);
            self.region.store_release(l.tail, 0);
        }
        if role.consumes() {
            self.region.store_plain(l.tail_cache, 0);
            self.region.store_release(l.head, 0);
        }
    }

    /// Overwrite slots with `T::EMPTY` once they have been read.
    pub fn with_clear_on_read(mut self, enabled: bool) -> Self {
        self.clear_on_read = enabled;
        self
    }

    pub fn capacity(&self) -> usize {
        self.layout.capacity
    }

    pub fn layout(&self) -> &RingBufferLayout {
        &self.layout
    }

    /// `tail - head`, clamped to `[0, capacity]`.
    ///
    /// Read from outside the producer/consumer pair this is a snapshot that
    /// may already be stale.
    pub fn size(&self) -> usize {
        let head = self.region.load_acquire(self.layout.head);
        let tail = self.region.load_acquire(self.layout.tail);
        (tail.saturating_sub(head) as usize).min(self.layout.capacity)
    }

    pub fn is_empty(&self) -> bool {
        let head = self.region.load_acquire(self.layout.head);
        self.region.load_acquire(self.layout.tail) <= head
    }

    /// Enqueue `value`, returning `Ok(false)` if the ring is full.
    pub fn try_enqueue(&mut self, value: T) -> Result<bool> {
        unsafe { self.offer(value) }
    }

    /// Enqueue `value`, failing with [`QueueError::Full`] if there is no room.
    pub fn add(&mut self, value: T) -> Result<()> {
        if self.try_enqueue(value)? {
            Ok(())
        } else {
            Err(QueueError::Full)
        }
    }

    pub fn try_dequeue(&mut self) -> Option<T> {
        unsafe { self.poll() }
    }

    /// Dequeue, failing with [`QueueError::Empty`] if the ring is empty.
    pub fn remove(&mut self) -> Result<T> {
        self.try_dequeue().ok_or(QueueError::Empty)
    }

    /// The next element without consuming it.
    pub fn peek(&mut self) -> Option<T> {
        unsafe { self.peek_head() }
    }

    pub fn element(&mut self) -> Result<T> {
        self.peek().ok_or(QueueError::Empty)
    }

    /// Dequeue until empty, returning how many elements were dropped.
    pub fn clear(&mut self) -> usize {
        unsafe { self.drain() }
    }

    /// Hand the two roles to separate threads.
    pub fn split(self) -> (Producer<T>, Consumer<T>) {
        let ring = Arc::new(self);
        (Producer::new(Arc::clone(&ring)), Consumer::new(ring))
    }

    /// The enqueue algorithm.
    ///
    /// # Safety
    /// Only the single producer may call this, never concurrently with itself.
    #[inline]
    pub(crate) unsafe fn offer(&self, value: T) -> Result<bool> {
        if T::EMPTY == Some(value) {
            return Err(QueueError::ReservedValue);
        }

        let l = &self.layout;
        let capacity = l.capacity as u64;
        let current_tail = self.region.load_plain(l.tail);

        // head_cache <= tail - capacity: the cached head says full, so refresh it
        if current_tail - self.region.load_plain(l.head_cache) >= capacity {
            let head = self.region.load_acquire(l.head);
            self.region.store_plain(l.head_cache, head);
            if current_tail - head >= capacity {
                return Ok(false);
            }
        }

        self.region.write(l.slot_offset(current_tail), value);
        self.region.store_release(l.tail, current_tail + 1);
        Ok(true)
    }

    /// The dequeue algorithm.
    ///
    /// # Safety
    /// Only the single consumer may call this, never concurrently with itself.
    #[inline]
    pub(crate) unsafe fn poll(&self) -> Option<T> {
        let l = &self.layout;
        let current_head = self.region.load_plain(l.head);

        if current_head >= self.region.load_plain(l.tail_cache) {
            let tail = self.region.load_acquire(l.tail);
            self.region.store_plain(l.tail_cache, tail);
            if current_head >= tail {
                return None;
            }
        }

        let offset = l.slot_offset(current_head);
        let value = self.region.read::<T>(offset);
        if self.clear_on_read {
            if let Some(empty) = T::EMPTY {
                self.region.write(offset, empty);
            }
        }
        self.region.store_release(l.head, current_head + 1);
        Some(value)
    }

    /// # Safety
    /// Consumer only, as for [`RingBuffer::poll`].
    #[inline]
    pub(crate) unsafe fn peek_head(&self) -> Option<T> {
        let l = &self.layout;
        let current_head = self.region.load_plain(l.head);

        if current_head >= self.region.load_plain(l.tail_cache) {
            let tail = self.region.load_acquire(l.tail);
            self.region.store_plain(l.tail_cache, tail);
            if current_head >= tail {
                return None;
            }
        }
        Some(self.region.read::<T>(l.slot_offset(current_head)))
    }

    /// # Safety
    /// Consumer only, as for [`RingBuffer::poll`].
    pub(crate) unsafe fn drain(&self) -> usize {
        let mut drained = 0;
        while self.poll().is_some() {
            drained += 1;
        }
        drained
    }
}

impl<T> fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_ring_buffer(self, f)
    }
}
