use std::mem::{align_of, size_of};

use crate::error::{QueueError, Result};

/// Default cache line size the control fields are spread across.
pub const CACHE_LINE_SIZE: usize = 64;

/// Number of cache lines reserved for control fields ahead of the elements.
pub const CONTROL_LINES: usize = 4;

/// Byte offsets of one ring buffer inside an aligned region.
///
/// ```text
/// [0, L/2-8)             padding
/// [L/2-8, +8)            head        (consumer)
/// [+L, +L+8)             tail_cache  (consumer)
/// [+2L, +2L+8)           tail        (producer)
/// [+3L, +3L+8)           head_cache  (producer)
/// [4L, 4L + capacity*E)  elements
/// ```
///
/// Each counter sits in the middle of its own line, so the producer's pair and
/// the consumer's pair never share a line with each other or with slot data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingBufferLayout {
    pub capacity: usize,
    pub mask: u64,
    pub cache_line: usize,
    pub element_size: usize,
    pub head: usize,
    pub tail_cache: usize,
    pub tail: usize,
    pub head_cache: usize,
    pub elements: usize,
    pub total_size: usize,
}

impl RingBufferLayout {
    /// Layout for `requested_capacity` elements of `element_size` bytes on 64-byte lines.
    pub fn new(requested_capacity: usize, element_size: usize) -> Result<Self> {
        Self::with_cache_line(requested_capacity, element_size, CACHE_LINE_SIZE)
    }

    pub fn with_cache_line(
        requested_capacity: usize,
        element_size: usize,
        cache_line: usize,
    ) -> Result<Self> {
        if !cache_line.is_power_of_two() || cache_line < 16 {
            return Err(QueueError::InvalidCacheLine(cache_line));
        }
        if element_size == 0 {
            return Err(QueueError::ZeroSizedElement);
        }
        let capacity = next_power_of_two(requested_capacity)?;

        let head = cache_line / 2 - 8;
        let tail_cache = head + cache_line;
        let tail = tail_cache + cache_line;
        let head_cache = tail + cache_line;
        let elements = CONTROL_LINES * cache_line;

        let total_size = capacity
            .checked_mul(element_size)
            .and_then(|bytes| bytes.checked_add(elements))
            .ok_or(QueueError::CapacityOverflow(requested_capacity))?;

        Ok(Self {
            capacity,
            mask: (capacity - 1) as u64,
            cache_line,
            element_size,
            head,
            tail_cache,
            tail,
            head_cache,
            elements,
            total_size,
        })
    }

    /// Layout sized for `T`, rejecting types the slots cannot hold aligned.
    pub fn for_element<T>(requested_capacity: usize, cache_line: usize) -> Result<Self> {
        if align_of::<T>() > cache_line {
            return Err(QueueError::ElementAlignment {
                align: align_of::<T>(),
                cache_line,
            });
        }
        Self::with_cache_line(requested_capacity, size_of::<T>(), cache_line)
    }

    /// Byte offset of the slot a sequence number maps to.
    #[inline(always)]
    pub fn slot_offset(&self, sequence: u64) -> usize {
        self.elements + (sequence & self.mask) as usize * self.element_size
    }
}

/// Smallest power of two `>= value`; 1 stays 1.
pub fn next_power_of_two(value: usize) -> Result<usize> {
    if value < 1 {
        return Err(QueueError::InvalidCapacity(value));
    }
    value
        .checked_next_power_of_two()
        .ok_or(QueueError::CapacityOverflow(value))
}
