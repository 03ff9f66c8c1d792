// Typed access to a raw shared region by byte offset.
//
// Every pointer computation over ring or header memory goes through here;
// the rest of the crate only names offsets.

use std::mem::{align_of, size_of};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use super::SharedMemory::SharedMemoryBackend;
use crate::error::{QueueError, Result};

/// A window `[base, base + len)` over memory owned by a [`SharedMemoryBackend`].
///
/// The view does not keep the memory alive; whoever holds one also holds the
/// backend (usually through an `Arc`).
#[derive(Clone, Copy)]
pub struct RegionView {
    base: NonNull<u8>,
    len: usize,
}

unsafe impl Send for RegionView {}
unsafe impl Sync for RegionView {}

impl RegionView {
    /// # Safety
    /// `base` must be valid for reads and writes of `len` bytes for as long as
    /// the view (or anything derived from it) is used.
    pub unsafe fn new(base: *mut u8, len: usize) -> Result<Self> {
        let base = NonNull::new(base).ok_or(QueueError::RegionTooSmall {
            needed: len,
            available: 0,
        })?;
        Ok(Self { base, len })
    }

    pub fn of(backend: &dyn SharedMemoryBackend) -> Result<Self> {
        unsafe { Self::new(backend.as_ptr(), backend.size()) }
    }

    /// Narrows the view to `[offset, offset + len)`.
    pub fn sub(&self, offset: usize, len: usize) -> Result<Self> {
        let end = offset.checked_add(len).unwrap_or(usize::MAX);
        if end > self.len {
            return Err(QueueError::RegionTooSmall {
                needed: end,
                available: self.len,
            });
        }
        Ok(Self {
            base: unsafe { NonNull::new_unchecked(self.base.as_ptr().add(offset)) },
            len,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn address(&self) -> usize {
        self.base.as_ptr() as usize
    }

    #[inline(always)]
    fn at<T>(&self, offset: usize) -> *mut T {
        debug_assert!(offset + size_of::<T>() <= self.len, "offset {offset} out of bounds");
        let ptr = unsafe { self.base.as_ptr().add(offset) };
        debug_assert_eq!(ptr as usize % align_of::<T>(), 0, "misaligned offset {offset}");
        ptr as *mut T
    }

    /// Checks that a `T` fits at `offset` with its natural alignment.
    pub fn check<T>(&self, offset: usize) -> Result<()> {
        let end = offset.checked_add(size_of::<T>()).unwrap_or(usize::MAX);
        if end > self.len {
            return Err(QueueError::RegionTooSmall {
                needed: end,
                available: self.len,
            });
        }
        if (self.address() + offset) % align_of::<T>() != 0 {
            return Err(QueueError::InvalidAlignment(align_of::<T>()));
        }
        Ok(())
    }

    #[inline(always)]
    pub fn atomic_u64(&self, offset: usize) -> &AtomicU64 {
        unsafe { &*self.at::<AtomicU64>(offset) }
    }

    #[inline(always)]
    pub fn atomic_i64(&self, offset: usize) -> &AtomicI64 {
        unsafe { &*self.at::<AtomicI64>(offset) }
    }

    /// Synchronizing read of a counter published by the other side.
    #[inline(always)]
    pub fn load_acquire(&self, offset: usize) -> u64 {
        self.atomic_u64(offset).load(Ordering::Acquire)
    }

    /// Ordered publication: earlier writes become visible no later than this value.
    #[inline(always)]
    pub fn store_release(&self, offset: usize, value: u64) {
        self.atomic_u64(offset).store(value, Ordering::Release)
    }

    /// Read of a field only this side writes.
    #[inline(always)]
    pub fn load_plain(&self, offset: usize) -> u64 {
        self.atomic_u64(offset).load(Ordering::Relaxed)
    }

    #[inline(always)]
    pub fn store_plain(&self, offset: usize, value: u64) {
        self.atomic_u64(offset).store(value, Ordering::Relaxed)
    }

    /// Reads a `T` stored at `offset`.
    ///
    /// # Safety
    /// The bytes at `offset` must hold a valid `T` and no other party may be
    /// writing them concurrently.
    #[inline(always)]
    pub unsafe fn read<T: Copy>(&self, offset: usize) -> T {
        self.at::<T>(offset).read()
    }

    /// # Safety
    /// No other party may be reading or writing the bytes at `offset`.
    #[inline(always)]
    pub unsafe fn write<T: Copy>(&self, offset: usize, value: T) {
        self.at::<T>(offset).write(value)
    }

    /// Shared reference to a `T` at `offset`.
    ///
    /// # Safety
    /// `T` must be valid for any bit pattern the region may hold and only allow
    /// mutation through interior mutability (atomics). The caller picks `'a`
    /// and must keep the backing memory mapped for that long.
    pub unsafe fn view<'a, T>(&self, offset: usize) -> Result<&'a T> {
        self.check::<T>(offset)?;
        Ok(&*self.at::<T>(offset))
    }

    /// Reads one byte on every page so the region is resident before use.
    pub fn touch_pages(&self, page_size: usize) {
        let mut offset = 0;
        while offset < self.len {
            unsafe { std::ptr::read_volatile(self.base.as_ptr().add(offset)) };
            offset += page_size;
        }
    }
}
