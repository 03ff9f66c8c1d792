// Over-allocated heap storage whose usable window starts on an aligned address

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::fmt;
use std::ptr::NonNull;

use super::SharedMemory::{RawHandle, SharedMemoryBackend};
use crate::error::{QueueError, Result};
use crate::SPSC::Buffer::layout::CACHE_LINE_SIZE;

/// Zero-filled heap region of exactly `size` bytes starting on an `align` boundary.
///
/// The allocation is `size + align` bytes with byte alignment; the aligned
/// window is sliced out of it. Used as the backing memory of single-process
/// ring buffers.
pub struct AlignedStorage {
    raw: NonNull<u8>,
    raw_layout: Layout,
    offset: usize,
    size: usize,
    align: usize,
}

// The storage is plain bytes; concurrent access is mediated by the ring's atomics.
unsafe impl Send for AlignedStorage {}
unsafe impl Sync for AlignedStorage {}

impl AlignedStorage {
    pub fn allocate(size: usize, align: usize) -> Result<Self> {
        check_alignment(align)?;
        let total = size
            .checked_add(align)
            .ok_or(QueueError::RegionTooSmall {
                needed: size,
                available: usize::MAX,
            })?;
        let raw_layout = Layout::from_size_align(total, 1)
            .map_err(|_| QueueError::InvalidAlignment(align))?;

        let raw = unsafe { alloc_zeroed(raw_layout) };
        let raw = match NonNull::new(raw) {
            Some(raw) => raw,
            None => std::alloc::handle_alloc_error(raw_layout),
        };

        let address = raw.as_ptr() as usize;
        let offset = align_up(address, align) - address;

        Ok(Self {
            raw,
            raw_layout,
            offset,
            size,
            align,
        })
    }

    /// Cache-line aligned storage, the common case for ring buffers.
    pub fn cache_aligned(size: usize) -> Result<Self> {
        Self::allocate(size, CACHE_LINE_SIZE)
    }

    pub fn alignment(&self) -> usize {
        self.align
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

impl Drop for AlignedStorage {
    fn drop(&mut self) {
        unsafe { dealloc(self.raw.as_ptr(), self.raw_layout) };
    }
}

impl SharedMemoryBackend for AlignedStorage {
    fn as_ptr(&self) -> *mut u8 {
        unsafe { self.raw.as_ptr().add(self.offset) }
    }

    fn size(&self) -> usize {
        self.size
    }

    fn raw_handle(&self) -> RawHandle {
        RawHandle::Heap
    }
}

impl fmt::Debug for AlignedStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_aligned_storage(self, f)
    }
}

/// Returns the `size`-byte window of `buf` that starts on an `align` boundary.
pub fn aligned_slice(buf: &mut [u8], size: usize, align: usize) -> Result<&mut [u8]> {
    check_alignment(align)?;
    let address = buf.as_ptr() as usize;
    let offset = align_up(address, align) - address;
    let available = buf.len().saturating_sub(offset);
    if available < size {
        return Err(QueueError::RegionTooSmall {
            needed: offset + size,
            available: buf.len(),
        });
    }
    Ok(&mut buf[offset..offset + size])
}

pub fn is_aligned(address: usize, align: usize) -> Result<bool> {
    check_alignment(align)?;
    Ok(address & (align - 1) == 0)
}

/// Assumes the 64-byte line of [`CACHE_LINE_SIZE`].
pub fn is_cache_aligned(address: usize) -> bool {
    address & (CACHE_LINE_SIZE - 1) == 0
}

pub fn is_page_aligned(address: usize) -> bool {
    address & (page_size() - 1) == 0
}

/// The operating system page size, 4096 when it cannot be queried.
pub fn page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        4096
    }
}

#[inline]
pub(crate) fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

fn check_alignment(align: usize) -> Result<()> {
    if align.is_power_of_two() {
        Ok(())
    } else {
        Err(QueueError::InvalidAlignment(align))
    }
}
