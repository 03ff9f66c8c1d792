use std::fmt;

use crate::Core::aligned::AlignedStorage;
use crate::Core::SharedMemory::{MappedFile, SharedMemoryBackend};
use crate::SPSC::Buffer::RingBuffer;
use crate::SPSC::RunBarrier;

/// Debug function for AlignedStorage
///
/// Shows the aligned window, never its contents
pub fn debug_aligned_storage(storage: &AlignedStorage, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AlignedStorage")
        .field("ptr", &format_args!("{:p}", storage.as_ptr()))
        .field("len", &storage.len())
        .field("align", &storage.alignment())
        .finish()
}

/// Debug function for MappedFile
///
/// Shows:
/// - Backing file path
/// - Mapping address and length
/// - OS handle
/// - Whether the file is removed on drop
pub fn debug_mapped_file(file: &MappedFile, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MappedFile")
        .field("path", &file.path())
        .field("ptr", &format_args!("{:p}", file.as_ptr()))
        .field("size", &file.size())
        .field("handle", &file.raw_handle())
        .field("unlink_on_drop", &file.unlinks_on_drop())
        .finish()
}

/// Debug function for RingBuffer
///
/// Displays where the ring lives and how it is laid out without reading
/// the counters, which may be moving under another thread or process
pub fn debug_ring_buffer<T>(buffer: &RingBuffer<T>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let layout = &buffer.layout;
    f.debug_struct("RingBuffer")
        .field("region", &format_args!("0x{:x}", buffer.region.address()))
        .field("capacity", &layout.capacity)
        .field("element_size", &layout.element_size)
        .field("cache_line", &layout.cache_line)
        .field("clear_on_read", &buffer.clear_on_read)
        .finish_non_exhaustive()
}

pub fn debug_run_barrier(barrier: &RunBarrier, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RunBarrier")
        .field("phase", &barrier.phase())
        .field("pause", &barrier.policy().pause)
        .finish_non_exhaustive()
}
