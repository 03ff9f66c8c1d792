#[allow(non_snake_case)]
pub mod SharedMemory;
pub mod aligned;
pub mod region;
pub mod retry;

pub use aligned::{
    aligned_slice, is_aligned, is_cache_aligned, is_page_aligned, page_size, AlignedStorage,
};
pub use region::RegionView;
pub use retry::{Pause, RetryPolicy};
pub use SharedMemory::{extend_with_zeros, MappedFile, RawHandle, SharedMemoryBackend, DEFAULT_FILE_MODE, EXTEND_CHUNK};
