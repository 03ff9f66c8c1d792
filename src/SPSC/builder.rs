use std::path::{Path, PathBuf};
use std::time::Duration;

use super::handshake::SharedRegion;
use super::{Consumer, Producer, RunBarrier};
use crate::error::Result;
use crate::Core::retry::RetryPolicy;
use crate::Core::SharedMemory::DEFAULT_FILE_MODE;
use crate::SPSC::Buffer::layout::{RingBufferLayout, CACHE_LINE_SIZE};
use crate::SPSC::Structs::Element;

/// Backing file used when none is configured.
pub const DEFAULT_IPC_PATH: &str = "queue.ipc";

/// Requested capacity used when none is configured.
pub const DEFAULT_CAPACITY: usize = 32 * 1024;

/// Interval between checks for the backing file while attaching.
pub const ATTACH_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration for the two ends of a file-backed ring.
///
/// Both processes must agree on path, capacity, cache line and element type;
/// the consumer checks the last three against what the producer recorded.
#[derive(Debug, Clone)]
pub struct ChannelBuilder {
    pub(crate) path: PathBuf,
    pub(crate) capacity: usize,
    pub(crate) cache_line: usize,
    pub(crate) clear_on_read: bool,
    pub(crate) unlink_on_drop: bool,
    pub(crate) file_mode: u32,
    pub(crate) attach_policy: RetryPolicy,
    pub(crate) ready_policy: RetryPolicy,
    pub(crate) barrier_policy: RetryPolicy,
}

impl Default for ChannelBuilder {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_IPC_PATH),
            capacity: DEFAULT_CAPACITY,
            cache_line: CACHE_LINE_SIZE,
            clear_on_read: false,
            unlink_on_drop: true,
            file_mode: DEFAULT_FILE_MODE,
            attach_policy: RetryPolicy::sleep(ATTACH_POLL_INTERVAL),
            ready_policy: RetryPolicy::sleep(Duration::from_millis(1)),
            barrier_policy: RetryPolicy::yielding(),
        }
    }
}

impl ChannelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = path.as_ref().to_path_buf();
        self
    }

    /// Requested capacity; rounded up to a power of two.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_cache_line(mut self, cache_line: usize) -> Self {
        self.cache_line = cache_line;
        self
    }

    pub fn with_clear_on_read(mut self, enabled: bool) -> Self {
        self.clear_on_read = enabled;
        self
    }

    /// Remove the backing file when the producer's mapping goes away. On by
    /// default; a consumer that is already attached keeps its mapping.
    pub fn with_unlink_on_drop(mut self, enabled: bool) -> Self {
        self.unlink_on_drop = enabled;
        self
    }

    /// Permission bits for the file the producer creates, masked by the
    /// umask. The consumer needs read and write access.
    pub fn with_file_mode(mut self, mode: u32) -> Self {
        self.file_mode = mode;
        self
    }

    /// How the consumer waits for the file to appear and reach its size.
    pub fn with_attach_policy(mut self, policy: RetryPolicy) -> Self {
        self.attach_policy = policy;
        self
    }

    /// How the consumer waits for the producer's ready word.
    pub fn with_ready_policy(mut self, policy: RetryPolicy) -> Self {
        self.ready_policy = policy;
        self
    }

    /// Retry policy handed to the region's [`RunBarrier`].
    pub fn with_barrier_policy(mut self, policy: RetryPolicy) -> Self {
        self.barrier_policy = policy;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn layout<T: Element>(&self) -> Result<RingBufferLayout> {
        RingBufferLayout::for_element::<T>(self.capacity, self.cache_line)
    }

    /// Run the producer side of the handshake: create, size and map the file.
    pub fn build_producer<T: Element>(&self) -> Result<(Producer<T>, RunBarrier)> {
        let layout = self.layout::<T>()?;
        SharedRegion::create_with_mode(&self.path, layout, self.unlink_on_drop, self.file_mode)?.into_producer(self)
    }

    /// Run the consumer side of the handshake: wait for the file, map it.
    pub fn build_consumer<T: Element>(&self) -> Result<(Consumer<T>, RunBarrier)> {
        let layout = self.layout::<T>()?;
        SharedRegion::attach(&self.path, layout, self)?.into_consumer(self)
    }
}
