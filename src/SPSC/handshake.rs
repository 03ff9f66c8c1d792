//! Bootstrapping a ring inside a file shared by two processes.
//!
//! File layout:
//!
//! ```text
//! [0, HEADER_SIZE)                  SyncHeader (phase, ready, geometry)
//! [R, R + 4L)                       ring control lines
//! [R + 4L, R + 4L + capacity * E)   elements
//!
//! R = HEADER_SIZE rounded up to L (so R = HEADER_SIZE for L <= 64)
//! ```
//!
//! The producer creates and sizes the file, initializes the header and its own
//! pair of control fields (`tail`, `head_cache`), and then publishes the ready
//! word. The consumer waits for the file to reach the minimum size and for the
//! ready word, checks the geometry, swaps the ready word to the claimed value
//! and initializes its pair (`head`, `tail_cache`). Neither side touches the
//! other's fields.

use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::builder::ChannelBuilder;
use crate::error::{QueueError, Result};
use crate::Core::aligned::align_up;
use crate::Core::region::RegionView;
use crate::Core::SharedMemory::{MappedFile, SharedMemoryBackend, DEFAULT_FILE_MODE};
use crate::SPSC::Buffer::layout::RingBufferLayout;
use crate::SPSC::Buffer::{RingBuffer, Role};
use crate::SPSC::Structs::{Element, SyncHeader, HEADER_SIZE, PHASE_NOT_STARTED, READY_CLAIMED, READY_MAGIC};
use crate::SPSC::{Consumer, Producer, RunBarrier};

/// Where the ring starts in the file: right after the header, rounded up to
/// the ring's cache line.
pub fn ring_offset(layout: &RingBufferLayout) -> usize {
    align_up(HEADER_SIZE, layout.cache_line)
}

/// Bytes the backing file must hold for `layout`.
pub fn minimum_size(layout: &RingBufferLayout) -> usize {
    ring_offset(layout) + layout.total_size
}

/// One process's mapping of the backing file.
pub struct SharedRegion {
    file: Arc<MappedFile>,
    layout: RingBufferLayout,
}

impl SharedRegion {
    /// Producer side: create the file, map it, page it in, reset the header.
    ///
    /// The ready word stays zero until [`SharedRegion::into_producer`].
    pub fn create(path: &Path, layout: RingBufferLayout, unlink_on_drop: bool) -> Result<Self> {
        Self::create_with_mode(path, layout, unlink_on_drop, DEFAULT_FILE_MODE)
    }

    pub fn create_with_mode(
        path: &Path,
        layout: RingBufferLayout,
        unlink_on_drop: bool,
        mode: u32,
    ) -> Result<Self> {
        let file = MappedFile::create_with_mode(path, minimum_size(&layout), unlink_on_drop, mode)?;
        file.load()?;

        let region = Self {
            file: Arc::new(file),
            layout,
        };
        let header = region.header()?;
        header.ready.store(0, Ordering::Relaxed);
        header.phase.store(PHASE_NOT_STARTED, Ordering::Relaxed);
        header.capacity.store(layout.capacity as u64, Ordering::Relaxed);
        header.element_size.store(layout.element_size as u64, Ordering::Relaxed);
        header.cache_line.store(layout.cache_line as u64, Ordering::Relaxed);
        Ok(region)
    }

    /// Consumer side: wait for the file, map it, page it in, wait for the ready
    /// word, check the producer laid out the same ring and claim it.
    ///
    /// A file that is already claimed belongs to an earlier session. The
    /// consumer keeps waiting on it until a producer replaces it, then maps
    /// the new file.
    pub fn attach(path: &Path, layout: RingBufferLayout, builder: &ChannelBuilder) -> Result<Self> {
        log::info!("[SPSC] waiting for {} to reach {} bytes", path.display(), minimum_size(&layout));
        loop {
            let file = MappedFile::wait_and_open(path, minimum_size(&layout), &builder.attach_policy)?;
            file.load()?;

            let region = Self {
                file: Arc::new(file),
                layout,
            };
            if region.claim(builder)? {
                return Ok(region);
            }
            log::debug!("[SPSC] {} was replaced, mapping the new file", path.display());
        }
    }

    /// `Ok(true)` once this consumer owns the region, `Ok(false)` if the file
    /// was removed or replaced while waiting.
    fn claim(&self, builder: &ChannelBuilder) -> Result<bool> {
        let header = self.header()?;
        builder.ready_policy.run("producer ready", || {
            if header.ready.load(Ordering::Acquire) == READY_MAGIC {
                self.check_geometry(header)?;
                if header
                    .ready
                    .compare_exchange(READY_MAGIC, READY_CLAIMED, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    return Ok(Some(true));
                }
            }
            if !self.file.is_current()? {
                return Ok(Some(false));
            }
            Ok(None)
        })
    }

    fn check_geometry(&self, header: &SyncHeader) -> Result<()> {
        let checks = [
            ("capacity", self.layout.capacity as u64, &header.capacity),
            ("element_size", self.layout.element_size as u64, &header.element_size),
            ("cache_line", self.layout.cache_line as u64, &header.cache_line),
        ];
        for (field, expected, word) in checks {
            let found = word.load(Ordering::Relaxed);
            if found != expected {
                return Err(QueueError::LayoutMismatch {
                    field,
                    expected,
                    found,
                });
            }
        }
        Ok(())
    }

    pub fn header(&self) -> Result<&SyncHeader> {
        // Safety: SyncHeader is all atomics, valid for any bit pattern
        unsafe { RegionView::of(&*self.file)?.view::<SyncHeader>(0) }
    }

    pub fn layout(&self) -> &RingBufferLayout {
        &self.layout
    }

    pub fn file(&self) -> &MappedFile {
        &self.file
    }

    pub fn barrier(&self, builder: &ChannelBuilder) -> Result<RunBarrier> {
        let backing: Arc<dyn SharedMemoryBackend> = self.file.clone();
        RunBarrier::over(backing, 0, builder.barrier_policy)
    }

    fn ring<T: Element>(&self, role: Role, clear_on_read: bool) -> Result<RingBuffer<T>> {
        let backing: Arc<dyn SharedMemoryBackend> = self.file.clone();
        // Safety: each process builds exactly one view, with the role it was
        // started as, so there is one producer and one consumer in total
        let ring = unsafe { RingBuffer::<T>::over(backing, ring_offset(&self.layout), self.layout, role)? };
        Ok(ring.with_clear_on_read(clear_on_read))
    }

    /// Initialize the producer's fields, then tell the consumer setup is done.
    pub fn into_producer<T: Element>(self, builder: &ChannelBuilder) -> Result<(Producer<T>, RunBarrier)> {
        let ring = self.ring::<T>(Role::Producer, builder.clear_on_read)?;
        let barrier = self.barrier(builder)?;
        self.header()?.ready.store(READY_MAGIC, Ordering::Release);
        log::info!(
            "[SPSC] producer ready on {} (capacity {})",
            self.file.path().display(),
            self.layout.capacity
        );
        Ok((Producer::new(Arc::new(ring)), barrier))
    }

    pub fn into_consumer<T: Element>(self, builder: &ChannelBuilder) -> Result<(Consumer<T>, RunBarrier)> {
        let ring = self.ring::<T>(Role::Consumer, builder.clear_on_read)?;
        let barrier = self.barrier(builder)?;
        log::info!(
            "[SPSC] consumer attached to {} (capacity {})",
            self.file.path().display(),
            self.layout.capacity
        );
        Ok((Consumer::new(Arc::new(ring)), barrier))
    }
}

impl std::fmt::Debug for SharedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRegion")
            .field("file", &self.file)
            .field("layout", &self.layout)
            .finish()
    }
}
