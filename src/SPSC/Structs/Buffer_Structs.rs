// Plain structs placed at fixed positions in a shared region

// atomics only; the struct is viewed in place, never copied

use std::sync::atomic::{AtomicI64, AtomicU64};

/// Value of the ready word once the producer has finished setting the region up.
/// ASCII "SPSCRDY!".
pub const READY_MAGIC: u64 = 0x5350_5343_5244_5921;

/// Value of the ready word once a consumer has attached. A second consumer,
/// or one that finds a file left behind by an earlier session, keeps waiting.
/// ASCII "SPSCTAKN".
pub const READY_CLAIMED: u64 = 0x5350_5343_5441_4b4e;

/// Barrier phase before run 0 has started.
pub const PHASE_NOT_STARTED: i64 = -1;

/// Bytes reserved ahead of the ring for the [`SyncHeader`].
pub const HEADER_SIZE: usize = std::mem::size_of::<SyncHeader>();

/// Cross-process synchronization header, one cache line at the start of the
/// backing file.
///
/// Only the producer writes `ready` and the geometry words, and only during
/// setup. `phase` is the [`RunBarrier`](crate::SPSC::RunBarrier) counter and is
/// written by both sides through compare-and-swap.
#[repr(C, align(64))]
pub struct SyncHeader {
    /// Barrier phase: `3N`, `3N+1`, `3N+2` for run `N`; `-1` before run 0.
    pub phase: AtomicI64,

    /// Zero while the producer is still setting up, [`READY_MAGIC`] after,
    /// [`READY_CLAIMED`] once the consumer has taken the region.
    pub ready: AtomicU64,

    /// Rounded ring capacity the producer laid out.
    pub capacity: AtomicU64,

    /// Element size in bytes.
    pub element_size: AtomicU64,

    /// Cache line size the control fields are spread across.
    pub cache_line: AtomicU64,
}
