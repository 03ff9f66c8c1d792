//! Two-party run rendezvous over one shared integer.
//!
//! The phase counter moves through three values per run `N`:
//!
//! ```text
//!  3N-1 ──begin_run──▶ 3N ──mark_sent──▶ 3N+1 ──acknowledge──▶ 3N+2
//!        (either side)     (producer)          (consumer)
//! ```
//!
//! Run 0 starts from [`PHASE_NOT_STARTED`] (`-1`), and `3N+2` is `3(N+1)-1`,
//! so the end of one run is the start condition of the next. Each step is a
//! compare-and-swap retried under a [`RetryPolicy`]; the counter only moves
//! forward.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::error::Result;
use crate::Core::aligned::AlignedStorage;
use crate::Core::region::RegionView;
use crate::Core::retry::RetryPolicy;
use crate::Core::SharedMemory::SharedMemoryBackend;
use crate::SPSC::Structs::{HEADER_SIZE, PHASE_NOT_STARTED};

/// Phase boundaries for timed runs shared by a producer and a consumer.
///
/// Cloning yields another handle on the same counter. Two barriers created
/// over different memory are fully independent.
#[derive(Clone)]
pub struct RunBarrier {
    region: RegionView,
    offset: usize,
    policy: RetryPolicy,
    _backing: Arc<dyn SharedMemoryBackend>,
}

unsafe impl Send for RunBarrier {}
unsafe impl Sync for RunBarrier {}

impl RunBarrier {
    /// Barrier over the `i64` at `offset` in `backing`.
    ///
    /// The counter is not reset; whoever sets up the region does that.
    pub fn over(
        backing: Arc<dyn SharedMemoryBackend>,
        offset: usize,
        policy: RetryPolicy,
    ) -> Result<Self> {
        let region = RegionView::of(&*backing)?;
        region.check::<AtomicI64>(offset)?;
        Ok(Self {
            region,
            offset,
            policy,
            _backing: backing,
        })
    }

    /// A private barrier on the heap, for two threads of one process.
    pub fn in_process(policy: RetryPolicy) -> Result<Self> {
        let storage = AlignedStorage::cache_aligned(HEADER_SIZE)?;
        let barrier = Self::over(Arc::new(storage), 0, policy)?;
        barrier.reset();
        Ok(barrier)
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn counter(&self) -> &AtomicI64 {
        self.region.atomic_i64(self.offset)
    }

    pub fn phase(&self) -> i64 {
        self.counter().load(Ordering::Acquire)
    }

    /// Put the counter back to "before run 0".
    pub fn reset(&self) {
        self.counter().store(PHASE_NOT_STARTED, Ordering::Release);
    }

    pub fn start_phase(run: u64) -> i64 {
        3 * run as i64
    }

    pub fn sent_phase(run: u64) -> i64 {
        3 * run as i64 + 1
    }

    pub fn acknowledged_phase(run: u64) -> i64 {
        3 * run as i64 + 2
    }

    /// Wait until run `run` may start, opening it if this side gets there first.
    ///
    /// Returns as soon as the counter is at or past `3N`.
    pub fn begin_run(&self, run: u64) -> Result<()> {
        let start = Self::start_phase(run);
        self.policy.run("run start", || {
            let current = self.phase();
            if current >= start {
                return Ok(Some(()));
            }
            Ok(self.try_advance(start - 1, start).then_some(()))
        })?;
        log::trace!("[SPSC] run {run} started");
        Ok(())
    }

    /// Producer: everything for run `run` has been enqueued.
    pub fn mark_sent(&self, run: u64) -> Result<()> {
        self.advance("run sent", Self::start_phase(run), Self::sent_phase(run))
    }

    /// Consumer: everything for run `run` has been received.
    pub fn acknowledge(&self, run: u64) -> Result<()> {
        self.advance(
            "run acknowledged",
            Self::sent_phase(run),
            Self::acknowledged_phase(run),
        )
    }

    /// Producer: wait for the consumer to acknowledge run `run`.
    pub fn await_acknowledged(&self, run: u64) -> Result<()> {
        let done = Self::acknowledged_phase(run);
        self.policy
            .run("acknowledgement", || Ok((self.phase() >= done).then_some(())))
    }

    /// Spin until the counter moves from `from` to `to` through this handle.
    pub fn advance(&self, what: &'static str, from: i64, to: i64) -> Result<()> {
        self.policy
            .run(what, || Ok(self.try_advance(from, to).then_some(())))?;
        log::trace!("[SPSC] barrier {from} -> {to}");
        Ok(())
    }

    fn try_advance(&self, from: i64, to: i64) -> bool {
        self.counter()
            .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl std::fmt::Debug for RunBarrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::Debug::StructDebug::debug_run_barrier(self, f)
    }
}
