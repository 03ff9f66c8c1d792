// This is the single-producer single-consumer ring over a raw region

use std::marker::PhantomData;
use std::sync::Arc;

use super::layout::RingBufferLayout;
use crate::Core::region::RegionView;
use crate::Core::SharedMemory::SharedMemoryBackend;

/// Which control fields a view owns and therefore initializes.
///
/// The producer owns `tail` and `head_cache`, the consumer owns `head` and
/// `tail_cache`. A view never writes the other side's pair, not even to zero
/// it during setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Producer,
    Consumer,
    Both,
}

impl Role {
    pub fn produces(self) -> bool {
        matches!(self, Role::Producer | Role::Both)
    }

    pub fn consumes(self) -> bool {
        matches!(self, Role::Consumer | Role::Both)
    }
}

/// A lock-free bounded FIFO for exactly one producer and one consumer.
///
/// The ring lives in a [`RegionView`] laid out by [`RingBufferLayout`]; the
/// view keeps its backing memory alive through `_backing`.
///
/// ### Concurrency Design:
/// - **Producer (Enqueue)**: reads its own `tail`, trusts `head_cache` while it
///   shows room, and only refreshes it from `head` when the ring looks full.
///   The slot is written first and `tail` is published with a release store.
/// - **Consumer (Dequeue)**: reads its own `head`, trusts `tail_cache` while it
///   shows data, and only refreshes it from `tail` when the ring looks empty.
///   `head` is published with a release store once the slot has been read.
///
/// Owning the `RingBuffer` means owning both roles, so the mutating methods
/// take `&mut self`. [`RingBuffer::split`] hands the roles to separate threads.
pub struct RingBuffer<T> {
    pub(crate) region: RegionView,
    pub(crate) layout: RingBufferLayout,
    pub(crate) clear_on_read: bool,
    pub(crate) _backing: Arc<dyn SharedMemoryBackend>,
    pub(crate) _marker: PhantomData<T>,
}

unsafe impl<T: Send> Send for RingBuffer<T> {}
unsafe impl<T: Send> Sync for RingBuffer<T> {}
