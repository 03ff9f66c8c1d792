// SPSC = Single-Producer Single-Consumer
#[allow(non_snake_case)]
pub mod Buffer {
    #[allow(non_snake_case)]
    pub mod Buffer;
    #[allow(non_snake_case)]
    pub mod Buffer_impl;
    pub mod layout;
    pub use Buffer::{RingBuffer, Role}; // re-export for stable path
    pub use layout::{RingBufferLayout, CACHE_LINE_SIZE};
}

#[allow(non_snake_case)]
pub mod Structs {
    #[allow(non_snake_case)]
    pub mod Buffer_Structs;
    pub mod element;
    pub use element::Element;
    pub use Buffer_Structs::{SyncHeader, HEADER_SIZE, PHASE_NOT_STARTED, READY_CLAIMED, READY_MAGIC};
}

pub mod barrier;
pub mod builder;
pub mod handshake;
mod consumer;
mod producer;

pub use barrier::RunBarrier;
pub use builder::{ChannelBuilder, DEFAULT_CAPACITY, DEFAULT_IPC_PATH};
pub use consumer::Consumer;
pub use handshake::{minimum_size, ring_offset, SharedRegion};
pub use producer::Producer;
