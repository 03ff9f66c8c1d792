// Module naming follows project convention (SPSC = Single-Producer Single-Consumer)
#[allow(non_snake_case)]
pub mod Core;
#[allow(non_snake_case)]
pub mod SPSC;
#[allow(non_snake_case)]
pub mod Debug {
    #[allow(non_snake_case)]
    pub mod StructDebug;
}
pub mod error;

pub use error::{QueueError, Result};
pub use Core::{Pause, RetryPolicy};
pub use SPSC::{ChannelBuilder, Consumer, Producer, RunBarrier};
pub use SPSC::Buffer::{RingBuffer, RingBufferLayout, Role};
pub use SPSC::Structs::Element;
