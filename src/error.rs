// Error type shared by every module of the crate

use std::io;
use std::path::PathBuf;

/// Everything that can go wrong while building, attaching or misusing a queue.
///
/// Full and empty are not errors on the hot path; `try_enqueue` and
/// `try_dequeue` report them through `bool` / `Option`. The `Full` and `Empty`
/// variants only come back from the non-optional accessors (`add`, `remove`,
/// `element`).
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("capacity must be at least 1, got {0}")]
    InvalidCapacity(usize),

    #[error("capacity {0} cannot be rounded up to a power of two")]
    CapacityOverflow(usize),

    #[error("alignment must be a power of two, got {0}")]
    InvalidAlignment(usize),

    #[error("cache line size must be a power of two of at least 16 bytes, got {0}")]
    InvalidCacheLine(usize),

    #[error("zero-sized element types cannot be queued")]
    ZeroSizedElement,

    #[error("element alignment {align} exceeds the cache line size {cache_line}")]
    ElementAlignment { align: usize, cache_line: usize },

    #[error("region too small: need {needed} bytes, have {available}")]
    RegionTooSmall { needed: usize, available: usize },

    #[error("value is reserved as the empty-slot marker and cannot be queued")]
    ReservedValue,

    #[error("queue is full")]
    Full,

    #[error("queue is empty")]
    Empty,

    #[error("shared region layout mismatch: {field} is {found}, expected {expected}")]
    LayoutMismatch {
        field: &'static str,
        expected: u64,
        found: u64,
    },

    #[error("gave up waiting for {what} after {attempts} attempts")]
    Timeout { what: &'static str, attempts: u64 },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Os(#[from] io::Error),
}

impl QueueError {
    /// Wraps an I/O failure with the file it happened on.
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        QueueError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for the setup-time errors that abort construction immediately.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            QueueError::InvalidCapacity(_)
                | QueueError::CapacityOverflow(_)
                | QueueError::InvalidAlignment(_)
                | QueueError::InvalidCacheLine(_)
                | QueueError::ZeroSizedElement
                | QueueError::ElementAlignment { .. }
                | QueueError::RegionTooSmall { .. }
                | QueueError::LayoutMismatch { .. }
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, QueueError::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, QueueError>;
