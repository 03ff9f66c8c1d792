// Bounded or unbounded waiting for a condition owned by the other process

use std::thread;
use std::time::{Duration, Instant};

use crossbeam_utils::Backoff;

use crate::error::{QueueError, Result};

/// What to do between two failed attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pause {
    /// Exponential spin that degrades into yielding (`crossbeam_utils::Backoff`).
    Spin,
    /// Give up the time slice.
    Yield,
    /// Sleep for a fixed interval. Only used off the data path.
    Sleep(Duration),
}

/// How long to keep retrying and how to wait in between.
///
/// With neither `max_attempts` nor `deadline` set the policy retries forever,
/// which is what the benchmark harness wants; tests bound it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub pause: Pause,
    pub max_attempts: Option<u64>,
    pub deadline: Option<Duration>,
}

impl RetryPolicy {
    pub const fn new(pause: Pause) -> Self {
        Self {
            pause,
            max_attempts: None,
            deadline: None,
        }
    }

    pub const fn spinning() -> Self {
        Self::new(Pause::Spin)
    }

    pub const fn yielding() -> Self {
        Self::new(Pause::Yield)
    }

    pub const fn sleep(interval: Duration) -> Self {
        Self::new(Pause::Sleep(interval))
    }

    pub const fn with_max_attempts(mut self, attempts: u64) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Calls `attempt` until it yields a value, the policy runs out, or it errors.
    ///
    /// `what` names the awaited condition in the resulting `Timeout` error.
    pub fn run<R, F>(&self, what: &'static str, mut attempt: F) -> Result<R>
    where
        F: FnMut() -> Result<Option<R>>,
    {
        let start = self.deadline.map(|_| Instant::now());
        let backoff = Backoff::new();
        let mut attempts: u64 = 0;

        loop {
            if let Some(value) = attempt()? {
                return Ok(value);
            }
            attempts += 1;

            let out_of_attempts = self.max_attempts.is_some_and(|max| attempts >= max);
            let past_deadline = match (start, self.deadline) {
                (Some(start), Some(deadline)) => start.elapsed() >= deadline,
                _ => false,
            };
            if out_of_attempts || past_deadline {
                log::warn!("[SPSC] gave up waiting for {what} after {attempts} attempts");
                return Err(QueueError::Timeout { what, attempts });
            }

            match self.pause {
                Pause::Spin => backoff.snooze(),
                Pause::Yield => thread::yield_now(),
                Pause::Sleep(interval) => thread::sleep(interval),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::yielding()
    }
}
