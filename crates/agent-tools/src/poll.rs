use std::thread;
use std::time::{Duration, Instant};

use crate::{Result, ToolError};

/// Interval and deadline for waiting on an external condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(30 * 60),
        }
    }
}

impl PollOptions {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Call `check` until it yields `Some`, sleeping `interval` between attempts.
///
/// Errors from `check` end the loop immediately. The check always runs at
/// least once, even with a zero timeout.
pub fn poll_until<T, F>(what: &str, options: &PollOptions, mut check: F) -> Result<T>
where
    F: FnMut() -> Result<Option<T>>,
{
    let started = Instant::now();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        if let Some(value) = check()? {
            tracing::debug!(what, attempt, elapsed = ?started.elapsed(), "condition met");
            return Ok(value);
        }

        let elapsed = started.elapsed();
        if elapsed >= options.timeout {
            tracing::warn!(what, attempt, "gave up waiting");
            return Err(ToolError::Timeout {
                what: what.to_string(),
                waited: elapsed,
            });
        }

        tracing::trace!(what, attempt, "not ready, sleeping");
        thread::sleep(options.interval.min(options.timeout - elapsed));
    }
}
