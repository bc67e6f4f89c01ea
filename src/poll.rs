//! Fixed-interval polling with an attempt budget
//!
//! Confirmation waits are expressed as a [`PollPolicy`] instead of ad hoc
//! sleep loops. Waiting goes through `tokio::time`, so tests can pause the
//! clock and advance it instead of sleeping for real.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How often and how many times to poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Delay before each attempt (milliseconds)
    pub interval_ms: u64,
    /// Maximum number of attempts
    pub max_attempts: u32,
}

impl PollPolicy {
    /// Deployment confirmation: every second, for about a minute
    pub const DEPLOYMENT: Self = Self {
        interval_ms: 1_000,
        max_attempts: 60,
    };

    /// General transaction confirmation: every 10 seconds, for about 20 minutes
    pub const CONFIRMATION: Self = Self {
        interval_ms: 10_000,
        max_attempts: 120,
    };

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// What a single poll attempt decided
#[derive(Debug)]
pub enum Poll<T> {
    /// Final answer, stop polling
    Ready(T),
    /// Not there yet, try again
    Pending,
}

/// How polling ended
#[derive(Debug, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Ready { value: T, attempts: u32 },
    Exhausted { attempts: u32 },
    Cancelled { attempts: u32 },
}

/// Runs `attempt` up to `policy.max_attempts` times, waiting one interval
/// before each try.
///
/// Errors from `attempt` abort polling immediately.
pub async fn poll_until<T, E, F, Fut>(
    policy: PollPolicy,
    cancel: &CancellationToken,
    mut attempt: F,
) -> Result<PollOutcome<T>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Poll<T>, E>>,
{
    for n in 1..=policy.max_attempts {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Ok(PollOutcome::Cancelled { attempts: n - 1 });
            }
            _ = tokio::time::sleep(policy.interval()) => {}
        }

        if let Poll::Ready(value) = attempt(n).await? {
            return Ok(PollOutcome::Ready { value, attempts: n });
        }
    }

    Ok(PollOutcome::Exhausted {
        attempts: policy.max_attempts,
    })
}
