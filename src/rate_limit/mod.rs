//! Rate limiting for signature verification
//!
//! Verification attempts are counted per wallet address so repeated bad
//! signatures from one address eventually get refused before any parsing or
//! crypto runs. The production store lives outside this crate; the engine
//! only consumes the [`RateLimiter`] contract.

mod memory;

pub use memory::InMemoryRateLimiter;

use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a rate limit check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
    /// Whether this attempt may proceed
    pub allowed: bool,
    /// Attempts left in the current window
    pub remaining: u32,
    /// When the window frees up again
    pub reset_at: DateTime<Utc>,
}

/// Per-key attempt counter shared across verification calls.
///
/// Implementations must be safe for concurrent use; the engine holds no lock
/// around `check`/`reset`.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Counts an attempt for `key` and reports whether it is allowed.
    async fn check(&self, key: &str) -> Result<RateLimitStatus>;

    /// Clears the window for `key`.
    async fn reset(&self, key: &str) -> Result<()>;

    /// Releases any connection to the backing store.
    async fn disconnect(&self) -> Result<()>;
}
