//! In-process sliding window rate limiter

use super::{RateLimitStatus, RateLimiter};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Attempt timestamps per key, oldest first
struct Windows {
    keys: HashMap<String, VecDeque<Instant>>,
    /// Last time expired keys were swept out
    last_sweep: Instant,
}

/// Sliding window limiter keeping attempt timestamps in memory.
///
/// Suitable for tests and single-process deployments. State is lost on
/// restart and is not shared between processes. Keys whose window has fully
/// expired are dropped, at the latest one window after their last attempt.
#[derive(Clone)]
pub struct InMemoryRateLimiter {
    /// Attempts allowed per window
    max_attempts: u32,
    /// Window length
    window: Duration,
    windows: Arc<RwLock<Windows>>,
}

impl InMemoryRateLimiter {
    /// Create a limiter allowing `max_attempts` per `window`
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
            windows: Arc::new(RwLock::new(Windows {
                keys: HashMap::new(),
                last_sweep: Instant::now(),
            })),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn prune(entries: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(oldest) = entries.front() {
            if now.duration_since(*oldest) >= window {
                entries.pop_front();
            } else {
                break;
            }
        }
    }

    /// Drops every key with no attempt inside the window
    fn sweep(windows: &mut Windows, now: Instant, window: Duration) {
        let before = windows.keys.len();
        windows.keys.retain(|_, entries| {
            entries
                .back()
                .is_some_and(|newest| now.duration_since(*newest) < window)
        });
        windows.last_sweep = now;
        let dropped = before - windows.keys.len();
        if dropped > 0 {
            tracing::debug!(dropped = dropped, "Swept expired rate limit windows");
        }
    }
}

impl Default for InMemoryRateLimiter {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(15 * 60))
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, key: &str) -> Result<RateLimitStatus> {
        let now = Instant::now();
        let mut windows = self.windows.write().await;
        if now.duration_since(windows.last_sweep) >= self.window {
            Self::sweep(&mut windows, now, self.window);
        }

        let entries = windows.keys.entry(key.to_string()).or_default();
        Self::prune(entries, now, self.window);

        let allowed = (entries.len() as u32) < self.max_attempts;
        if allowed {
            entries.push_back(now);
        }

        let remaining = self.max_attempts.saturating_sub(entries.len() as u32);
        let until_reset = entries
            .front()
            .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
            .unwrap_or(self.window);
        if entries.is_empty() {
            windows.keys.remove(key);
        }
        let reset_at = Utc::now()
            + chrono::Duration::from_std(until_reset).unwrap_or_else(|_| chrono::Duration::zero());

        Ok(RateLimitStatus {
            allowed,
            remaining,
            reset_at,
        })
    }

    async fn reset(&self, key: &str) -> Result<()> {
        self.windows.write().await.keys.remove(key);
        tracing::debug!(key = %key, "Rate limit window reset");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.windows.write().await.keys.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_up_to_limit() {
        let limiter = InMemoryRateLimiter::new(3, Duration::from_secs(60));

        for expected_remaining in [2, 1, 0] {
            let status = limiter.check("CADDR").await.unwrap();
            assert!(status.allowed);
            assert_eq!(status.remaining, expected_remaining);
        }

        let status = limiter.check("CADDR").await.unwrap();
        assert!(!status.allowed);
        assert_eq!(status.remaining, 0);
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let limiter = InMemoryRateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("A").await.unwrap().allowed);
        assert!(!limiter.check("A").await.unwrap().allowed);
        assert!(limiter.check("B").await.unwrap().allowed);
    }

    #[tokio::test]
    async fn reset_restores_full_window() {
        let limiter = InMemoryRateLimiter::new(2, Duration::from_secs(60));
        limiter.check("A").await.unwrap();
        limiter.check("A").await.unwrap();
        assert!(!limiter.check("A").await.unwrap().allowed);

        limiter.reset("A").await.unwrap();
        let status = limiter.check("A").await.unwrap();
        assert!(status.allowed);
        assert_eq!(status.remaining, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn window_slides() {
        let limiter = InMemoryRateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("A").await.unwrap().allowed);
        assert!(!limiter.check("A").await.unwrap().allowed);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limiter.check("A").await.unwrap().allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_keys_are_dropped() {
        let limiter = InMemoryRateLimiter::new(5, Duration::from_secs(15 * 60));
        for n in 0..10_000 {
            limiter.check(&format!("C{}", n)).await.unwrap();
        }
        assert_eq!(limiter.windows.read().await.keys.len(), 10_000);

        tokio::time::advance(Duration::from_secs(60 * 60)).await;
        assert!(limiter.check("CFRESH").await.unwrap().allowed);

        let windows = limiter.windows.read().await;
        assert_eq!(windows.keys.len(), 1);
        assert!(windows.keys.contains_key("CFRESH"));
    }

    #[tokio::test]
    async fn refused_key_with_no_attempts_is_not_kept() {
        let limiter = InMemoryRateLimiter::new(0, Duration::from_secs(60));
        assert!(!limiter.check("A").await.unwrap().allowed);
        assert!(limiter.windows.read().await.keys.is_empty());
    }
}
