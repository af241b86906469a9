//! Optional pacing between dispatched items.
//!
//! Throttles downstream processing, not backend requests: the page iterator
//! waits on the limiter before handing each item to the caller.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use keyway_core::storage::{Result, StoreError};

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Suspends until the next item may be dispatched.
    async fn wait(&self) -> Result<()>;
}

/// Spaces dispatches at a fixed interval.
#[derive(Debug)]
pub struct IntervalLimiter {
    interval: Duration,
    next: Mutex<Option<Instant>>,
}

impl IntervalLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Mutex::new(None),
        }
    }

    /// Allow at most `per_second` dispatches per second.
    pub fn per_second(per_second: u32) -> Result<Self> {
        if per_second == 0 {
            return Err(StoreError::InvalidArgument(
                "rate limit must allow at least one item per second".to_string(),
            ));
        }
        Ok(Self::new(Duration::from_secs(1) / per_second))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[async_trait]
impl RateLimiter for IntervalLimiter {
    async fn wait(&self) -> Result<()> {
        let mut next = self.next.lock().await;
        let now = Instant::now();
        let start = match *next {
            Some(at) if at > now => {
                tokio::time::sleep_until(at).await;
                at
            }
            _ => now,
        };
        *next = Some(start + self.interval);
        Ok(())
    }
}
