use std::time::Duration;

use tokio::time::{sleep_until, Instant};

/// Fixed-interval limiter: `wait` returns no sooner than `interval` after the
/// previous `wait` returned. The first call never blocks.
pub struct FixedIntervalLimiter {
    interval: Duration,
    next_allowed: Option<Instant>,
}

impl FixedIntervalLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_allowed: None,
        }
    }

    pub async fn wait(&mut self) {
        if let Some(next_allowed) = self.next_allowed {
            sleep_until(next_allowed).await;
        }
        self.next_allowed = Some(Instant::now() + self.interval);
    }
}
