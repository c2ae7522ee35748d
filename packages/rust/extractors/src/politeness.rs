//! Randomized politeness delay for shared external services.

use std::time::Duration;

use rand::Rng;

/// Sleeps a random duration in `[min_ms, max_ms]` before each remote call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Politeness {
    min_ms: u64,
    max_ms: u64,
}

impl Politeness {
    /// No delay at all.
    pub fn none() -> Self {
        Self::default()
    }

    /// Delay uniformly between `min_ms` and `max_ms` (bounds are reordered if inverted).
    pub fn between(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min_ms: min_ms.min(max_ms),
            max_ms: min_ms.max(max_ms),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_ms > 0
    }

    /// Draw the next delay.
    pub fn delay(&self) -> Duration {
        if !self.is_enabled() {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(self.min_ms..=self.max_ms))
    }

    /// Sleep for a freshly drawn delay.
    pub async fn pause(&self) {
        let delay = self.delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
