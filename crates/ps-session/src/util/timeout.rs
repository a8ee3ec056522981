//! Wall-clock deadlines for multi-step reads.

use std::time::Duration;

use tokio::time::Instant;

/// A deadline tracker for operations with multiple steps.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    deadline: Instant,
}

impl Deadline {
    /// Create a new deadline from now.
    #[must_use]
    pub fn from_now(duration: Duration) -> Self {
        let started = Instant::now();
        Self {
            started,
            deadline: started + duration,
        }
    }

    /// Check if the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Get the remaining time until the deadline.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Time elapsed since the deadline was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Sleep for `interval`, but never past the deadline.
    pub async fn sleep_at_most(&self, interval: Duration) {
        let nap = interval.min(self.remaining());
        if !nap.is_zero() {
            tokio::time::sleep(nap).await;
        }
    }
}
